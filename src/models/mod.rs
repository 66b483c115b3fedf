pub mod config;
pub mod data;

pub use config::{
    Config, ModelConfig, PreprocessingConfig, TesseractConfig, TextConfig, ThresholdMethod,
};
pub use data::{
    CardResult, EntitySpan, ExtractedField, ExtractedFields, ExtractedText, FieldSource,
    LabeledRecord, RawDocument, TrainingExample,
};
