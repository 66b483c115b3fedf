pub mod extractors;
pub mod fields;
pub mod image;
pub mod ocr;
pub mod text;

pub use extractors::{clean_field_value, extract_fields, FALLBACK_PATTERNS};
pub use fields::FieldExtractor;
pub use image::{ImageNormalizer, NormalizedImage};
pub use ocr::{OcrEngine, RecognizedWord, TextExtractor};
pub use text::{clean_ocr_text, normalize_whitespace, CleaningOptions};
