use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::ml::model::EntityModel;
use crate::models::{CardResult, Config, ExtractedFields, RawDocument};
use crate::processing::{FieldExtractor, TextExtractor};
use crate::utils::{CardError, Result};

/// Free-text fields reported in upper case so casing on the card does not matter.
pub const UPPERCASE_FIELDS: [&str; 3] = ["name", "college", "branch"];

fn uppercase_fields(fields: &mut ExtractedFields) {
    for (name, field) in fields.iter_mut() {
        if UPPERCASE_FIELDS.contains(&name.as_str()) {
            field.value = field.value.to_uppercase();
        }
    }
}

/// Runs a card image through OCR and field extraction.
pub struct IdCardProcessor {
    text_extractor: TextExtractor,
    field_extractor: FieldExtractor,
    default_threshold: f32,
}

impl IdCardProcessor {
    pub fn new(
        text_extractor: TextExtractor,
        field_extractor: FieldExtractor,
        default_threshold: f32,
    ) -> Self {
        Self {
            text_extractor,
            field_extractor,
            default_threshold,
        }
    }

    /// Wire up the OCR backend and entity model described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let text_extractor = TextExtractor::from_config(config)?;
        let model = EntityModel::load_or_blank(&config.model.path, config.model.allow_blank_fallback)?;
        Ok(Self::new(
            text_extractor,
            FieldExtractor::new(Arc::new(model)),
            config.model.acceptance_threshold,
        ))
    }

    /// Process the card at `image_path`, keeping fields whose confidence is at
    /// least `threshold` (or the configured default).
    pub fn process(&self, image_path: &Path, threshold: Option<f32>) -> Result<CardResult> {
        let document = RawDocument::open(image_path)?;
        self.process_document(&document, threshold)
    }

    pub fn process_document(
        &self,
        document: &RawDocument,
        threshold: Option<f32>,
    ) -> Result<CardResult> {
        let threshold = threshold.unwrap_or(self.default_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CardError::Config(format!(
                "Threshold {} is outside [0, 1]",
                threshold
            )));
        }

        // Step 1: OCR
        let text = self.text_extractor.extract_from_document(document)?;

        // Step 2: fields
        let mut fields = self.field_extractor.extract(&text.text);
        uppercase_fields(&mut fields);

        let result = CardResult::from_fields(&text, &fields, threshold);
        info!(
            "Kept {} of {} fields for {} at threshold {}",
            result.extracted_fields.len(),
            fields.len(),
            document.source.display(),
            threshold
        );
        Ok(result)
    }
}
