use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::utils::{CardError, Result};

/// A photographed card as handed to the pipeline.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source: PathBuf,
    pub image: DynamicImage,
}

impl RawDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            CardError::InvalidImage(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self {
            source: path.to_path_buf(),
            image,
        })
    }

    pub fn from_image(image: DynamicImage, source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            image,
        }
    }
}

/// Recognized text with its length-weighted confidence on the engine's 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub confidence: f32,
}

impl ExtractedText {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Confidence rescaled to [0, 1].
    pub fn unit_confidence(&self) -> f32 {
        (self.confidence / 100.0).clamp(0.0, 1.0)
    }
}

/// Ground-truth field values for one card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledRecord {
    pub fields: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RecordFile {
    extracted_fields: BTreeMap<String, serde_json::Value>,
}

impl LabeledRecord {
    /// Parse a record document of the form `{"extracted_fields": {...}}`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: RecordFile =
            serde_json::from_str(raw).map_err(|e| CardError::Dataset(e.to_string()))?;
        let fields = file
            .extracted_fields
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| {
                let rendered = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, rendered)
            })
            .collect();
        Ok(Self { fields })
    }
}

/// Byte range `[start, end)` of a text tagged with an entity label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl EntitySpan {
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    pub fn overlaps(&self, other: &EntitySpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn surface<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub spans: Vec<EntitySpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Model,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: String,
    pub confidence: f32,
    pub source: FieldSource,
}

/// Field name to cleaned value, keyed by lower-case field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedFields {
    fields: BTreeMap<String, ExtractedField>,
}

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, field: ExtractedField) {
        self.fields.insert(name.into(), field);
    }

    pub fn get(&self, name: &str) -> Option<&ExtractedField> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|f| f.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExtractedField)> {
        self.fields.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut ExtractedField)> {
        self.fields.iter_mut()
    }

    /// Plain field -> value view.
    pub fn values(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), field.value.clone()))
            .collect()
    }

    pub fn above_threshold(&self, threshold: f32) -> ExtractedFields {
        let fields = self
            .fields
            .iter()
            .filter(|(_, field)| field.confidence >= threshold)
            .map(|(name, field)| (name.clone(), field.clone()))
            .collect();
        ExtractedFields { fields }
    }
}

/// Output of one end-to-end card run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardResult {
    pub raw_text: String,
    pub ocr_confidence: f32,
    pub extracted_fields: BTreeMap<String, String>,
    pub confidence_scores: BTreeMap<String, f32>,
    pub overall_confidence: f32,
}

impl CardResult {
    pub fn from_fields(text: &ExtractedText, fields: &ExtractedFields, threshold: f32) -> Self {
        let kept = fields.above_threshold(threshold);
        let confidence_scores: BTreeMap<String, f32> = kept
            .iter()
            .map(|(name, field)| (name.clone(), field.confidence))
            .collect();
        let overall_confidence = if confidence_scores.is_empty() {
            0.0
        } else {
            confidence_scores.values().sum::<f32>() / confidence_scores.len() as f32
        };
        Self {
            raw_text: text.text.clone(),
            ocr_confidence: text.confidence,
            extracted_fields: kept.values(),
            confidence_scores,
            overall_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(value: &str, confidence: f32, source: FieldSource) -> ExtractedField {
        ExtractedField {
            value: value.to_string(),
            confidence,
            source,
        }
    }

    #[test]
    fn record_renders_non_string_values() {
        let record = LabeledRecord::from_json(
            r#"{"extracted_fields": {"name": "Jane Doe", "year": 2021, "missing": null}}"#,
        )
        .unwrap();
        assert_eq!(record.fields.get("name").map(String::as_str), Some("Jane Doe"));
        assert_eq!(record.fields.get("year").map(String::as_str), Some("2021"));
        assert!(!record.fields.contains_key("missing"));
    }

    #[test]
    fn record_without_fields_is_dataset_error() {
        let err = LabeledRecord::from_json(r#"{"name": "x"}"#).unwrap_err();
        assert!(matches!(err, CardError::Dataset(_)));
    }

    #[test]
    fn span_overlap() {
        let a = EntitySpan::new(0, 5, "NAME");
        let b = EntitySpan::new(5, 9, "DATE");
        let c = EntitySpan::new(4, 6, "DATE");
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn card_result_keeps_fields_above_threshold() {
        let mut fields = ExtractedFields::new();
        fields.insert("name", field("John Smith", 0.9, FieldSource::Model));
        fields.insert("branch", field("Physics", 0.4, FieldSource::Model));
        fields.insert("email", field("a@b.io", 1.0, FieldSource::Pattern));
        let text = ExtractedText {
            text: "raw".to_string(),
            confidence: 88.0,
        };

        let result = CardResult::from_fields(&text, &fields, 0.7);
        assert_eq!(result.extracted_fields.len(), 2);
        assert!(!result.extracted_fields.contains_key("branch"));
        assert!((result.overall_confidence - 0.95).abs() < 1e-6);
        assert_eq!(result.ocr_confidence, 88.0);
    }

    #[test]
    fn card_result_without_fields_has_zero_confidence() {
        let result = CardResult::from_fields(&ExtractedText::empty(), &ExtractedFields::new(), 0.5);
        assert!(result.extracted_fields.is_empty());
        assert_eq!(result.overall_confidence, 0.0);
    }

    #[test]
    fn unit_confidence_is_clamped() {
        let text = ExtractedText {
            text: "x".to_string(),
            confidence: 91.0,
        };
        assert!((text.unit_confidence() - 0.91).abs() < 1e-6);
        assert_eq!(ExtractedText::empty().unit_confidence(), 0.0);
    }
}
