// Field extraction: entity model first, fallback patterns for what it missed

use std::sync::Arc;

use log::debug;

use crate::ml::model::{EntityModel, EntityRecognizer};
use crate::models::{ExtractedField, ExtractedFields, FieldSource};
use crate::processing::extractors::{clean_field_value, match_field, FALLBACK_PATTERNS};
use crate::processing::text::normalize_whitespace;

/// Confidence assigned to values found by a fallback pattern.
pub const PATTERN_CONFIDENCE: f32 = 1.0;

/// Turns card text into named field values.
///
/// Holds only a shared, read-only recognizer, so one extractor can serve
/// concurrent requests.
#[derive(Clone)]
pub struct FieldExtractor {
    recognizer: Arc<dyn EntityRecognizer>,
}

impl FieldExtractor {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Extractor that relies on the fallback patterns alone.
    pub fn pattern_only() -> Self {
        Self::new(Arc::new(EntityModel::blank()))
    }

    pub fn extract(&self, text: &str) -> ExtractedFields {
        let normalized = normalize_whitespace(text);
        let mut fields = ExtractedFields::new();

        for prediction in self.recognizer.predict(&normalized) {
            let Some(surface) = prediction.span.surface(&normalized) else {
                continue;
            };
            let surface = surface.trim();
            if surface.chars().count() <= 1 {
                continue;
            }
            // Later spans of the same label replace earlier ones.
            fields.insert(
                prediction.span.label.to_lowercase(),
                ExtractedField {
                    value: surface.to_string(),
                    confidence: prediction.confidence,
                    source: FieldSource::Model,
                },
            );
        }

        for pattern in FALLBACK_PATTERNS {
            if fields.contains(pattern.field) {
                continue;
            }
            if let Some(value) = match_field(pattern.field, &normalized) {
                debug!("Pattern filled {}", pattern.field);
                fields.insert(
                    pattern.field,
                    ExtractedField {
                        value,
                        confidence: PATTERN_CONFIDENCE,
                        source: FieldSource::Pattern,
                    },
                );
            }
        }

        for (_, field) in fields.iter_mut() {
            field.value = clean_field_value(&field.value);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::EntityPrediction;
    use crate::models::EntitySpan;
    use std::thread;

    /// Predicts every occurrence of fixed surface strings.
    struct StubRecognizer {
        targets: Vec<(&'static str, &'static str, f32)>,
        labels: Vec<String>,
    }

    impl StubRecognizer {
        fn new(targets: Vec<(&'static str, &'static str, f32)>) -> Self {
            let labels = targets.iter().map(|(label, _, _)| label.to_string()).collect();
            Self { targets, labels }
        }
    }

    impl EntityRecognizer for StubRecognizer {
        fn predict(&self, text: &str) -> Vec<EntityPrediction> {
            let mut out: Vec<EntityPrediction> = self
                .targets
                .iter()
                .flat_map(|&(label, surface, confidence)| {
                    text.match_indices(surface).map(move |(start, s)| EntityPrediction {
                        span: EntitySpan::new(start, start + s.len(), label),
                        confidence,
                    })
                })
                .collect();
            out.sort_by_key(|p| p.span.start);
            out
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }
    }

    const CARD: &str = "Name: John Smith Roll Number: AB12345 Branch: Computer Science";

    #[test]
    fn blank_model_uses_patterns() {
        let fields = FieldExtractor::pattern_only().extract(CARD);
        assert_eq!(fields.value("name"), Some("John Smith"));
        assert_eq!(fields.value("roll_number"), Some("AB12345"));
        assert_eq!(fields.value("branch"), Some("Computer Science"));
        assert!(fields.iter().all(|(_, f)| f.source == FieldSource::Pattern));
        assert!(fields.iter().all(|(_, f)| f.confidence == PATTERN_CONFIDENCE));
    }

    #[test]
    fn model_values_take_precedence() {
        let recognizer = StubRecognizer::new(vec![("NAME", "John", 0.8)]);
        let fields = FieldExtractor::new(Arc::new(recognizer)).extract(CARD);
        let name = fields.get("name").unwrap();
        assert_eq!(name.value, "John");
        assert_eq!(name.source, FieldSource::Model);
        assert!((name.confidence - 0.8).abs() < 1e-6);
        assert_eq!(fields.get("roll_number").unwrap().source, FieldSource::Pattern);
    }

    #[test]
    fn last_span_for_a_label_wins() {
        let recognizer = StubRecognizer::new(vec![
            ("BRANCH", "Computer", 0.6),
            ("BRANCH", "Science", 0.7),
        ]);
        let fields = FieldExtractor::new(Arc::new(recognizer)).extract(CARD);
        assert_eq!(fields.value("branch"), Some("Science"));
    }

    #[test]
    fn single_character_spans_are_ignored() {
        let recognizer = StubRecognizer::new(vec![("NAME", "J", 0.9)]);
        let fields = FieldExtractor::new(Arc::new(recognizer)).extract(CARD);
        assert_eq!(fields.value("name"), Some("John Smith"));
        assert_eq!(fields.get("name").unwrap().source, FieldSource::Pattern);
    }

    #[test]
    fn values_are_cleaned() {
        let recognizer = StubRecognizer::new(vec![("COLLEGE", "(IIT)", 0.9)]);
        let fields = FieldExtractor::new(Arc::new(recognizer)).extract("College: (IIT) Delhi");
        assert_eq!(fields.value("college"), Some("IIT"));
    }

    #[test]
    fn whitespace_is_normalized_first() {
        let fields = FieldExtractor::pattern_only().extract("Name:\n  John \t Smith\n");
        assert_eq!(fields.value("name"), Some("John Smith"));
    }

    #[test]
    fn no_fields_in_unrelated_text() {
        assert!(FieldExtractor::pattern_only().extract("nothing to see here").is_empty());
        assert!(FieldExtractor::pattern_only().extract("").is_empty());
    }

    #[test]
    fn raising_threshold_never_adds_fields() {
        let recognizer = StubRecognizer::new(vec![("NAME", "John Smith", 0.5), ("BRANCH", "Computer", 0.95)]);
        let fields = FieldExtractor::new(Arc::new(recognizer)).extract(CARD);
        let low = fields.above_threshold(0.3);
        let high = fields.above_threshold(0.9);
        assert!(low.len() >= high.len());
        assert!(high.iter().all(|(name, _)| low.contains(name)));
        assert!(!high.contains("name"));
        assert!(high.contains("roll_number"));
    }

    #[test]
    fn shared_across_threads() {
        let extractor = FieldExtractor::pattern_only();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let extractor = extractor.clone();
                thread::spawn(move || extractor.extract(CARD))
            })
            .collect();
        for handle in handles {
            let fields = handle.join().unwrap();
            assert_eq!(fields.value("roll_number"), Some("AB12345"));
        }
    }
}
