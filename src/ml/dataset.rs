// Builds span-annotated training examples from ground-truth field records

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::models::{EntitySpan, LabeledRecord, TrainingExample};
use crate::utils::{CardError, Result};

/// "roll_number" -> "Roll Number"
pub fn titleize(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut prev_alpha = false;
    for ch in field.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Render a record as `"Title: value"` pairs joined by spaces, then annotate it.
pub fn build_example(record: &LabeledRecord) -> TrainingExample {
    let text = record
        .fields
        .iter()
        .map(|(name, value)| format!("{}: {}", titleize(name), value))
        .collect::<Vec<_>>()
        .join(" ");
    let fields: Vec<(&str, &str)> = record
        .fields
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    let spans = annotate(&text, &fields);
    TrainingExample { text, spans }
}

/// Locate each field value in `text` in order, starting after the previous match.
///
/// A match is widened outwards to the enclosing word boundaries and labeled with
/// the upper-cased field name. Values that cannot be found are skipped.
pub fn annotate(text: &str, fields: &[(&str, &str)]) -> Vec<EntitySpan> {
    let mut spans = Vec::new();
    let mut offset = 0;

    for &(name, value) in fields {
        if value.is_empty() {
            debug!("Skipping empty value for {}", name);
            continue;
        }
        let Some(found) = text[offset..].find(value) else {
            warn!("Value for {} not found in {:?}", name, text);
            continue;
        };

        let mut start = offset + found;
        let mut end = start + value.len();
        // Never widen back into the previous span.
        while start > offset {
            let Some(ch) = text[offset..start].chars().next_back() else {
                break;
            };
            if !ch.is_alphanumeric() {
                break;
            }
            start -= ch.len_utf8();
        }
        while let Some(ch) = text[end..].chars().next() {
            if !ch.is_alphanumeric() {
                break;
            }
            end += ch.len_utf8();
        }

        spans.push(EntitySpan::new(start, end, name.to_uppercase()));
        offset = end;
    }
    spans
}

/// Read every `*.json` record in `dir`, in file-name order.
pub fn load_records(dir: &Path) -> Result<Vec<LabeledRecord>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        CardError::Dataset(format!("Cannot read records from {}: {}", dir.display(), e))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = fs::read_to_string(&path)?;
        let record = LabeledRecord::from_json(&raw)
            .map_err(|e| CardError::Dataset(format!("{}: {}", path.display(), e)))?;
        records.push(record);
    }
    Ok(records)
}

/// Load all records in `dir` and build one training example per record.
pub fn prepare_training_data(dir: &Path) -> Result<Vec<TrainingExample>> {
    let records = load_records(dir)?;
    let examples: Vec<TrainingExample> = records.iter().map(build_example).collect();
    info!(
        "Prepared {} training examples from {}",
        examples.len(),
        dir.display()
    );
    Ok(examples)
}
