// Labeled-value patterns used when the entity model misses a field

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::processing::text::normalize_whitespace;

/// A field recognized by a "Label: value" pattern.
#[derive(Debug, Clone, Copy)]
pub struct FallbackPattern {
    pub field: &'static str,
    /// Alternation of the labels that introduce the value. Word labels carry
    /// their own `\b` so symbol labels such as `#` can match too.
    pub labels: &'static str,
    /// Shape of the value itself.
    pub value: &'static str,
}

/// Patterns tried in this order.
pub const FALLBACK_PATTERNS: &[FallbackPattern] = &[
    FallbackPattern {
        field: "id_number",
        labels: r"\bID\s*(?:No\.?|Number|#)?|#",
        value: r"[A-Z0-9]{6,}\b",
    },
    FallbackPattern {
        field: "roll_number",
        labels: r"\bRoll\s*(?:Number|No\.?)",
        value: r"[A-Z0-9]{6,15}\b",
    },
    FallbackPattern {
        field: "date",
        labels: r"\b(?:Date\s+of\s+Birth|Date|DOB)",
        value: r"\d{2}[-/]\d{2}[-/]\d{4}",
    },
    FallbackPattern {
        field: "email",
        labels: r"\bE-?mail",
        value: r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b",
    },
    FallbackPattern {
        field: "phone",
        labels: r"\b(?:Phone|Mobile|Tel)",
        value: r"(?:\+\d{1,3}[-\s]?)?\d{3}[-\s]?\d{3}[-\s]?\d{4}",
    },
    FallbackPattern {
        field: "name",
        labels: r"\bName",
        value: r"[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*",
    },
    FallbackPattern {
        field: "college",
        labels: r"\b(?:College|Institution)",
        value: r"[A-Za-z\s.,&\-]+",
    },
    FallbackPattern {
        field: "branch",
        labels: r"\b(?:Branch|Department)",
        value: r"[A-Za-z\s]+",
    },
];

lazy_static! {
    static ref COMPILED_PATTERNS: Vec<(&'static str, Regex)> = FALLBACK_PATTERNS
        .iter()
        .map(|p| {
            let pattern = format!(r"(?i)(?:{})\s*:\s*({})", p.labels, p.value);
            (p.field, Regex::new(&pattern).unwrap())
        })
        .collect();

    // Start of the next "Label:" on the line, for any known label.
    static ref LABEL_BOUNDARY: Regex = {
        let labels: Vec<&str> = FALLBACK_PATTERNS.iter().map(|p| p.labels).collect();
        Regex::new(&format!(r"(?i)(?:{})\s*:", labels.join("|"))).unwrap()
    };

    static ref DISALLOWED_CHARS: Regex = Regex::new(r"[^\w\s@.\-]").unwrap();
}

/// Value for `field` by its fallback pattern, cut short at the next label.
pub fn match_field(field: &str, text: &str) -> Option<String> {
    let (_, regex) = COMPILED_PATTERNS.iter().find(|(name, _)| *name == field)?;
    capture(regex, text)
}

fn capture(regex: &Regex, text: &str) -> Option<String> {
    let value = regex.captures(text)?.get(1)?;
    let mut end = value.end();
    if let Some(next) = LABEL_BOUNDARY.find_at(text, value.start()) {
        if next.start() < end {
            end = next.start();
        }
    }
    let trimmed = text[value.start()..end].trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Every field the fallback patterns find in `text`.
pub fn extract_fields(text: &str) -> BTreeMap<String, String> {
    let normalized = normalize_whitespace(text);
    COMPILED_PATTERNS
        .iter()
        .filter_map(|(field, regex)| {
            capture(regex, &normalized).map(|value| (field.to_string(), clean_field_value(&value)))
        })
        .collect()
}

/// Fields covered by a fallback pattern, in match order.
pub fn fallback_fields() -> impl Iterator<Item = &'static str> {
    FALLBACK_PATTERNS.iter().map(|p| p.field)
}

/// Drop characters other than word characters, whitespace, `@`, `.` and `-`,
/// then trim.
pub fn clean_field_value(value: &str) -> String {
    DISALLOWED_CHARS.replace_all(value, "").trim().to_string()
}
