// Text clean-up shared by the OCR stage and the field extractor.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Options for [`clean_ocr_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningOptions {
    /// Map the digits 0, 1, 5 to the letters O, I, S.
    ///
    /// Helps with stylized uppercase fonts but is lossy: it corrupts roll
    /// numbers, dates and anything else made of digits. Turn it off for cards
    /// whose fields are mostly numeric.
    pub substitute_confusables: bool,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            substitute_confusables: true,
        }
    }
}

/// Collapse whitespace runs to a single space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

/// Invisible formatting characters: soft hyphen, zero-width and joiner marks,
/// bidi controls, word joiners, byte-order mark.
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{061C}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
    )
}

fn is_private_use(c: char) -> bool {
    matches!(c, '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{10FFFF}')
}

/// Printable characters plus ASCII whitespace, which separates words until
/// it is collapsed. Non-ASCII spaces such as U+00A0 are dropped.
fn is_printable(c: char) -> bool {
    if c.is_ascii_whitespace() {
        return true;
    }
    !(c.is_control() || c.is_whitespace() || is_format_char(c) || is_private_use(c))
}

/// Strip non-printable characters, collapse whitespace, optionally apply the
/// digit/letter substitution, trim.
pub fn clean_ocr_text(text: &str, options: CleaningOptions) -> String {
    let printable: String = text.chars().filter(|&c| is_printable(c)).collect();
    let collapsed = normalize_whitespace(&printable);
    if !options.substitute_confusables {
        return collapsed;
    }
    collapsed
        .chars()
        .map(|c| match c {
            '0' => 'O',
            '1' => 'I',
            '5' => 'S',
            other => other,
        })
        .collect()
}
