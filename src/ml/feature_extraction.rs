// Tokenization and per-token feature templates for the entity tagger

/// A token with its byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Split into runs of alphanumeric characters; every other non-space character
/// is a token of its own.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut run_start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            run_start.get_or_insert(idx);
            continue;
        }
        if let Some(start) = run_start.take() {
            tokens.push(Token {
                text: &text[start..idx],
                start,
                end: idx,
            });
        }
        if !ch.is_whitespace() {
            let end = idx + ch.len_utf8();
            tokens.push(Token {
                text: &text[idx..end],
                start: idx,
                end,
            });
        }
    }
    if let Some(start) = run_start {
        tokens.push(Token {
            text: &text[start..],
            start,
            end: text.len(),
        });
    }
    tokens
}

/// Word shape with repeated classes collapsed: "John" -> "Xx", "AB12345" -> "Xd".
pub fn word_shape(word: &str) -> String {
    let mut shape = String::new();
    for ch in word.chars() {
        let class = if ch.is_uppercase() {
            'X'
        } else if ch.is_lowercase() {
            'x'
        } else if ch.is_numeric() {
            'd'
        } else {
            ch
        };
        if !shape.ends_with(class) {
            shape.push(class);
        }
    }
    shape
}

fn prefix(word: &str, n: usize) -> String {
    word.chars().take(n).collect()
}

fn suffix(word: &str, n: usize) -> String {
    let count = word.chars().count();
    word.chars().skip(count.saturating_sub(n)).collect()
}

fn context_word(tokens: &[Token<'_>], idx: isize) -> String {
    if idx < 0 {
        return "<s>".to_string();
    }
    match tokens.get(idx as usize) {
        Some(token) => token.text.to_lowercase(),
        None => "</s>".to_string(),
    }
}

/// Feature strings for token `i`, given the tag assigned to the previous token.
pub fn token_features(tokens: &[Token<'_>], i: usize, prev_tag: &str) -> Vec<String> {
    let word = tokens[i].text;
    let lower = word.to_lowercase();
    let at = i as isize;

    let prev = context_word(tokens, at - 1);
    let prev2 = context_word(tokens, at - 2);
    let next = context_word(tokens, at + 1);
    let next2 = context_word(tokens, at + 2);

    let mut features = vec![
        "bias".to_string(),
        format!("w={}", lower),
        format!("p3={}", prefix(&lower, 3)),
        format!("s3={}", suffix(&lower, 3)),
        format!("shape={}", word_shape(word)),
        format!("len={}", word.chars().count().min(8)),
        format!("w-1={}", prev),
        format!("w-2={}", prev2),
        format!("w+1={}", next),
        format!("w+2={}", next2),
        format!("w-2|w-1={}|{}", prev2, prev),
        format!("w+1|w+2={}|{}", next, next2),
        format!("t-1={}", prev_tag),
        format!("t-1|w-1={}|{}", prev_tag, prev),
        format!("t-1|shape={}|{}", prev_tag, word_shape(word)),
    ];

    if word.chars().any(|c| c.is_numeric()) {
        features.push("has-digit".to_string());
    }
    if word.chars().all(|c| c.is_numeric()) {
        features.push("all-digit".to_string());
    }
    if word.chars().all(|c| !c.is_lowercase()) && word.chars().any(|c| c.is_uppercase()) {
        features.push("all-upper".to_string());
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_words_and_punctuation() {
        let tokens = tokenize("Name: John-Smith, AB12345");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["Name", ":", "John", "-", "Smith", ",", "AB12345"]);
        assert_eq!((tokens[2].start, tokens[2].end), (6, 10));
    }

    #[test]
    fn token_offsets_slice_back_to_text() {
        let text = "Émile Zoë: d@x.io";
        for token in tokenize(text) {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert!(tokenize("   \n ").is_empty());
    }

    #[test]
    fn shapes() {
        assert_eq!(word_shape("John"), "Xx");
        assert_eq!(word_shape("AB12345"), "Xd");
        assert_eq!(word_shape("12-03-2001"), "d-d-d");
    }

    #[test]
    fn features_include_context_and_history() {
        let tokens = tokenize("Name: John Smith");
        let features = token_features(&tokens, 2, "O");
        assert!(features.contains(&"w=john".to_string()));
        assert!(features.contains(&"w-1=:".to_string()));
        assert!(features.contains(&"w-2=name".to_string()));
        assert!(features.contains(&"w+2=</s>".to_string()));
        assert!(features.contains(&"t-1=O".to_string()));
    }
}
