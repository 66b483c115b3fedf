use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::ml::feature_extraction::{token_features, tokenize, Token};
use crate::models::EntitySpan;
use crate::utils::{CardError, Result};

/// File written inside a model directory.
pub const MODEL_FILE: &str = "model.json";
const FORMAT_VERSION: u32 = 1;

/// A span predicted by a recognizer, with its confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPrediction {
    pub span: EntitySpan,
    pub confidence: f32,
}

/// Anything that tags entity spans in text.
///
/// Implementations are read-only after construction so a single instance can be
/// shared across threads.
pub trait EntityRecognizer: Send + Sync {
    /// Non-overlapping predictions ordered by start offset.
    fn predict(&self, text: &str) -> Vec<EntityPrediction>;

    fn labels(&self) -> &[String];
}

/// Greedy BIO tagger backed by an averaged perceptron.
///
/// Tag index 0 is `O`; label `k` owns `B` at `1 + 2k` and `I` at `2 + 2k`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityModel {
    version: u32,
    labels: Vec<String>,
    weights: HashMap<String, Vec<f32>>,
}

impl EntityModel {
    /// A model with no labels. Predicts nothing.
    pub fn blank() -> Self {
        Self {
            version: FORMAT_VERSION,
            labels: Vec::new(),
            weights: HashMap::new(),
        }
    }

    pub(crate) fn from_parts(labels: Vec<String>, weights: HashMap<String, Vec<f32>>) -> Self {
        Self {
            version: FORMAT_VERSION,
            labels,
            weights,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn tag_count(&self) -> usize {
        tag_count(self.labels.len())
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let path = dir.join(MODEL_FILE);
        fs::write(&path, serde_json::to_string(self)?)?;
        info!(
            "Saved entity model with {} labels to {}",
            self.labels.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MODEL_FILE);
        let raw = fs::read_to_string(&path).map_err(|e| {
            CardError::Model(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let model: EntityModel = serde_json::from_str(&raw)
            .map_err(|e| CardError::Model(format!("Malformed {}: {}", path.display(), e)))?;

        if model.version != FORMAT_VERSION {
            return Err(CardError::Model(format!(
                "Unsupported model version {} in {}",
                model.version,
                path.display()
            )));
        }
        let expected = model.tag_count();
        if let Some((feature, _)) = model.weights.iter().find(|(_, w)| w.len() != expected) {
            return Err(CardError::Model(format!(
                "Feature {:?} has the wrong number of weights",
                feature
            )));
        }
        Ok(model)
    }

    /// Load from `dir`, or fall back to a blank model when allowed.
    pub fn load_or_blank(dir: &Path, allow_blank: bool) -> Result<Self> {
        match Self::load(dir) {
            Ok(model) => Ok(model),
            Err(e) if allow_blank => {
                warn!("{}; continuing with a blank model, only patterns will match", e);
                Ok(Self::blank())
            }
            Err(e) => Err(e),
        }
    }

    fn decode(&self, tokens: &[Token<'_>]) -> Vec<(usize, f32)> {
        let mut tags = Vec::with_capacity(tokens.len());
        let mut prev = OUTSIDE;
        for i in 0..tokens.len() {
            let features = token_features(tokens, i, &self.tag_name(prev));
            let scores = score(&self.weights, &features, self.tag_count());
            let (tag, probability) = best_allowed(&scores, prev);
            tags.push((tag, probability));
            prev = tag;
        }
        tags
    }

    pub(crate) fn tag_name(&self, tag: usize) -> String {
        tag_name(&self.labels, tag)
    }
}

impl EntityRecognizer for EntityModel {
    fn predict(&self, text: &str) -> Vec<EntityPrediction> {
        if self.is_blank() {
            return Vec::new();
        }
        let tokens = tokenize(text);
        let tags = self.decode(&tokens);

        let mut predictions = Vec::new();
        let mut open: Option<(usize, usize, usize, Vec<f32>)> = None;

        for (token, (tag, probability)) in tokens.iter().zip(tags) {
            match tag_label(tag) {
                Some((label, false)) if matches!(open, Some((l, ..)) if l == label) => {
                    if let Some((_, _, end, probs)) = open.as_mut() {
                        *end = token.end;
                        probs.push(probability);
                    }
                }
                Some((label, _)) => {
                    if let Some(done) = open.take() {
                        predictions.push(self.finish(done));
                    }
                    open = Some((label, token.start, token.end, vec![probability]));
                }
                None => {
                    if let Some(done) = open.take() {
                        predictions.push(self.finish(done));
                    }
                }
            }
        }
        if let Some(done) = open.take() {
            predictions.push(self.finish(done));
        }
        predictions
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl EntityModel {
    fn finish(&self, (label, start, end, probs): (usize, usize, usize, Vec<f32>)) -> EntityPrediction {
        let confidence = probs.iter().sum::<f32>() / probs.len().max(1) as f32;
        EntityPrediction {
            span: EntitySpan::new(start, end, self.labels[label].clone()),
            confidence,
        }
    }
}

pub(crate) const OUTSIDE: usize = 0;

pub(crate) fn tag_count(label_count: usize) -> usize {
    1 + 2 * label_count
}

pub(crate) fn begin_tag(label: usize) -> usize {
    1 + 2 * label
}

pub(crate) fn inside_tag(label: usize) -> usize {
    2 + 2 * label
}

/// `(label index, is_begin)` for a non-`O` tag.
pub(crate) fn tag_label(tag: usize) -> Option<(usize, bool)> {
    if tag == OUTSIDE {
        None
    } else {
        Some(((tag - 1) / 2, tag % 2 == 1))
    }
}

pub(crate) fn tag_name(labels: &[String], tag: usize) -> String {
    match tag_label(tag) {
        None => "O".to_string(),
        Some((label, true)) => format!("B-{}", labels[label]),
        Some((label, false)) => format!("I-{}", labels[label]),
    }
}

/// `I-X` may only follow `B-X` or `I-X`.
pub(crate) fn transition_allowed(prev: usize, next: usize) -> bool {
    match tag_label(next) {
        Some((label, false)) => matches!(tag_label(prev), Some((l, _)) if l == label),
        _ => true,
    }
}

pub(crate) fn score(weights: &HashMap<String, Vec<f32>>, features: &[String], tags: usize) -> Vec<f32> {
    let mut scores = vec![0.0f32; tags];
    for feature in features {
        if let Some(w) = weights.get(feature) {
            for (s, v) in scores.iter_mut().zip(w) {
                *s += v;
            }
        }
    }
    scores
}

/// Highest-scoring tag allowed after `prev`, with its softmax probability among
/// the allowed tags.
pub(crate) fn best_allowed(scores: &[f32], prev: usize) -> (usize, f32) {
    let allowed: Vec<usize> = (0..scores.len())
        .filter(|&t| transition_allowed(prev, t))
        .collect();

    let mut best = OUTSIDE;
    for &t in &allowed {
        if scores[t] > scores[best] {
            best = t;
        }
    }

    let max = scores[best];
    let total: f32 = allowed.iter().map(|&t| (scores[t] - max).exp()).sum();
    (best, 1.0 / total)
}
