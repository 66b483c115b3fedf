// Span-level scoring of an entity recognizer against labeled examples

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::{Deserialize, Serialize};

use super::model::EntityRecognizer;
use crate::models::{EntitySpan, TrainingExample};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl LabelMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let (precision, recall, f1) = precision_recall_f1(tp, fp, fn_);
        Self {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            precision,
            recall,
            f1,
        }
    }
}

/// Predicted and gold spans for one example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleResult {
    pub text: String,
    pub predicted: Vec<EntitySpan>,
    pub actual: Vec<EntitySpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub per_label: BTreeMap<String, LabelMetrics>,
    pub examples: Vec<ExampleResult>,
}

/// Ratios are 0 when their denominator is 0.
pub fn precision_recall_f1(tp: usize, fp: usize, fn_: usize) -> (f64, f64, f64) {
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    (precision, recall, f1)
}

/// Compare predictions with gold spans by exact `(start, end, label)` match.
///
/// Overall figures are micro-averaged over all labels.
pub fn evaluate_model(model: &dyn EntityRecognizer, examples: &[TrainingExample]) -> EvaluationReport {
    let mut counts: BTreeMap<String, (usize, usize, usize)> = BTreeMap::new();
    let mut results = Vec::with_capacity(examples.len());

    for example in examples {
        let predicted: BTreeSet<EntitySpan> = model
            .predict(&example.text)
            .into_iter()
            .map(|p| p.span)
            .collect();
        let actual: BTreeSet<EntitySpan> = example.spans.iter().cloned().collect();

        for span in predicted.intersection(&actual) {
            counts.entry(span.label.clone()).or_default().0 += 1;
        }
        for span in predicted.difference(&actual) {
            counts.entry(span.label.clone()).or_default().1 += 1;
        }
        for span in actual.difference(&predicted) {
            counts.entry(span.label.clone()).or_default().2 += 1;
        }

        results.push(ExampleResult {
            text: example.text.clone(),
            predicted: predicted.into_iter().collect(),
            actual: actual.into_iter().collect(),
        });
    }

    let (tp, fp, fn_) = counts
        .values()
        .fold((0, 0, 0), |acc, c| (acc.0 + c.0, acc.1 + c.1, acc.2 + c.2));
    let (precision, recall, f1) = precision_recall_f1(tp, fp, fn_);

    let per_label = counts
        .into_iter()
        .map(|(label, (tp, fp, fn_))| (label, LabelMetrics::from_counts(tp, fp, fn_)))
        .collect();

    info!(
        "Evaluated {} examples: precision {:.3}, recall {:.3}, f1 {:.3}",
        examples.len(),
        precision,
        recall,
        f1
    );

    EvaluationReport {
        precision,
        recall,
        f1,
        per_label,
        examples: results,
    }
}
