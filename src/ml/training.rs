// Training for the entity tagger
// Shuffles labeled examples, holds out a test split and fits an averaged
// perceptron with feature dropout and mini-batch updates.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::feature_extraction::{token_features, tokenize, Token};
use super::model::{
    begin_tag, best_allowed, inside_tag, tag_count, tag_name, EntityModel, OUTSIDE,
};
use crate::models::{EntitySpan, TrainingExample};
use crate::utils::{CardError, Result};

/// Parameters for [`ModelTrainer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub iterations: usize,
    pub batch_size: usize,
    /// Probability of dropping each feature during a training step.
    pub dropout: f32,
    /// Share of the shuffled examples used for fitting; the rest is held out.
    pub train_fraction: f32,
    /// Fixed seed for a reproducible shuffle and dropout.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            batch_size: 4,
            dropout: 0.2,
            train_fraction: 0.8,
            seed: None,
        }
    }
}

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub labels: Vec<String>,
    pub train_size: usize,
    pub held_out_size: usize,
    /// Tagging mistakes per iteration.
    pub iteration_losses: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: EntityModel,
    pub held_out: Vec<TrainingExample>,
    pub report: TrainingReport,
}

/// Model trainer for entity spans
pub struct ModelTrainer {
    config: TrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Fit a model and return it with the held-out examples.
    pub fn train(&self, mut examples: Vec<TrainingExample>) -> Result<TrainingOutcome> {
        if examples.is_empty() {
            return Err(CardError::Dataset("No training examples".to_string()));
        }
        if self.config.batch_size == 0 {
            return Err(CardError::Config("batch_size must be positive".to_string()));
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        examples.shuffle(&mut rng);

        let split = split_index(examples.len(), self.config.train_fraction);
        let held_out = examples.split_off(split);
        let train = examples;

        let labels: Vec<String> = train
            .iter()
            .chain(held_out.iter())
            .flat_map(|e| e.spans.iter().map(|s| s.label.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        info!(
            "Training on {} examples ({} held out) with labels {:?}",
            train.len(),
            held_out.len(),
            labels
        );

        let mut perceptron = Perceptron::new(tag_count(labels.len()));
        let mut iteration_losses = Vec::with_capacity(self.config.iterations);

        for iteration in 0..self.config.iterations {
            let mut order: Vec<usize> = (0..train.len()).collect();
            order.shuffle(&mut rng);

            let mut loss = 0.0;
            for batch in order.chunks(self.config.batch_size) {
                let mut deltas: HashMap<(String, usize), f32> = HashMap::new();
                for &idx in batch {
                    loss += self.accumulate(&perceptron, &labels, &train[idx], &mut rng, &mut deltas);
                }
                perceptron.apply(deltas);
            }

            info!("Iteration {}: loss {}", iteration + 1, loss);
            iteration_losses.push(loss);
        }

        let model = EntityModel::from_parts(labels.clone(), perceptron.averaged());
        let report = TrainingReport {
            labels,
            train_size: train.len(),
            held_out_size: held_out.len(),
            iteration_losses,
        };
        Ok(TrainingOutcome {
            model,
            held_out,
            report,
        })
    }

    /// Train and persist the model under `output_dir`.
    pub fn train_and_save(
        &self,
        examples: Vec<TrainingExample>,
        output_dir: &Path,
    ) -> Result<TrainingOutcome> {
        let outcome = self.train(examples)?;
        outcome.model.save(output_dir)?;
        Ok(outcome)
    }

    /// Tag one example greedily along the gold history and record the updates
    /// for every mistake. Returns the number of mistakes.
    fn accumulate(
        &self,
        perceptron: &Perceptron,
        labels: &[String],
        example: &TrainingExample,
        rng: &mut StdRng,
        deltas: &mut HashMap<(String, usize), f32>,
    ) -> f64 {
        let tokens = tokenize(&example.text);
        let gold = gold_tags(&tokens, &example.spans, labels);

        let mut mistakes = 0.0;
        let mut prev = OUTSIDE;
        for (i, &expected) in gold.iter().enumerate() {
            let features: Vec<String> = token_features(&tokens, i, &tag_name(labels, prev))
                .into_iter()
                .filter(|_| rng.gen::<f32>() >= self.config.dropout)
                .collect();

            let scores = perceptron.score(&features);
            let (predicted, _) = best_allowed(&scores, prev);
            if predicted != expected {
                mistakes += 1.0;
                for feature in features {
                    *deltas.entry((feature.clone(), expected)).or_insert(0.0) += 1.0;
                    *deltas.entry((feature, predicted)).or_insert(0.0) -= 1.0;
                }
            }
            prev = expected;
        }
        mistakes
    }
}

/// Train with default settings and `iterations` passes, save to `output_dir`
/// and return the held-out examples.
pub fn train_model(
    examples: Vec<TrainingExample>,
    output_dir: &Path,
    iterations: usize,
) -> Result<Vec<TrainingExample>> {
    let trainer = ModelTrainer::new(TrainerConfig {
        iterations,
        ..TrainerConfig::default()
    });
    Ok(trainer.train_and_save(examples, output_dir)?.held_out)
}

fn split_index(len: usize, train_fraction: f32) -> usize {
    let fraction = train_fraction.clamp(0.0, 1.0) as f64;
    ((len as f64 * fraction) as usize).min(len)
}

/// BIO tag per token. Tokens not fully inside a span are `O`.
pub(crate) fn gold_tags(tokens: &[Token<'_>], spans: &[EntitySpan], labels: &[String]) -> Vec<usize> {
    let mut tags = vec![OUTSIDE; tokens.len()];
    for span in spans {
        let Some(label) = labels.iter().position(|l| *l == span.label) else {
            continue;
        };
        let mut first = true;
        for (i, token) in tokens.iter().enumerate() {
            if token.start >= span.start && token.end <= span.end {
                tags[i] = if first { begin_tag(label) } else { inside_tag(label) };
                first = false;
            }
        }
    }
    tags
}

/// Perceptron weights with lazily averaged totals.
struct Perceptron {
    tags: usize,
    params: HashMap<String, Param>,
    step: u64,
}

struct Param {
    weights: Vec<f32>,
    totals: Vec<f64>,
    stamps: Vec<u64>,
}

impl Perceptron {
    fn new(tags: usize) -> Self {
        Self {
            tags,
            params: HashMap::new(),
            step: 0,
        }
    }

    fn score(&self, features: &[String]) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.tags];
        for feature in features {
            if let Some(param) = self.params.get(feature) {
                for (s, w) in scores.iter_mut().zip(&param.weights) {
                    *s += w;
                }
            }
        }
        scores
    }

    fn apply(&mut self, deltas: HashMap<(String, usize), f32>) {
        self.step += 1;
        let step = self.step;
        let tags = self.tags;
        for ((feature, tag), delta) in deltas {
            if delta == 0.0 {
                continue;
            }
            let param = self.params.entry(feature).or_insert_with(|| Param {
                weights: vec![0.0; tags],
                totals: vec![0.0; tags],
                stamps: vec![0; tags],
            });
            param.totals[tag] += (step - param.stamps[tag]) as f64 * param.weights[tag] as f64;
            param.stamps[tag] = step;
            param.weights[tag] += delta;
        }
    }

    fn averaged(self) -> HashMap<String, Vec<f32>> {
        let step = self.step.max(1);
        self.params
            .into_iter()
            .map(|(feature, param)| {
                let averaged: Vec<f32> = param
                    .weights
                    .iter()
                    .zip(param.totals.iter().zip(&param.stamps))
                    .map(|(&w, (&total, &stamp))| {
                        let total = total + (step.saturating_sub(stamp)) as f64 * w as f64;
                        (total / step as f64) as f32
                    })
                    .collect();
                (feature, averaged)
            })
            .filter(|(_, w)| w.iter().any(|v| *v != 0.0))
            .collect()
    }
}
