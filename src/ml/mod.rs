// Entity recognition for card fields: dataset building, training, evaluation
// and the tagger used at extraction time.

pub mod dataset;
pub mod evaluation;
pub mod feature_extraction;
pub mod model;
pub mod training;

pub use dataset::{build_example, load_records, prepare_training_data};
pub use evaluation::{evaluate_model, EvaluationReport, LabelMetrics};
pub use model::{EntityModel, EntityPrediction, EntityRecognizer};
pub use training::{train_model, ModelTrainer, TrainerConfig, TrainingOutcome, TrainingReport};
