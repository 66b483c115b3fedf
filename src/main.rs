// Command-line entry point for ID card field extraction

use std::path::PathBuf;
use std::sync::Arc;

use cardex::ml::{
    evaluate_model, prepare_training_data, EntityModel, ModelTrainer, TrainerConfig,
};
use cardex::models::Config;
use cardex::processing::FieldExtractor;
use cardex::utils::Result;
use cardex::IdCardProcessor;
use clap::{Parser, Subcommand};
use log::error;
use serde_json::json;

#[derive(Parser)]
#[command(name = "cardex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract structured fields from photographed ID cards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// OCR a card image and print its fields as JSON
    Extract {
        image: PathBuf,
        /// JSON configuration file
        #[arg(long, default_value = "config.json")]
        config: PathBuf,
        /// Minimum field confidence, overrides the configured value
        #[arg(long)]
        threshold: Option<f32>,
        /// Keep the digits 0, 1 and 5 instead of mapping them to letters
        #[arg(long)]
        keep_digits: bool,
    },
    /// Extract fields from already recognized text
    Fields {
        text: String,
        /// Trained model directory; patterns only when absent
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Train an entity model from labeled JSON records
    Train {
        records: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 50)]
        iterations: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Score a trained model against labeled JSON records
    Evaluate {
        records: PathBuf,
        #[arg(long, default_value = "trained_models/ner")]
        model: PathBuf,
    },
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Extract {
            image,
            config,
            threshold,
            keep_digits,
        } => {
            let mut config = Config::load(&config)?;
            if keep_digits {
                config.text.substitute_confusables = false;
            }
            let processor = IdCardProcessor::from_config(&config)?;
            let result = processor.process(&image, threshold)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Fields { text, model } => {
            let extractor = match model {
                Some(dir) => FieldExtractor::new(Arc::new(EntityModel::load(&dir)?)),
                None => FieldExtractor::pattern_only(),
            };
            let fields = extractor.extract(&text);
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        Command::Train {
            records,
            output,
            iterations,
            seed,
        } => {
            let examples = prepare_training_data(&records)?;
            let trainer = ModelTrainer::new(TrainerConfig {
                iterations,
                seed,
                ..TrainerConfig::default()
            });
            let outcome = trainer.train_and_save(examples, &output)?;
            let evaluation = evaluate_model(&outcome.model, &outcome.held_out);
            let summary = json!({
                "training": outcome.report,
                "evaluation": evaluation,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Evaluate { records, model } => {
            let model = EntityModel::load(&model)?;
            let examples = prepare_training_data(&records)?;
            let report = evaluate_model(&model, &examples);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        error!("{}", err);
        std::process::exit(1);
    }
}
