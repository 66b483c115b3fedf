pub mod id_card_processor;
pub mod ml;
pub mod models;
pub mod processing;
pub mod utils;

pub use id_card_processor::IdCardProcessor;
