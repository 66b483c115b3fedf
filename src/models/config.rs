use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::utils::{CardError, Result};

/// Letters, digits and the punctuation the card layouts actually use.
pub const DEFAULT_CHAR_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-,. ";

/// Top-level configuration, normally read from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub tesseract: TesseractConfig,
    pub preprocessing: PreprocessingConfig,
    pub text: TextConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TesseractConfig {
    pub lang: String,
    /// Engine mode: 0 legacy, 1 LSTM only, 2 combined, 3 default.
    pub oem: u8,
    /// Page segmentation mode, same numbering as the tesseract CLI.
    pub psm: u8,
    pub char_whitelist: String,
    pub dpi: u32,
    pub data_path: Option<String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            lang: "eng".to_string(),
            oem: 1,
            psm: 6,
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            dpi: 300,
            data_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMethod {
    Adaptive,
    Otsu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreprocessingConfig {
    pub resize_width: u32,
    pub threshold_method: ThresholdMethod,
    /// Side of the square window used by adaptive thresholding (odd).
    pub adaptive_block_size: u32,
    /// Subtracted from the local mean before comparing.
    pub adaptive_offset: i32,
    pub denoise: bool,
    pub sharpen: bool,
    pub deskew: bool,
    pub morph_cleanup: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            resize_width: 2400,
            threshold_method: ThresholdMethod::Adaptive,
            adaptive_block_size: 21,
            adaptive_offset: 11,
            denoise: true,
            sharpen: true,
            deskew: true,
            morph_cleanup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextConfig {
    /// Tokens at or below this engine confidence (0-100) are dropped.
    pub min_token_confidence: f32,
    /// Replace 0/1/5 with O/I/S. Lossy: corrupts identifiers and dates.
    pub substitute_confusables: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            min_token_confidence: 30.0,
            substitute_confusables: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    pub path: PathBuf,
    pub acceptance_threshold: f32,
    pub allow_blank_fallback: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("trained_models/ner"),
            acceptance_threshold: 0.7,
            allow_blank_fallback: true,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| CardError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| CardError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.tesseract.lang, "eng");
        assert_eq!(config.tesseract.oem, 1);
        assert_eq!(config.tesseract.psm, 6);
        assert_eq!(config.preprocessing.resize_width, 2400);
        assert_eq!(config.preprocessing.threshold_method, ThresholdMethod::Adaptive);
        assert!(config.preprocessing.denoise);
        assert!(config.preprocessing.morph_cleanup);
        assert_eq!(config.text.min_token_confidence, 30.0);
        assert!((config.model.acceptance_threshold - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = Config::from_json(
            r#"{"preprocessing": {"thresholdMethod": "otsu", "resizeWidth": 1200}, "text": {"substituteConfusables": false}}"#,
        )
        .unwrap();
        assert_eq!(config.preprocessing.threshold_method, ThresholdMethod::Otsu);
        assert_eq!(config.preprocessing.resize_width, 1200);
        assert!(config.preprocessing.deskew);
        assert!(!config.text.substitute_confusables);
        assert_eq!(config.tesseract, TesseractConfig::default());
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CardError::Config(_)));
    }

    #[test]
    fn malformed_file_names_path_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let message = Config::load(&path).unwrap_err().to_string();
        assert!(message.starts_with("Configuration error: "));
        assert_eq!(message.matches("Configuration error").count(), 1);
        assert!(message.contains("config.json"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unknown_threshold_method_is_rejected() {
        let err = Config::from_json(r#"{"preprocessing": {"thresholdMethod": "sauvola"}}"#);
        assert!(err.is_err());
    }
}
