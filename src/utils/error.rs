use thiserror::Error;

/// Errors surfaced by the extraction core.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR backend not available, build with the `tesseract` feature")]
    OcrUnavailable,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CardError>;

impl From<image::ImageError> for CardError {
    fn from(err: image::ImageError) -> Self {
        CardError::InvalidImage(err.to_string())
    }
}
