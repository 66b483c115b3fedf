use std::path::Path;

use image::GrayImage;
use log::{debug, info};

use crate::models::{Config, ExtractedText, RawDocument};
use crate::processing::image::ImageNormalizer;
use crate::processing::text::{clean_ocr_text, CleaningOptions};
use crate::utils::{CardError, Result};

/// One word reported by an OCR engine, confidence on a 0-100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedWord {
    pub text: String,
    pub confidence: f32,
}

impl RecognizedWord {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Abstraction over the recognition backend.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<RecognizedWord>>;
}

/// Parse the word rows (level 5) of tesseract TSV output.
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedWord> {
    tsv.lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.splitn(12, '\t').collect();
            if columns.len() < 12 || columns[0].trim() != "5" {
                return None;
            }
            let confidence = columns[10].trim().parse::<f32>().ok()?;
            Some(RecognizedWord::new(columns[11].trim_end_matches(&['\r', '\n'][..]), confidence))
        })
        .collect()
}

/// Keep words above `min_confidence`, join them with spaces and compute the
/// length-weighted mean confidence. No surviving words means empty text at 0.0.
pub fn aggregate_words(
    words: &[RecognizedWord],
    min_confidence: f32,
    cleaning: CleaningOptions,
) -> ExtractedText {
    let kept: Vec<(&str, f32)> = words
        .iter()
        .filter(|word| word.confidence > min_confidence)
        .map(|word| (word.text.trim(), word.confidence))
        .filter(|(text, _)| !text.is_empty())
        .collect();

    let total_length: usize = kept.iter().map(|(text, _)| text.chars().count()).sum();
    if total_length == 0 {
        return ExtractedText::empty();
    }

    let weighted: f32 = kept
        .iter()
        .map(|(text, confidence)| confidence * text.chars().count() as f32)
        .sum();
    let joined = kept.iter().map(|(text, _)| *text).collect::<Vec<_>>().join(" ");

    ExtractedText {
        text: clean_ocr_text(&joined, cleaning),
        confidence: (weighted / total_length as f32).clamp(0.0, 100.0),
    }
}

/// Normalizes a card image, runs OCR and aggregates the words.
pub struct TextExtractor {
    normalizer: ImageNormalizer,
    engine: Box<dyn OcrEngine>,
    min_confidence: f32,
    cleaning: CleaningOptions,
}

impl TextExtractor {
    pub fn new(config: &Config, engine: Box<dyn OcrEngine>) -> Self {
        Self {
            normalizer: ImageNormalizer::new(config.preprocessing.clone()),
            engine,
            min_confidence: config.text.min_token_confidence,
            cleaning: CleaningOptions {
                substitute_confusables: config.text.substitute_confusables,
            },
        }
    }

    /// Build with the Tesseract backend when compiled in.
    pub fn from_config(config: &Config) -> Result<Self> {
        #[cfg(feature = "tesseract")]
        {
            let engine = tesseract_backend::TesseractEngine::new(config.tesseract.clone());
            Ok(Self::new(config, Box::new(engine)))
        }
        #[cfg(not(feature = "tesseract"))]
        {
            let _ = config;
            Err(CardError::OcrUnavailable)
        }
    }

    pub fn extract_text<P: AsRef<Path>>(&self, image_path: P) -> Result<ExtractedText> {
        let document = RawDocument::open(image_path)?;
        self.extract_from_document(&document)
    }

    pub fn extract_from_document(&self, document: &RawDocument) -> Result<ExtractedText> {
        let normalized = self.normalizer.normalize(document)?;
        let words = self.engine.recognize(&normalized)?;
        debug!("OCR returned {} words for {}", words.len(), document.source.display());

        let extracted = aggregate_words(&words, self.min_confidence, self.cleaning);
        info!(
            "Extracted {} characters from {} (confidence {:.1})",
            extracted.text.len(),
            document.source.display(),
            extracted.confidence
        );
        Ok(extracted)
    }
}

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use image::{GrayImage, ImageFormat};
    use tesseract::{OcrEngineMode, PageSegMode, Tesseract};

    use super::{parse_tsv, OcrEngine, RecognizedWord};
    use crate::models::TesseractConfig;
    use crate::utils::{CardError, Result};

    pub struct TesseractEngine {
        config: TesseractConfig,
    }

    impl TesseractEngine {
        pub fn new(config: TesseractConfig) -> Self {
            Self { config }
        }
    }

    fn engine_mode(oem: u8) -> Result<OcrEngineMode> {
        match oem {
            0 => Ok(OcrEngineMode::TesseractOnly),
            1 => Ok(OcrEngineMode::LstmOnly),
            2 => Ok(OcrEngineMode::TesseractLstmCombined),
            3 => Ok(OcrEngineMode::Default),
            other => Err(CardError::Config(format!("Unknown tesseract oem {}", other))),
        }
    }

    fn page_seg_mode(psm: u8) -> Result<PageSegMode> {
        let mode = match psm {
            0 => PageSegMode::PsmOsdOnly,
            1 => PageSegMode::PsmAutoOsd,
            2 => PageSegMode::PsmAutoOnly,
            3 => PageSegMode::PsmAuto,
            4 => PageSegMode::PsmSingleColumn,
            5 => PageSegMode::PsmSingleBlockVertText,
            6 => PageSegMode::PsmSingleBlock,
            7 => PageSegMode::PsmSingleLine,
            8 => PageSegMode::PsmSingleWord,
            9 => PageSegMode::PsmCircleWord,
            10 => PageSegMode::PsmSingleChar,
            11 => PageSegMode::PsmSparseText,
            12 => PageSegMode::PsmSparseTextOsd,
            13 => PageSegMode::PsmRawLine,
            other => return Err(CardError::Config(format!("Unknown tesseract psm {}", other))),
        };
        Ok(mode)
    }

    impl OcrEngine for TesseractEngine {
        fn recognize(&self, image: &GrayImage) -> Result<Vec<RecognizedWord>> {
            // The engine reads from disk, so hand it the normalized page as a PNG.
            let temp_file = tempfile::Builder::new().suffix(".png").tempfile()?;
            image
                .save_with_format(temp_file.path(), ImageFormat::Png)
                .map_err(|e| CardError::Ocr(format!("Failed to write page image: {}", e)))?;
            let path = temp_file
                .path()
                .to_str()
                .ok_or_else(|| CardError::Ocr("Temporary path is not valid UTF-8".to_string()))?;

            let mut tess = Tesseract::new_with_oem(
                self.config.data_path.as_deref(),
                Some(&self.config.lang),
                engine_mode(self.config.oem)?,
            )
            .map_err(|e| CardError::Ocr(format!("Tesseract init error: {}", e)))?
            .set_variable("tessedit_char_whitelist", &self.config.char_whitelist)
            .map_err(|e| CardError::Ocr(format!("Tesseract set variable error: {}", e)))?
            .set_variable("user_defined_dpi", &self.config.dpi.to_string())
            .map_err(|e| CardError::Ocr(format!("Tesseract set variable error: {}", e)))?;

            tess.set_page_seg_mode(page_seg_mode(self.config.psm)?);

            let mut tess = tess
                .set_image(path)
                .map_err(|e| CardError::Ocr(format!("Tesseract set image error: {}", e)))?
                .recognize()
                .map_err(|e| CardError::Ocr(format!("Tesseract recognition error: {}", e)))?;

            let tsv = tess
                .get_tsv_text(0)
                .map_err(|e| CardError::Ocr(format!("Tesseract error: {}", e)))?;
            Ok(parse_tsv(&tsv))
        }
    }
}
