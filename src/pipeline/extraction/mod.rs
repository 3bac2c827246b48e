pub mod types;
pub mod loader;
pub mod sharpness;
pub mod confidence;
pub mod ocr;
pub mod rotation;
pub mod patterns;
pub mod parser;
pub mod orchestrator;
pub mod batch;

pub use types::*;
pub use loader::*;
pub use sharpness::*;
pub use ocr::*;
pub use rotation::*;
pub use patterns::*;
pub use parser::*;
pub use orchestrator::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Invalid pattern for field '{field}' in matcher '{matcher}': {reason}")]
    MatcherConfig {
        matcher: String,
        field: String,
        reason: String,
    },

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
