// 🚨 Error Taxonomy - Fatal vs per-document failures
// Advisory outcomes (inconclusive motions, match rejections) are values, not errors.

use crate::schema::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// EXTRACTION ERRORS (fatal for one document only)
// ============================================================================

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("no date matching pattern `{pattern}` found in document")]
    DateNotFound { pattern: String },

    #[error("no section starting with any of {start:?} found in document")]
    SectionNotFound { start: Vec<String> },

    #[error("section opened but never closed by any of {end:?}")]
    SectionUnterminated { end: Vec<String> },

    #[error("no fiscal year found in document name {name:?}")]
    YearNotFound { name: String },

    #[error("expected {expected} content in document {name:?}")]
    UnexpectedContent { name: String, expected: &'static str },

    #[error("invalid extraction pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

// ============================================================================
// EMBEDDING ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding model returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding has {got} dimensions, model declares {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("embedding model failed to load: {0}")]
    ModelInit(String),

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("embedding generation failed: {0}")]
    Model(String),
}

// ============================================================================
// CRATE ERROR
// ============================================================================

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("{context}: {}", format_violations(.errors))]
    Schema {
        context: String,
        errors: Vec<ValidationError>,
    },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the failure only concerns the document being processed, so a
    /// batch caller should log it and move on to the next document.
    pub fn is_document_scoped(&self) -> bool {
        matches!(self, Error::Extraction(_))
    }
}

fn format_violations(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
