//! Error types for the loan approval pipeline

use std::io;
use std::path::PathBuf;

/// Dataset missing or malformed. Fatal for training and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("dataset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read dataset {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("invalid value {value:?} for column {column} at line {line}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },

    #[error("invalid label {value:?} at line {line} (expected 0 or 1)")]
    InvalidLabel { line: u64, value: String },

    #[error("dataset {} has no usable rows", .0.display())]
    Empty(PathBuf),

    #[error("number of labels ({labels}) does not match number of records ({records})")]
    LengthMismatch { records: usize, labels: usize },

    #[error("invalid split: {0}")]
    InvalidSplit(String),
}

/// Model artifact cannot be written, read or trusted. Fatal at process start.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to (de)serialize model artifact {}: {source}", .path.display())]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported artifact format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("inconsistent model artifact: {0}")]
    Inconsistent(String),
}

/// A single application fails a business rule. Recoverable by resubmitting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("annual income ({income}) must be at least the loan amount ({loan_amount})")]
    IncomeBelowLoanAmount { income: f64, loan_amount: f64 },

    #[error("client ID must be exactly 8 digits, got {0:?}")]
    InvalidClientId(String),

    #[error("field {0} must be a finite number")]
    NonFinite(&'static str),

    #[error("field {0} must not be empty")]
    EmptyCategory(&'static str),
}

/// Training input is unusable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainingError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("number of labels ({labels}) does not match number of rows ({rows})")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("row {row} has {got} features, expected {expected}")]
    RaggedFeatures {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("invalid forest parameters: {0}")]
    InvalidParams(String),
}

/// Encoded input does not match the model's feature layout.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("feature vector has {got} values, model expects {expected}")]
pub struct FeatureLengthMismatch {
    pub expected: usize,
    pub got: usize,
}
