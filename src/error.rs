// ⚠️ Error taxonomy - system/infra failures only
//
// Validation findings (missing references, rule violations) are DATA and live
// in report.rs. Anything in here interrupts control flow.

use thiserror::Error;

/// Result type for tracker import operations
pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Persistence engine error (wraps rusqlite::Error)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Malformed JSON document (bundle, metadata or report output)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inconsistent metadata handed to the snapshot builder
    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),

    /// Pipeline operation called from the wrong state
    #[error("Cannot {action} a bundle in state {state}")]
    IllegalTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Write failure detected by the store itself (e.g. update of a missing row)
    #[error("Commit failed: {0}")]
    Commit(String),
}
