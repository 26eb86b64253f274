//! Error types for scene assembly

use std::path::PathBuf;
use thiserror::Error;

/// Result type for scene assembly operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors that can occur while building a scene
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("unsupported input for {kind}: got {got}")]
    UnsupportedInput {
        kind: &'static str,
        got: &'static str,
    },

    #[error("element has an empty name path")]
    EmptyNamePath,

    #[error("element {0} serialized before its source was resolved")]
    Unresolved(u64),

    #[error("converter failed: {0}")]
    Converter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
