//! Error types for the scene server

use thiserror::Error;

/// Result type for server operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while serving a scene
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("no animation registered with name {0:?}")]
    AnimationNotFound(String),

    #[error("no component tree found for scene {0}")]
    SceneNotFound(u64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
