use thiserror::Error;

use crate::engine::types::TaskStatus;

/// Unified error type for the illustration engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

impl EngineError {
    /// Stable category string for logging and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Database(_) => "database",
            EngineError::Pool(_) => "pool",
            EngineError::Io(_) => "io",
            EngineError::Serialization(_) => "serialization",
            EngineError::Generation(_) => "generation",
            EngineError::InvalidTransition { .. } => "invalid_transition",
        }
    }

    /// Whether the coordinator may retry the task after this error.
    ///
    /// Only generation failures are retried. Storage and pool errors
    /// indicate an unhealthy host and are surfaced instead of retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Generation(_))
    }
}
