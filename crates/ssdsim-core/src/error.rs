//! Error types for ssdsim-core.

use thiserror::Error;

/// Errors returned by simulator operations.
///
/// None of these are fatal: every variant describes a condition the caller
/// can recover from (retry, re-init, fix the config file).
#[derive(Debug, Error)]
pub enum SimError {
    /// Submission queue is at capacity. Drain completions and retry.
    #[error("submission queue full ({capacity} entries)")]
    Busy {
        /// Configured submission queue capacity.
        capacity: usize,
    },

    /// Operation issued before `init` or after `shutdown`.
    #[error("simulation not initialized")]
    NotInitialized,

    /// Configuration file parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file is not valid JSON for the config schema.
    #[error("malformed configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
