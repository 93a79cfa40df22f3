//! Harness errors.

use thiserror::Error;

use heapchurn_core::ConfigError;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("run for allocator '{allocator}' failed: {stderr}")]
    Subprocess { allocator: String, stderr: String },

    #[error("invalid seed '{0}': expected decimal or 0x-prefixed hex")]
    InvalidSeed(String),

    #[error("unknown output format '{0}': expected plain or json")]
    InvalidFormat(String),

    #[error("{path}: {violations} log violation(s)")]
    LogValidation { path: String, violations: usize },
}
