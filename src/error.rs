//! Custom error types for rustcitations.
//!
//! All library functions return `Result<T, CitationsError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for rustcitations operations.
#[derive(Debug, Error)]
pub enum CitationsError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML or response parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by the remote side
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Remote side returned an error status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message
        message: String,
    },

    /// CAPTCHA detected
    #[error("CAPTCHA detected, please refresh cookies")]
    Captcha,

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl CitationsError {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Network failures, rate limiting and server-side (5xx) errors are
    /// transient. Everything else, including a CAPTCHA wall, is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited(_) => true,
            Self::Api { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

/// Result type alias using `CitationsError`
pub type Result<T> = std::result::Result<T, CitationsError>;
