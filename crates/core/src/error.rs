//! Error types for the Caduceus domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum. Only
//! [`GenerationError`] is ever surfaced to an HTTP caller; fetch and
//! cache failures are absorbed where they happen.

use thiserror::Error;

/// The top-level error type for Caduceus operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Source errors ---
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    // --- Cache errors ---
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A knowledge source could not contribute.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network error from {source_name}: {reason}")]
    Network { source_name: String, reason: String },

    #[error("{source_name} returned HTTP {status}")]
    Status { source_name: String, status: u16 },

    #[error("Failed to parse {source_name} response: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("{source_name} timed out after {timeout_secs}s")]
    Timeout { source_name: String, timeout_secs: u64 },

    #[error("{source_name} returned no usable content")]
    Empty { source_name: String },
}

impl FetchError {
    pub fn network(source_name: &str, reason: impl ToString) -> Self {
        Self::Network {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(source_name: &str, reason: impl ToString) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// The key/value store behind the cache misbehaved.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cached value could not be (de)serialized: {0}")]
    Serialization(String),
}

/// The text-generation collaborator failed. This is the only error class
/// that reaches the caller of `POST /chat`.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Text generation is not available: {0}")]
    NotAvailable(String),

    #[error("Generation request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation timed out: {0}")]
    Timeout(String),

    #[error("Tokenization failed: {0}")]
    Tokenize(String),

    #[error("Operation not supported by {0}")]
    NotSupported(String),
}
