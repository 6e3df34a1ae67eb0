//! Error types for the answer pipeline.
//!
//! Each pipeline stage owns one [`DeweyError`] kind. The external clients
//! report transport problems as [`ServiceError`], and the stage that
//! observed the failure wraps it into its own kind.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, DeweyError>;

/// Failures that abort a run (or, for `Configuration`, prevent one).
#[derive(Debug, Error)]
pub enum DeweyError {
    /// Missing or invalid credentials/settings. Raised before any run starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model declined the forced function call or returned arguments
    /// that do not match the intent schema.
    #[error("Intent extraction failed: {0}")]
    IntentExtraction(String),

    /// The embedding or search call failed, or a hit was malformed.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// The generation stream could not be opened or broke mid-flight.
    #[error("Generation stream failed: {0}")]
    GenerationStream(String),
}

impl DeweyError {
    /// Stable machine-readable code used in HTTP and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            DeweyError::Configuration(_) => "configuration",
            DeweyError::IntentExtraction(_) => "intent_extraction",
            DeweyError::Retrieval(_) => "retrieval",
            DeweyError::GenerationStream(_) => "generation_stream",
        }
    }
}

/// Transport-level failures reported by the external service clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Connection failed or timed out.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response or an error event from the service.
    #[error("API error: {0}")]
    Api(String),

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ServiceError::Parse(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}
