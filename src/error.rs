//! Error types for consent rendering and sign-off tracking
//!
//! Rendering itself degrades gracefully (missing fonts, logos and broken
//! signature payloads never surface here); these errors cover input
//! validation, workflow ordering, configuration and I/O.

use thiserror::Error;

use crate::record::SignerRole;
use crate::workflow::SignOffState;

/// Custom error type for consent operations
#[derive(Error, Debug)]
pub enum ConsentError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Cannot record {role} signature while consent is {state}")]
    InvalidTransition {
        state: SignOffState,
        role: SignerRole,
    },

    #[error("{0} signature is already recorded and cannot be replaced")]
    AlreadySigned(SignerRole),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("JSON parsing error: {0}")]
    Json(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for consent operations
pub type ConsentResult<T> = Result<T, ConsentError>;

impl From<serde_json::Error> for ConsentError {
    fn from(err: serde_json::Error) -> Self {
        ConsentError::Json(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<ConsentError> for pyo3::PyErr {
    fn from(err: ConsentError) -> Self {
        match err {
            ConsentError::Io(e) => pyo3::exceptions::PyIOError::new_err(e.to_string()),
            other => pyo3::exceptions::PyValueError::new_err(other.to_string()),
        }
    }
}
