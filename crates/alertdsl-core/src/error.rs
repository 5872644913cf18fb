//! Error types for alertdsl core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed event xml: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("field {reference_name} has non-integer value '{value}'")]
    NotAnInteger { reference_name: String, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_an_integer(reference_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::NotAnInteger {
            reference_name: reference_name.into(),
            value: value.into(),
        }
    }
}

/// Failure raised by a backend or notification collaborator.
///
/// The core never interprets these; they travel up to the entry point
/// which logs them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: String },

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

impl BackendError {
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}
