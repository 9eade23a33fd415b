//! Extraction fault types
//!
//! Field lookups swallow their faults; these errors only surface where a
//! whole unit (product header, one review) is abandoned and tagged.

use thiserror::Error;

use crate::infrastructure::session::SessionError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Required field '{field}' not found")]
    MissingField { field: String },

    #[error("Malformed value for '{field}': {value:?}")]
    MalformedField { field: String, value: String },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ExtractError {
    pub fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    pub fn malformed(field: &str, value: &str) -> Self {
        Self::MalformedField {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Same split as `SessionError::is_expected`; only log verbosity depends on it
    pub fn is_expected(&self) -> bool {
        match self {
            Self::MissingField { .. } => true,
            Self::MalformedField { .. } => false,
            Self::Session(e) => e.is_expected(),
        }
    }
}

pub type ExtractResult<T> = Result<T, ExtractError>;
