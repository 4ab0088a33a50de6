//! Error types for terminology construction
//!
//! Lookup misses are never errors; resolvers return `None`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TermError {
    /// A definition record could not be turned into a term
    #[error("malformed definition <{element}>: {reason}")]
    MalformedDefinition { element: String, reason: String },

    /// A recognized setting was given a value of the wrong shape
    #[error("invalid value for setting `{key}`: {reason}")]
    InvalidSetting { key: String, reason: String },

    /// Setting name matches no term field (strict builds only)
    #[error("unknown setting `{key}`")]
    UnknownSetting { key: String },

    /// The definition document is not well-formed
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },
}

impl TermError {
    pub(crate) fn missing_name(element: &str) -> Self {
        TermError::MalformedDefinition {
            element: element.to_string(),
            reason: "missing required `name` attribute".to_string(),
        }
    }

    pub(crate) fn missing_value(constraint: &str) -> Self {
        TermError::MalformedDefinition {
            element: "attribute".to_string(),
            reason: format!("attribute constraint `{}` has no `value`", constraint),
        }
    }

    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        TermError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TermError>;
