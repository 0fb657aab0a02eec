// ABOUTME: Error types for selector parsing, evaluation and profile loading.
// ABOUTME: Syntax and forbidden-construct errors are raised before evaluation.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectorError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("{0} is not allowed in selector expressions")]
    Forbidden(String),

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("name '{0}' is not defined")]
    UnknownName(String),

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("index {0} out of range")]
    IndexOutOfRange(i64),

    #[error("type error: {0}")]
    Type(String),
}

impl SelectorError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        SelectorError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("\"{name}\" profile not found at {}", path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("failed to read profile {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
