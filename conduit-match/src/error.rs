use thiserror::Error;

/// A match expression failed to compile.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("syntax error at position {position} near '{last_token}': {message}")]
pub struct SyntaxError {
    pub position: usize,
    pub last_token: String,
    pub message: String,
}
