//! Errors raised while building models

use thiserror::Error;

/// Model construction errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid {what} dimension: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ModelError {
    pub(crate) fn check_dim(what: &'static str, expected: usize, got: usize) -> Result<(), Self> {
        if expected == got {
            Ok(())
        } else {
            Err(Self::DimensionMismatch { what, expected, got })
        }
    }
}
