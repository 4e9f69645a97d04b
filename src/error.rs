//! Error types for the range mapper.
//!
//! Every failure is a caller precondition violation. There is no retryable
//! category: exhausting a sample batch is resolved by the fallback in
//! [`crate::retry`], not reported here.

use thiserror::Error;

/// Coarse classification of a [`MapperError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
}

/// Top-level error type for the mapper.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapperError {
    #[error("rawInt must be an integer between 0 and 65535, got {0}")]
    SampleOutOfRange(i64),

    #[error("rawInt must be an integer between 0 and 65535, got {0}")]
    NonIntegerSample(f64),

    #[error("min and max must be integers with min <= max, got bound {0}")]
    NonIntegerBound(f64),

    #[error("min and max must be integers with min <= max, got min={min} max={max}")]
    InvertedRange { min: i64, max: i64 },

    #[error("sample batch is empty")]
    EmptySampleBatch,

    #[error("invalid harness configuration: {0}")]
    InvalidConfig(String),
}

impl MapperError {
    /// All mapper errors are argument errors; callers validate upstream or
    /// handle them explicitly.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

impl From<std::convert::Infallible> for MapperError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

impl From<serde_json::Error> for MapperError {
    fn from(err: serde_json::Error) -> Self {
        MapperError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MapperError>;
