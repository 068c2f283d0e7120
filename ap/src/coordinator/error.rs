//! Coordinator error types

use thiserror::Error;

/// Rejected pipeline policy; no record is created
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Approval threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("Max iterations {0} must not be negative")]
    InvalidMaxIterations(i32),
}

/// Query rejected while initializing a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Query is {len} chars, limit is {max}")]
    QueryTooLong { len: usize, max: usize },
}
