//! Stage worker error types

use thiserror::Error;

use crate::domain::Stage;
use crate::llm::LlmError;

/// Errors produced while a stage worker computes its output
#[derive(Debug, Error)]
pub enum StageError {
    #[error("External source failed: {0}")]
    External(#[from] LlmError),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing input for {stage} stage: no {field}")]
    MissingInput { stage: Stage, field: &'static str },

    #[error("Quality score {0} is outside [0, 1]")]
    InvalidScore(f64),

    #[error("Worker for {actual} stage returned {returned} output")]
    WrongOutput { actual: Stage, returned: Stage },
}
