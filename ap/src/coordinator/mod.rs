//! Pipeline coordinator
//!
//! Owns the research -> analysis -> review state machine, invokes one worker
//! per transition and enforces the bounded revision loop between review and
//! analysis. Performs no I/O itself.

mod config;
mod core;
mod error;
mod graph;

pub use config::CoordinatorConfig;
pub use core::{Coordinator, MAX_QUERY_LEN, validate_query};
pub use error::{ConfigError, InitError};
pub use graph::{GraphStage, PipelineGraph, Transition};
