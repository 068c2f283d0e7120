//! agentpipe - Research -> Analysis -> Review Pipeline
//!
//! A coordinator drives a shared, serializable task record through three
//! stage workers. Review can send work back to analysis; the revision loop is
//! bounded by `max_iterations`, after which the record is force-approved.
//!
//! # Modules
//!
//! - [`domain`] - TaskRecord, statuses, stages and history entries
//! - [`worker`] - Stage workers, deterministic or LLM-backed with fallback
//! - [`coordinator`] - State machine, revision-loop policy, pipeline graph
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`config`] - Configuration types and loading
//! - [`api`] - HTTP adapter
//! - [`cli`] - Command-line interface

pub mod api;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod llm;
pub mod worker;

// Re-export commonly used types
pub use config::{Config, LlmConfig, PipelineConfig, ServerConfig};
pub use coordinator::{ConfigError, Coordinator, CoordinatorConfig, InitError, PipelineGraph};
pub use domain::{
    Analysis, Approval, ErrorDescriptor, ErrorKind, HistoryEntry, RecordError, Stage, TaskRecord, TaskStatus,
};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use worker::{Source, StageError, StageOutput, StageReport, Worker, Workers};
