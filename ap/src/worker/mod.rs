//! Stage workers
//!
//! Each pipeline stage (research, analysis, review) is a [`Worker`]: one
//! `produce` operation that reads a `&TaskRecord` and returns proposed content.
//! Workers never touch the record or its status; the coordinator applies their
//! output and decides the transition.
//!
//! Every worker is built with a [`Source`]:
//! - `Deterministic` computes output purely from the record fields it reads
//! - `External` asks an [`LlmClient`] and falls back to the deterministic
//!   output on any failure, reporting the reason in [`StageReport::fallback`]

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{LlmConfig, PipelineConfig};
use crate::domain::{Analysis, Stage, TaskRecord};
use crate::llm::{CompletionResponse, LlmClient, LlmError, StopReason, create_client};

mod analysis;
mod error;
mod research;
mod review;

pub use analysis::AnalysisWorker;
pub use error::StageError;
pub use research::ResearchWorker;
pub use review::{QualityCheck, QUALITY_CHECKS, ReviewWorker, evaluate};

/// Max tokens requested per stage call
pub(crate) const STAGE_MAX_TOKENS: u32 = 512;

/// Where a worker's content comes from, fixed at construction
#[derive(Clone)]
pub enum Source {
    Deterministic,
    External(Arc<dyn LlmClient>),
}

impl Source {
    /// Pick the source for a pipeline config at the configuration boundary
    ///
    /// An explicit `mock` wins; otherwise workers are externally-sourced only
    /// when the API key variable is set.
    pub fn resolve(pipeline: &PipelineConfig, llm: &LlmConfig) -> Result<Self, LlmError> {
        let mock = pipeline.resolve_mock(llm.credential_present());
        debug!(mock, provider = %llm.provider, "Source::resolve: called");
        if mock {
            Ok(Source::Deterministic)
        } else {
            Ok(Source::External(create_client(llm)?))
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self, Source::Deterministic)
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Deterministic => write!(f, "Deterministic"),
            Source::External(_) => write!(f, "External"),
        }
    }
}

/// Stage-specific content proposed by a worker
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Findings(Vec<String>),
    Analysis(Analysis),
    Review { notes: Vec<String>, score: f64 },
}

impl StageOutput {
    /// The stage this output belongs to
    pub fn stage(&self) -> Stage {
        match self {
            StageOutput::Findings(_) => Stage::Research,
            StageOutput::Analysis(_) => Stage::Analysis,
            StageOutput::Review { .. } => Stage::Review,
        }
    }
}

/// A worker's result: output plus the fallback marker, if one was needed
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub output: StageOutput,
    pub fallback: Option<String>,
}

impl StageReport {
    pub fn new(output: StageOutput) -> Self {
        Self { output, fallback: None }
    }

    pub fn fell_back(output: StageOutput, reason: impl Into<String>) -> Self {
        Self {
            output,
            fallback: Some(reason.into()),
        }
    }
}

/// Uniform capability implemented by every stage worker
#[async_trait]
pub trait Worker: Send + Sync {
    /// The stage this worker serves
    fn stage(&self) -> Stage;

    /// Compute this stage's output from the record
    async fn produce(&self, record: &TaskRecord) -> Result<StageReport, StageError>;
}

/// The three workers a coordinator sequences
#[derive(Clone)]
pub struct Workers {
    pub research: Arc<dyn Worker>,
    pub analysis: Arc<dyn Worker>,
    pub review: Arc<dyn Worker>,
}

impl Workers {
    /// Standard workers sharing one source
    pub fn standard(source: Source) -> Self {
        debug!(?source, "Workers::standard: called");
        Self {
            research: Arc::new(ResearchWorker::new(source.clone())),
            analysis: Arc::new(AnalysisWorker::new(source.clone())),
            review: Arc::new(ReviewWorker::new(source)),
        }
    }

    /// The worker for a stage
    pub fn for_stage(&self, stage: Stage) -> &Arc<dyn Worker> {
        match stage {
            Stage::Research => &self.research,
            Stage::Analysis => &self.analysis,
            Stage::Review => &self.review,
        }
    }
}

/// Run the external path; on failure, substitute the deterministic output
///
/// Errors from `deterministic` are not recovered: when the fallback itself
/// fails, the error escapes to the coordinator.
pub(crate) async fn with_fallback<Fut, D>(stage: Stage, external: Fut, deterministic: D) -> Result<StageReport, StageError>
where
    Fut: Future<Output = Result<StageOutput, StageError>> + Send,
    D: FnOnce() -> Result<StageOutput, StageError> + Send,
{
    match external.await {
        Ok(output) => {
            debug!(%stage, "with_fallback: external source succeeded");
            Ok(StageReport::new(output))
        }
        Err(e) => {
            warn!(%stage, error = %e, "with_fallback: external source failed, using deterministic output");
            let output = deterministic()?;
            Ok(StageReport::fell_back(output, e.to_string()))
        }
    }
}

/// Text of a finished reply
///
/// A reply cut off at the token limit or carrying no text is malformed.
pub(crate) fn reply_text(stage: Stage, response: CompletionResponse) -> Result<String, StageError> {
    debug!(%stage, stop_reason = ?response.stop_reason, "reply_text: called");
    if response.stop_reason == StopReason::MaxTokens {
        return Err(StageError::MalformedResponse(format!(
            "{} response truncated at max_tokens",
            stage
        )));
    }
    response
        .content
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| StageError::MalformedResponse(format!("empty {} response", stage)))
}

/// Pull list items (`1. x`, `2) x`, `- x`, `* x`) out of free-form model text
pub(crate) fn parse_list_items(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with('-') || line.starts_with('*') || line.chars().next().is_some_and(|c| c.is_ascii_digit())
        })
        .map(|line| {
            line.trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | ')' | '*' | ' '))
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}
