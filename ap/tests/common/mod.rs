//! Shared test doubles for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use agentpipe::config::Config;
use agentpipe::domain::{Stage, TaskRecord};
use agentpipe::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use agentpipe::worker::{Source, StageError, StageOutput, StageReport, Worker, Workers};

/// LLM whose every call fails like an unreachable network
#[derive(Default)]
pub struct FailingLlm {
    calls: AtomicUsize,
}

impl FailingLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FailingLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::Timeout(Duration::from_secs(30)))
    }
}

/// LLM that never answers within a test deadline
pub struct SlowLlm(pub Duration);

#[async_trait]
impl LlmClient for SlowLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        tokio::time::sleep(self.0).await;
        Ok(CompletionResponse::text("1. Late finding."))
    }
}

/// Reviewer that scores every analysis the same
pub struct FixedScoreReviewer(pub f64);

#[async_trait]
impl Worker for FixedScoreReviewer {
    fn stage(&self) -> Stage {
        Stage::Review
    }

    async fn produce(&self, _record: &TaskRecord) -> Result<StageReport, StageError> {
        Ok(StageReport::new(StageOutput::Review {
            notes: vec!["FAIL: length - Analysis is too short".to_string()],
            score: self.0,
        }))
    }
}

/// Deterministic workers with the reviewer swapped for a fixed score
pub fn fixed_score_workers(score: f64) -> Workers {
    let mut workers = Workers::standard(Source::Deterministic);
    workers.review = Arc::new(FixedScoreReviewer(score));
    workers
}

/// Config that never picks up an API key from the environment
pub fn offline_config() -> Config {
    let mut config = Config::default();
    config.llm.api_key_env = "AGENTPIPE_TEST_NO_SUCH_KEY".to_string();
    config
}
