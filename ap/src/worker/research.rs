//! Research worker - gathers findings for the query

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{STAGE_MAX_TOKENS, Source, StageError, StageOutput, StageReport, Worker, parse_list_items, reply_text, with_fallback};
use crate::domain::{Stage, TaskRecord};
use crate::llm::{CompletionRequest, LlmClient};

/// Findings returned per query
const FINDING_COUNT: usize = 3;

/// Canned finding bodies, keyed by a topic word found in the query
static TOPIC_FINDINGS: [(&str, &str, [&str; FINDING_COUNT]); 2] = [
    (
        "technology",
        "Technology research",
        [
            "Latest benchmarks show 40% improvement in performance.",
            "Adoption rates have doubled in the past year.",
            "Three competing approaches have emerged as frontrunners.",
        ],
    ),
    (
        "science",
        "Scientific research",
        [
            "Peer-reviewed studies confirm the hypothesis.",
            "Reproducibility rate exceeds 85% across labs.",
            "New methodology enables faster experimentation.",
        ],
    ),
];

static DEFAULT_FINDINGS: [&str; FINDING_COUNT] = [
    "The topic has significant implications across multiple domains.",
    "Recent studies show measurable improvements in key metrics.",
    "Expert consensus supports a multi-faceted approach.",
];

const SYSTEM_PROMPT: &str = "You are a research assistant. Answer with concise, factual findings.";

/// Gathers research findings for a query
pub struct ResearchWorker {
    source: Source,
}

impl ResearchWorker {
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    /// Deterministic findings: topic-specific when the query names a known topic
    pub fn deterministic_findings(query: &str) -> Vec<String> {
        debug!(%query, "deterministic_findings: called");
        let query_lower = query.to_lowercase();

        let (label, bodies) = TOPIC_FINDINGS
            .iter()
            .find(|(topic, _, _)| query_lower.contains(topic))
            .map(|(_, label, bodies)| (*label, bodies))
            .unwrap_or(("Finding", &DEFAULT_FINDINGS));

        bodies
            .iter()
            .map(|body| format!("{} on '{}': {}", label, query, body))
            .collect()
    }

    async fn external_findings(llm: &Arc<dyn LlmClient>, query: &str) -> Result<StageOutput, StageError> {
        debug!(%query, "external_findings: called");
        let prompt = format!(
            "Provide {} concise research findings about: {}\n\
             Format as a numbered list. Each item should be one sentence.",
            FINDING_COUNT, query
        );
        let response = llm
            .complete(CompletionRequest::single(SYSTEM_PROMPT, prompt, STAGE_MAX_TOKENS))
            .await?;

        let text = reply_text(Stage::Research, response)?;
        let mut findings = parse_list_items(&text);
        if findings.is_empty() {
            return Err(StageError::MalformedResponse(
                "research response contained no list items".to_string(),
            ));
        }
        findings.truncate(FINDING_COUNT);
        Ok(StageOutput::Findings(findings))
    }
}

#[async_trait]
impl Worker for ResearchWorker {
    fn stage(&self) -> Stage {
        Stage::Research
    }

    async fn produce(&self, record: &TaskRecord) -> Result<StageReport, StageError> {
        debug!(id = %record.id(), source = ?self.source, "ResearchWorker::produce: called");
        let query = record.query();
        let deterministic =
            || -> Result<StageOutput, StageError> { Ok(StageOutput::Findings(Self::deterministic_findings(query))) };

        match &self.source {
            Source::Deterministic => Ok(StageReport::new(deterministic()?)),
            Source::External(llm) => {
                with_fallback(Stage::Research, Self::external_findings(llm, query), deterministic).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::llm::client::mock::MockLlmClient;
    use std::time::Duration;

    #[test]
    fn test_default_findings() {
        let findings = ResearchWorker::deterministic_findings("What is machine learning?");
        assert_eq!(findings.len(), 3);
        assert_eq!(
            findings[0],
            "Finding on 'What is machine learning?': The topic has significant implications across multiple domains."
        );
    }

    #[test]
    fn test_topic_findings() {
        let findings = ResearchWorker::deterministic_findings("Future of Technology");
        assert!(findings.iter().all(|f| f.starts_with("Technology research on 'Future of Technology': ")));

        let findings = ResearchWorker::deterministic_findings("materials science");
        assert!(findings[1].ends_with("Reproducibility rate exceeds 85% across labs."));
    }

    #[tokio::test]
    async fn test_deterministic_is_idempotent() {
        let worker = ResearchWorker::new(Source::Deterministic);
        let record = TaskRecord::new("climate change");

        let first = worker.produce(&record).await.unwrap();
        let second = worker.produce(&record).await.unwrap();
        assert_eq!(first, second);
        assert!(first.fallback.is_none());
    }

    #[tokio::test]
    async fn test_external_findings_parsed_and_capped() {
        let llm = Arc::new(MockLlmClient::texts(&["1. One.\n2. Two.\n3. Three.\n4. Four."]));
        let worker = ResearchWorker::new(Source::External(llm.clone()));
        let record = TaskRecord::new("quantum computing");

        let report = worker.produce(&record).await.unwrap();

        assert_eq!(
            report.output,
            StageOutput::Findings(vec!["One.".to_string(), "Two.".to_string(), "Three.".to_string()])
        );
        assert!(report.fallback.is_none());
        assert_eq!(llm.call_count(), 1);
        assert!(llm.last_prompt().unwrap().contains("quantum computing"));
    }

    #[tokio::test]
    async fn test_external_failure_falls_back() {
        let llm = Arc::new(MockLlmClient::new(vec![Err(LlmError::Timeout(Duration::from_secs(30)))]));
        let worker = ResearchWorker::new(Source::External(llm));
        let record = TaskRecord::new("quantum computing");

        let report = worker.produce(&record).await.unwrap();

        assert_eq!(
            report.output,
            StageOutput::Findings(ResearchWorker::deterministic_findings("quantum computing"))
        );
        assert!(report.fallback.unwrap().contains("Timeout"));
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back() {
        let llm = Arc::new(MockLlmClient::texts(&["I cannot help with that."]));
        let worker = ResearchWorker::new(Source::External(llm));
        let record = TaskRecord::new("AI safety");

        let report = worker.produce(&record).await.unwrap();

        assert!(report.fallback.unwrap().starts_with("Malformed response"));
    }
}
