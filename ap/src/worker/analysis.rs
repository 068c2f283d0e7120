//! Analysis worker - synthesizes research findings into key points and a conclusion
//!
//! Runs once per pass. On revision passes (`iteration_count > 0`) it also reads
//! the previous review notes and addresses each failed check.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{STAGE_MAX_TOKENS, Source, StageError, StageOutput, StageReport, Worker, parse_list_items, reply_text, with_fallback};
use crate::domain::{Analysis, Stage, TaskRecord};
use crate::llm::{CompletionRequest, LlmClient};

const NO_FINDINGS_CONCLUSION: &str = "No research results available for analysis.";

const SYSTEM_PROMPT: &str = "You are an analyst. Synthesize research findings into a structured analysis. \
                             Respond exactly in this format:\n\
                             KEY POINTS:\n\
                             - <point>\n\
                             - <point>\n\
                             CONCLUSION: <one or two sentences>";

/// Synthesizes findings into a structured analysis
pub struct AnalysisWorker {
    source: Source,
}

impl AnalysisWorker {
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    /// Deterministic analysis of the record's findings
    pub fn deterministic_analysis(record: &TaskRecord) -> Analysis {
        let findings = record.research_findings();
        debug!(finding_count = findings.len(), iteration = record.iteration_count(), "deterministic_analysis: called");
        if findings.is_empty() {
            return Analysis::new(vec![], NO_FINDINGS_CONCLUSION);
        }

        let mut key_points: Vec<String> = findings
            .iter()
            .map(|finding| finding.split_once(": ").map_or(finding.as_str(), |(_, rest)| rest).to_string())
            .collect();

        if record.iteration_count() > 0 {
            key_points.extend(
                failed_checks(record.review_notes())
                    .map(|issue| format!("Revision {}: addressed {}", record.iteration_count(), issue)),
            );
        }

        let conclusion = format!(
            "Based on {} research findings, the evidence suggests a comprehensive approach to {} \
             that addresses multiple dimensions of the problem.",
            findings.len(),
            record.query()
        );
        Analysis::new(key_points, conclusion)
    }

    async fn external_analysis(llm: &Arc<dyn LlmClient>, record: &TaskRecord) -> Result<StageOutput, StageError> {
        debug!(id = %record.id(), "external_analysis: called");
        let mut prompt = format!("Question: {}\n\nResearch findings:\n", record.query());
        for finding in record.research_findings() {
            prompt.push_str("- ");
            prompt.push_str(finding);
            prompt.push('\n');
        }
        if record.iteration_count() > 0 {
            prompt.push_str("\nA reviewer rejected the previous analysis. Address these issues:\n");
            for issue in failed_checks(record.review_notes()) {
                prompt.push_str("- ");
                prompt.push_str(issue);
                prompt.push('\n');
            }
        }

        let response = llm
            .complete(CompletionRequest::single(SYSTEM_PROMPT, prompt, STAGE_MAX_TOKENS))
            .await?;
        let text = reply_text(Stage::Analysis, response)?;

        parse_analysis(&text)
            .map(StageOutput::Analysis)
            .ok_or_else(|| StageError::MalformedResponse("analysis response lacked key points or conclusion".to_string()))
    }
}

/// Failure messages from `FAIL: <check> - <message>` review notes
fn failed_checks(notes: &[String]) -> impl Iterator<Item = &str> {
    notes.iter().filter_map(|note| note.strip_prefix("FAIL: "))
}

/// Parse `KEY POINTS: ... CONCLUSION: ...` model output
fn parse_analysis(text: &str) -> Option<Analysis> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let conclusion_at = lines
        .iter()
        .position(|line| line.to_ascii_lowercase().starts_with("conclusion:"))?;

    let key_points = parse_list_items(&lines[..conclusion_at].join("\n"));
    let conclusion = std::iter::once(lines[conclusion_at]["conclusion:".len()..].trim())
        .chain(lines[conclusion_at + 1..].iter().copied())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if key_points.is_empty() || conclusion.is_empty() {
        return None;
    }
    Some(Analysis::new(key_points, conclusion))
}

#[async_trait]
impl Worker for AnalysisWorker {
    fn stage(&self) -> Stage {
        Stage::Analysis
    }

    async fn produce(&self, record: &TaskRecord) -> Result<StageReport, StageError> {
        debug!(id = %record.id(), source = ?self.source, "AnalysisWorker::produce: called");
        let deterministic =
            || -> Result<StageOutput, StageError> { Ok(StageOutput::Analysis(Self::deterministic_analysis(record))) };

        match &self.source {
            Source::External(llm) if !record.research_findings().is_empty() => {
                with_fallback(Stage::Analysis, Self::external_analysis(llm, record), deterministic).await
            }
            _ => Ok(StageReport::new(deterministic()?)),
        }
    }
}
