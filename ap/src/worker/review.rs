//! Review worker - scores the current analysis
//!
//! The score is always computed from [`QUALITY_CHECKS`]: equally weighted,
//! `passed / total`. An externally-sourced reviewer only adds critique notes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{STAGE_MAX_TOKENS, Source, StageError, StageOutput, StageReport, Worker, parse_list_items, reply_text, with_fallback};
use crate::domain::{Analysis, Stage, TaskRecord};
use crate::llm::{CompletionRequest, LlmClient};

/// Rendered analyses at or under this many chars fail the length check
const MIN_RENDERED_LEN: usize = 50;

/// Critique notes kept from an external reviewer
const MAX_CRITIQUE_NOTES: usize = 3;

const SYSTEM_PROMPT: &str = "You are a strict reviewer. List concrete weaknesses of the analysis \
                             as a bulleted list, at most three items, one sentence each.";

/// A single deterministic quality check
pub struct QualityCheck {
    pub name: &'static str,
    pub passes: fn(&Analysis) -> bool,
    pub failure: &'static str,
}

fn has_conclusion(analysis: &Analysis) -> bool {
    !analysis.conclusion.trim().is_empty()
}

fn has_points(analysis: &Analysis) -> bool {
    analysis.key_points.len() >= 2
}

fn long_enough(analysis: &Analysis) -> bool {
    analysis.render().chars().count() > MIN_RENDERED_LEN
}

pub static QUALITY_CHECKS: [QualityCheck; 3] = [
    QualityCheck {
        name: "has_conclusion",
        passes: has_conclusion,
        failure: "Missing conclusion",
    },
    QualityCheck {
        name: "has_points",
        passes: has_points,
        failure: "Missing structured points",
    },
    QualityCheck {
        name: "length",
        passes: long_enough,
        failure: "Analysis is too short",
    },
];

/// Run every quality check, returning `(score, notes)`
pub fn evaluate(analysis: &Analysis) -> (f64, Vec<String>) {
    let mut passed = 0usize;
    let notes = QUALITY_CHECKS
        .iter()
        .map(|check| {
            if (check.passes)(analysis) {
                passed += 1;
                format!("PASS: {}", check.name)
            } else {
                format!("FAIL: {} - {}", check.name, check.failure)
            }
        })
        .collect();

    let score = passed as f64 / QUALITY_CHECKS.len() as f64;
    debug!(passed, score, "evaluate: called");
    (score, notes)
}

/// Scores the current analysis against the quality checks
pub struct ReviewWorker {
    source: Source,
}

impl ReviewWorker {
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    fn reviewable(record: &TaskRecord) -> Result<&Analysis, StageError> {
        record.analysis().filter(|analysis| !analysis.is_empty()).ok_or(StageError::MissingInput {
            stage: Stage::Review,
            field: "analysis",
        })
    }

    async fn external_review(llm: &Arc<dyn LlmClient>, analysis: &Analysis) -> Result<StageOutput, StageError> {
        debug!("external_review: called");
        let (score, mut notes) = evaluate(analysis);

        let prompt = format!("Review this analysis:\n\n{}", analysis.render());
        let response = llm
            .complete(CompletionRequest::single(SYSTEM_PROMPT, prompt, STAGE_MAX_TOKENS))
            .await?;
        let text = reply_text(Stage::Review, response)?;

        let critique = parse_list_items(&text);
        if critique.is_empty() {
            return Err(StageError::MalformedResponse(
                "review response contained no critique items".to_string(),
            ));
        }
        notes.extend(
            critique
                .into_iter()
                .take(MAX_CRITIQUE_NOTES)
                .map(|item| format!("NOTE: {}", item)),
        );
        Ok(StageOutput::Review { notes, score })
    }
}

#[async_trait]
impl Worker for ReviewWorker {
    fn stage(&self) -> Stage {
        Stage::Review
    }

    async fn produce(&self, record: &TaskRecord) -> Result<StageReport, StageError> {
        debug!(id = %record.id(), source = ?self.source, "ReviewWorker::produce: called");
        let analysis = Self::reviewable(record)?;
        let deterministic = || -> Result<StageOutput, StageError> {
            let (score, notes) = evaluate(analysis);
            Ok(StageOutput::Review { notes, score })
        };

        match &self.source {
            Source::Deterministic => Ok(StageReport::new(deterministic()?)),
            Source::External(llm) => {
                with_fallback(Stage::Review, Self::external_review(llm, analysis), deterministic).await
            }
        }
    }
}
