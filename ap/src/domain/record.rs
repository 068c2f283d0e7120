//! TaskRecord domain type
//!
//! The shared state threaded through the research -> analysis -> review
//! pipeline. Workers only ever see `&TaskRecord`; every mutator is crate
//! private and refuses to touch a record that has reached a terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::id::generate_id;
use super::status::{Stage, TaskStatus};

/// Errors raised by record mutators
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record {id} is sealed in terminal status '{status}'")]
    Sealed { id: String, status: TaskStatus },
}

/// Structured output of the analysis stage
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub key_points: Vec<String>,
    pub conclusion: String,
}

impl Analysis {
    pub fn new(key_points: Vec<String>, conclusion: impl Into<String>) -> Self {
        Self {
            key_points,
            conclusion: conclusion.into(),
        }
    }

    /// An analysis with neither points nor a conclusion carries nothing to review
    pub fn is_empty(&self) -> bool {
        self.key_points.is_empty() && self.conclusion.trim().is_empty()
    }

    /// Render as the plain-text report handed back to callers
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.key_points.is_empty() {
            out.push_str("Key Points:\n");
            for point in &self.key_points {
                out.push_str("- ");
                out.push_str(point);
                out.push('\n');
            }
        }
        if !self.conclusion.trim().is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Conclusion: ");
            out.push_str(&self.conclusion);
        }
        out.trim_end().to_string()
    }
}

/// How a completed record was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    /// Review score met the approval threshold
    Approved,
    /// Iteration cap reached with the score still below threshold
    ForcedAtCap,
}

/// What kind of failure drove a record to `failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Initialization,
    Stage,
}

/// Error descriptor attached on transition to `failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    /// Stage whose worker failed (None for initialization errors)
    pub stage: Option<Stage>,
    pub message: String,
}

impl ErrorDescriptor {
    pub fn initialization(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Initialization,
            stage: None,
            message: message.into(),
        }
    }

    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Stage,
            stage: Some(stage),
            message: message.into(),
        }
    }
}

/// One audit-trail entry per worker invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub stage: Stage,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    /// Status the record settled into after this invocation
    pub status: TaskStatus,
    /// Set when an externally-sourced worker fell back to deterministic output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl HistoryEntry {
    pub fn new(stage: Stage, summary: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            stage,
            timestamp: Utc::now(),
            summary: summary.into(),
            status,
            fallback: None,
        }
    }

    /// Builder method to attach a fallback marker
    pub fn with_fallback(mut self, fallback: Option<String>) -> Self {
        self.fallback = fallback;
        self
    }
}

/// The shared, serializable task state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    id: String,
    query: String,
    status: TaskStatus,
    research_findings: Vec<String>,
    analysis: Option<Analysis>,
    review_notes: Vec<String>,
    quality_score: Option<f64>,
    iteration_count: u32,
    history: Vec<HistoryEntry>,
    error: Option<ErrorDescriptor>,
    #[serde(default)]
    approval: Option<Approval>,
    #[serde(default)]
    final_output: Option<String>,
    created_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Create a pending record with a generated ID
    pub(crate) fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let id = generate_id("task", &query);
        debug!(%id, query_len = query.len(), "TaskRecord::new: called");

        Self {
            id,
            query,
            status: TaskStatus::Pending,
            research_findings: Vec::new(),
            analysis: None,
            review_notes: Vec::new(),
            quality_score: None,
            iteration_count: 0,
            history: Vec::new(),
            error: None,
            approval: None,
            final_output: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn research_findings(&self) -> &[String] {
        &self.research_findings
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    pub fn review_notes(&self) -> &[String] {
        &self.review_notes
    }

    pub fn quality_score(&self) -> Option<f64> {
        self.quality_score
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        self.error.as_ref()
    }

    pub fn approval(&self) -> Option<Approval> {
        self.approval
    }

    pub fn final_output(&self) -> Option<&str> {
        self.final_output.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check if the record is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Number of times the given stage's worker has been invoked
    pub fn invocations(&self, stage: Stage) -> usize {
        self.history.iter().filter(|entry| entry.stage == stage).count()
    }

    /// Encode as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Encode as indented JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Decode from JSON produced by [`TaskRecord::to_json`]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    // === Coordinator-only mutators ===

    fn ensure_open(&self) -> Result<(), RecordError> {
        if self.is_terminal() {
            debug!(id = %self.id, status = %self.status, "ensure_open: record sealed");
            return Err(RecordError::Sealed {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Move to a new status without a worker invocation (initialization only)
    pub(crate) fn set_status(&mut self, status: TaskStatus) -> Result<(), RecordError> {
        self.ensure_open()?;
        debug!(id = %self.id, from = %self.status, to = %status, "set_status: called");
        self.status = status;
        Ok(())
    }

    pub(crate) fn append_findings(&mut self, findings: Vec<String>) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.research_findings.extend(findings);
        Ok(())
    }

    pub(crate) fn set_analysis(&mut self, analysis: Analysis) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.analysis = Some(analysis);
        Ok(())
    }

    pub(crate) fn set_review(&mut self, notes: Vec<String>, score: f64) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.review_notes = notes;
        self.quality_score = Some(score);
        Ok(())
    }

    pub(crate) fn push_review_note(&mut self, note: impl Into<String>) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.review_notes.push(note.into());
        Ok(())
    }

    pub(crate) fn increment_iteration(&mut self) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.iteration_count += 1;
        Ok(())
    }

    /// Record acceptance details ahead of the final `complete` transition
    pub(crate) fn accept(&mut self, approval: Approval) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.approval = Some(approval);
        self.final_output = self.analysis.as_ref().map(Analysis::render);
        Ok(())
    }

    pub(crate) fn set_error(&mut self, error: ErrorDescriptor) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.error = Some(error);
        Ok(())
    }

    /// Append the history entry for a worker invocation and settle into its status
    pub(crate) fn settle(&mut self, entry: HistoryEntry) -> Result<(), RecordError> {
        self.ensure_open()?;
        debug!(
            id = %self.id,
            stage = %entry.stage,
            from = %self.status,
            to = %entry.status,
            "settle: called"
        );
        self.status = entry.status;
        self.history.push(entry);
        Ok(())
    }
}
