//! Coordinator core - drives a record through the pipeline state machine

use tracing::{Instrument, debug, error, info, info_span, warn};

use super::config::CoordinatorConfig;
use super::error::{ConfigError, InitError};
use super::graph::PipelineGraph;
use crate::config::PipelineConfig;
use crate::domain::{Approval, ErrorDescriptor, HistoryEntry, RecordError, Stage, TaskRecord, TaskStatus};
use crate::worker::{Source, StageError, StageOutput, StageReport, Workers};

/// Longest accepted query, in chars
pub const MAX_QUERY_LEN: usize = 4096;

/// Owns the state machine and sequences the stage workers
///
/// Immutable after construction: share it behind an `Arc` to serve concurrent
/// runs, each of which owns its own record.
pub struct Coordinator {
    config: CoordinatorConfig,
    workers: Workers,
}

impl Coordinator {
    /// Build a coordinator with the standard workers for `source`
    pub fn new(pipeline: &PipelineConfig, source: Source) -> Result<Self, ConfigError> {
        debug!(?pipeline, ?source, "Coordinator::new: called");
        let config = CoordinatorConfig::try_from(pipeline)?;
        Ok(Self::with_workers(config, Workers::standard(source)))
    }

    /// Build a coordinator around an explicit set of workers
    pub fn with_workers(config: CoordinatorConfig, workers: Workers) -> Self {
        debug!(?config, "Coordinator::with_workers: called");
        Self { config, workers }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Static description of the stages and transitions under this policy
    pub fn graph(&self) -> PipelineGraph {
        PipelineGraph::new(&self.config)
    }

    /// Run the whole pipeline for `query`, resolving once the record is terminal
    pub async fn run(&self, query: impl Into<String>) -> TaskRecord {
        let mut record = self.start(query);
        info!(
            id = %record.id(),
            max_iterations = self.config.max_iterations(),
            approval_threshold = self.config.approval_threshold(),
            "run: started"
        );

        let span = info_span!("run", id = %record.id());
        async {
            while !record.is_terminal() {
                if let Err(e) = self.step(&mut record).await {
                    error!(id = %record.id(), error = %e, "run: step rejected");
                    break;
                }
            }

            info!(
                id = %record.id(),
                status = %record.status(),
                iterations = record.iteration_count(),
                invocations = record.history().len(),
                "run: finished"
            );
        }
        .instrument(span)
        .await;
        record
    }

    /// Create a record for `query` and initialize it
    ///
    /// An invalid query does not raise: the record comes back `failed` with an
    /// initialization error attached and an empty history.
    pub fn start(&self, query: impl Into<String>) -> TaskRecord {
        let mut record = TaskRecord::new(query);
        debug!(id = %record.id(), "start: called");
        if let Err(e) = Self::initialize(&mut record) {
            error!(id = %record.id(), error = %e, "start: initialization rejected");
        }
        record
    }

    /// Advance the record by one transition
    ///
    /// A `pending` record is initialized; otherwise the worker for the current
    /// status is invoked once and its outcome committed with one history
    /// entry. Returns whether the record is now terminal. A terminal record is
    /// left untouched.
    pub async fn step(&self, record: &mut TaskRecord) -> Result<bool, RecordError> {
        debug!(id = %record.id(), status = %record.status(), "step: called");
        let stage = match record.status() {
            TaskStatus::Pending => {
                Self::initialize(record)?;
                return Ok(record.is_terminal());
            }
            TaskStatus::Complete | TaskStatus::Failed => {
                debug!(id = %record.id(), "step: record already terminal");
                return Ok(true);
            }
            status => match status.stage() {
                Some(stage) => stage,
                None => return Ok(record.is_terminal()),
            },
        };

        let worker = self.workers.for_stage(stage);
        let span = info_span!("stage", id = %record.id(), %stage, iteration = record.iteration_count());
        let outcome = worker
            .produce(record)
            .instrument(span)
            .await
            .and_then(|report| Self::validate(stage, report));

        match outcome {
            Ok(report) => self.apply(record, report)?,
            Err(e) => Self::fail(record, stage, e)?,
        }
        Ok(record.is_terminal())
    }

    fn initialize(record: &mut TaskRecord) -> Result<(), RecordError> {
        match validate_query(record.query()) {
            Ok(()) => {
                debug!(id = %record.id(), "initialize: query accepted");
                record.set_status(TaskStatus::Researching)
            }
            Err(e) => {
                warn!(id = %record.id(), error = %e, "initialize: query rejected");
                record.set_error(ErrorDescriptor::initialization(e.to_string()))?;
                record.set_status(TaskStatus::Failed)
            }
        }
    }

    /// Reject output that does not belong to the stage or carries an out-of-range score
    fn validate(stage: Stage, report: StageReport) -> Result<StageReport, StageError> {
        let returned = report.output.stage();
        if returned != stage {
            return Err(StageError::WrongOutput {
                actual: stage,
                returned,
            });
        }
        if let StageOutput::Review { score, .. } = report.output {
            if !(0.0..=1.0).contains(&score) {
                return Err(StageError::InvalidScore(score));
            }
        }
        Ok(report)
    }

    fn apply(&self, record: &mut TaskRecord, report: StageReport) -> Result<(), RecordError> {
        let StageReport { output, fallback } = report;
        if let Some(reason) = &fallback {
            warn!(id = %record.id(), stage = %output.stage(), %reason, "apply: worker fell back to deterministic output");
        }

        let entry = match output {
            StageOutput::Findings(findings) => {
                let summary = format!("Gathered {} research findings", findings.len());
                record.append_findings(findings)?;
                HistoryEntry::new(Stage::Research, summary, TaskStatus::Analyzing)
            }
            StageOutput::Analysis(analysis) => {
                let summary = format!(
                    "Analysis pass {}: {} key points",
                    record.iteration_count() + 1,
                    analysis.key_points.len()
                );
                record.set_analysis(analysis)?;
                HistoryEntry::new(Stage::Analysis, summary, TaskStatus::Reviewing)
            }
            StageOutput::Review { notes, score } => {
                record.set_review(notes, score)?;
                self.decide(record, score)?
            }
        };

        record.settle(entry.with_fallback(fallback))
    }

    /// Apply the review transition rules for `score`
    fn decide(&self, record: &mut TaskRecord, score: f64) -> Result<HistoryEntry, RecordError> {
        let threshold = self.config.approval_threshold();
        let max = self.config.max_iterations();
        debug!(id = %record.id(), score, threshold, iteration = record.iteration_count(), "decide: called");

        if score >= threshold {
            info!(id = %record.id(), score, "decide: approved");
            record.accept(Approval::Approved)?;
            return Ok(HistoryEntry::new(
                Stage::Review,
                format!("Approved with score {:.2} (threshold {:.2})", score, threshold),
                TaskStatus::Complete,
            ));
        }

        if record.iteration_count() < max {
            record.increment_iteration()?;
            info!(id = %record.id(), score, iteration = record.iteration_count(), "decide: revision requested");
            return Ok(HistoryEntry::new(
                Stage::Review,
                format!(
                    "Revision {} of {} requested: score {:.2} below threshold {:.2}",
                    record.iteration_count(),
                    max,
                    score,
                    threshold
                ),
                TaskStatus::Analyzing,
            ));
        }

        let note = format!(
            "Force-approved at iteration cap ({}) with score {:.2} below threshold {:.2}",
            max, score, threshold
        );
        warn!(id = %record.id(), score, max, "decide: iteration cap reached, forcing approval");
        record.push_review_note(format!("NOTE: {}", note))?;
        record.accept(Approval::ForcedAtCap)?;
        Ok(HistoryEntry::new(Stage::Review, note, TaskStatus::Complete))
    }

    fn fail(record: &mut TaskRecord, stage: Stage, err: StageError) -> Result<(), RecordError> {
        error!(id = %record.id(), %stage, error = %err, "fail: stage error escaped worker");
        let message = err.to_string();
        record.set_error(ErrorDescriptor::stage(stage, message.clone()))?;
        record.settle(HistoryEntry::new(
            stage,
            format!("{} failed: {}", stage.worker_name(), message),
            TaskStatus::Failed,
        ))
    }
}

/// Check a query is usable before any worker sees it
pub fn validate_query(query: &str) -> Result<(), InitError> {
    if query.trim().is_empty() {
        return Err(InitError::EmptyQuery);
    }
    let len = query.chars().count();
    if len > MAX_QUERY_LEN {
        return Err(InitError::QueryTooLong {
            len,
            max: MAX_QUERY_LEN,
        });
    }
    Ok(())
}
