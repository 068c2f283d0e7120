//! Static description of the pipeline state machine

use serde::Serialize;

use super::config::CoordinatorConfig;
use crate::domain::{Stage, TaskStatus};

/// A stage node: the worker that runs while a record sits in `status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStage {
    pub stage: Stage,
    pub worker: &'static str,
    pub status: TaskStatus,
}

/// A labelled edge of the state machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub condition: String,
}

impl Transition {
    fn new(from: TaskStatus, to: TaskStatus, condition: impl Into<String>) -> Self {
        Self {
            from,
            to,
            condition: condition.into(),
        }
    }
}

/// Stages and transitions for a given policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineGraph {
    pub stages: Vec<GraphStage>,
    pub transitions: Vec<Transition>,
    pub max_iterations: u32,
    pub approval_threshold: f64,
}

impl PipelineGraph {
    pub fn new(config: &CoordinatorConfig) -> Self {
        use TaskStatus::*;

        let threshold = config.approval_threshold();
        let max = config.max_iterations();

        let stages = [(Stage::Research, Researching), (Stage::Analysis, Analyzing), (Stage::Review, Reviewing)]
            .into_iter()
            .map(|(stage, status)| GraphStage {
                stage,
                worker: stage.worker_name(),
                status,
            })
            .collect();

        let transitions = vec![
            Transition::new(Pending, Researching, "initialization succeeds"),
            Transition::new(Pending, Failed, "initialization fails"),
            Transition::new(Researching, Analyzing, "research worker returns"),
            Transition::new(Researching, Failed, "unrecoverable error"),
            Transition::new(Analyzing, Reviewing, "analysis worker returns"),
            Transition::new(Analyzing, Failed, "unrecoverable error"),
            Transition::new(Reviewing, Complete, format!("quality_score >= {} (approved)", threshold)),
            Transition::new(
                Reviewing,
                Analyzing,
                format!("quality_score < {} and iteration_count < {} (revision)", threshold, max),
            ),
            Transition::new(
                Reviewing,
                Complete,
                format!("quality_score < {} and iteration_count >= {} (forced at cap)", threshold, max),
            ),
            Transition::new(Reviewing, Failed, "unrecoverable error"),
        ];

        Self {
            stages,
            transitions,
            max_iterations: max,
            approval_threshold: threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_shape() {
        let graph = PipelineGraph::new(&CoordinatorConfig::default());

        let workers: Vec<_> = graph.stages.iter().map(|s| s.worker).collect();
        assert_eq!(workers, vec!["researcher", "analyzer", "reviewer"]);
        assert_eq!(graph.transitions.len(), 10);
        assert!(graph.transitions.iter().all(|t| !t.from.is_terminal()));
    }

    #[test]
    fn test_graph_reflects_policy() {
        let config = CoordinatorConfig::new(5, 0.75).unwrap();
        let graph = PipelineGraph::new(&config);

        assert_eq!(graph.max_iterations, 5);
        assert!(
            graph
                .transitions
                .iter()
                .any(|t| t.to == TaskStatus::Analyzing && t.condition.contains("< 0.75 and iteration_count < 5"))
        );

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["stages"][2]["status"], "reviewing");
        assert_eq!(json["transitions"][0]["from"], "pending");
    }
}
