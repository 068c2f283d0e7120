//! Pipeline status and stage tags

use serde::{Deserialize, Serialize};

/// Position of a task in the pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet initialized
    #[default]
    Pending,
    /// Research worker is up next
    Researching,
    /// Analysis worker is up next (first pass or revision)
    Analyzing,
    /// Review worker is up next
    Reviewing,
    /// Accepted, either approved or force-approved at the iteration cap
    Complete,
    /// Initialization failed or an error escaped a worker
    Failed,
}

impl TaskStatus {
    /// All states, in pipeline order
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Researching,
        TaskStatus::Analyzing,
        TaskStatus::Reviewing,
        TaskStatus::Complete,
        TaskStatus::Failed,
    ];

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }

    /// The stage whose worker runs while the task sits in this state
    pub fn stage(&self) -> Option<Stage> {
        match self {
            TaskStatus::Researching => Some(Stage::Research),
            TaskStatus::Analyzing => Some(Stage::Analysis),
            TaskStatus::Reviewing => Some(Stage::Review),
            TaskStatus::Pending | TaskStatus::Complete | TaskStatus::Failed => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Researching => write!(f, "researching"),
            Self::Analyzing => write!(f, "analyzing"),
            Self::Reviewing => write!(f, "reviewing"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One of the three fixed pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Analysis,
    Review,
}

impl Stage {
    /// All stages, in pipeline order
    pub const ALL: [Stage; 3] = [Stage::Research, Stage::Analysis, Stage::Review];

    /// Name of the worker that owns this stage
    pub fn worker_name(&self) -> &'static str {
        match self {
            Stage::Research => "researcher",
            Stage::Analysis => "analyzer",
            Stage::Review => "reviewer",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Research => write!(f, "research"),
            Self::Analysis => write!(f, "analysis"),
            Self::Review => write!(f, "review"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        for status in TaskStatus::ALL {
            let expected = matches!(status, TaskStatus::Complete | TaskStatus::Failed);
            assert_eq!(status.is_terminal(), expected, "{status}");
        }
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(TaskStatus::Researching.stage(), Some(Stage::Research));
        assert_eq!(TaskStatus::Analyzing.stage(), Some(Stage::Analysis));
        assert_eq!(TaskStatus::Reviewing.stage(), Some(Stage::Review));
        assert_eq!(TaskStatus::Pending.stage(), None);
        assert_eq!(TaskStatus::Complete.stage(), None);
    }

    #[test]
    fn test_status_serialization_matches_display() {
        for status in TaskStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result: Result<TaskStatus, _> = serde_json::from_str("\"paused\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Research.to_string(), "research");
        assert_eq!(Stage::Review.worker_name(), "reviewer");
    }
}
