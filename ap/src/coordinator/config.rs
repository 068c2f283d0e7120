//! Validated coordinator policy

use tracing::debug;

use super::error::ConfigError;
use crate::config::PipelineConfig;

/// Revision-loop policy, immutable once a coordinator is built
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorConfig {
    max_iterations: u32,
    approval_threshold: f64,
}

impl CoordinatorConfig {
    /// Validate raw policy values
    ///
    /// `approval_threshold` must lie in [0, 1] (NaN is rejected) and
    /// `max_iterations` must be non-negative.
    pub fn new(max_iterations: i32, approval_threshold: f64) -> Result<Self, ConfigError> {
        debug!(max_iterations, approval_threshold, "CoordinatorConfig::new: called");
        if !(0.0..=1.0).contains(&approval_threshold) {
            return Err(ConfigError::InvalidThreshold(approval_threshold));
        }
        let max_iterations =
            u32::try_from(max_iterations).map_err(|_| ConfigError::InvalidMaxIterations(max_iterations))?;

        Ok(Self {
            max_iterations,
            approval_threshold,
        })
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn approval_threshold(&self) -> f64 {
        self.approval_threshold
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            approval_threshold: 0.6,
        }
    }
}

impl TryFrom<&PipelineConfig> for CoordinatorConfig {
    type Error = ConfigError;

    fn try_from(pipeline: &PipelineConfig) -> Result<Self, Self::Error> {
        Self::new(pipeline.max_iterations, pipeline.approval_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_defaults() {
        let config = CoordinatorConfig::try_from(&PipelineConfig::default()).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(CoordinatorConfig::new(3, 0.0).is_ok());
        assert!(CoordinatorConfig::new(3, 1.0).is_ok());
        assert_eq!(CoordinatorConfig::new(3, 1.5), Err(ConfigError::InvalidThreshold(1.5)));
        assert_eq!(CoordinatorConfig::new(3, -0.1), Err(ConfigError::InvalidThreshold(-0.1)));
        assert!(matches!(
            CoordinatorConfig::new(3, f64::NAN),
            Err(ConfigError::InvalidThreshold(t)) if t.is_nan()
        ));
    }

    #[test]
    fn test_max_iterations_bounds() {
        assert_eq!(CoordinatorConfig::new(0, 0.6).unwrap().max_iterations(), 0);
        assert_eq!(CoordinatorConfig::new(-1, 0.6), Err(ConfigError::InvalidMaxIterations(-1)));
    }
}
