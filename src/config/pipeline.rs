//! Pipeline-wide tunables.

use serde::{Deserialize, Serialize};

use super::StageConfiguration;
use crate::{Error, Result};

/// Key under which the map-side spill threshold travels in a stage bundle.
pub const MAP_SPILL_OVER: &str = "pipeline.map-spill-over";

/// Settings shared by every stage of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Distinct keys a map-side aggregator may hold before it spills.
    pub map_spill_over: usize,
    /// Number of map tasks the local executor splits input into.
    pub map_tasks: usize,
    /// Number of reduce partitions.
    pub reduce_tasks: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            map_spill_over: 500,
            map_tasks: 4,
            reduce_tasks: 1,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.map_spill_over == 0 {
            return Err(Error::config(MAP_SPILL_OVER, "must be a positive integer"));
        }
        if self.map_tasks == 0 {
            return Err(Error::config("map_tasks", "must be a positive integer"));
        }
        if self.reduce_tasks == 0 {
            return Err(Error::config("reduce_tasks", "must be a positive integer"));
        }
        Ok(())
    }

    /// Fill pipeline-wide keys into a stage bundle without overriding
    /// anything the stage set explicitly.
    pub fn apply_defaults(&self, conf: &mut StageConfiguration) {
        conf.set_default(MAP_SPILL_OVER, self.map_spill_over);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.map_spill_over, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = PipelineConfig::from_json(r#"{"map_spill_over": 10}"#).unwrap();
        assert_eq!(config.map_spill_over, 10);
        assert_eq!(config.reduce_tasks, 1);
    }

    #[test]
    fn test_zero_spill_is_rejected() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"map_spill_over": 0}"#),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_apply_defaults_does_not_override() {
        let config = PipelineConfig { map_spill_over: 7, ..Default::default() };
        let mut explicit = StageConfiguration::new().with(MAP_SPILL_OVER, 3);
        config.apply_defaults(&mut explicit);
        assert_eq!(explicit.get(MAP_SPILL_OVER), Some("3"));

        let mut empty = StageConfiguration::new();
        config.apply_defaults(&mut empty);
        assert_eq!(empty.get(MAP_SPILL_OVER), Some("7"));
    }
}
