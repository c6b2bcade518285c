// src/config.rs

use crate::error::{PipelineError, Result};
use crate::types::Config;
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject degenerate settings before a run starts. Configuration
    /// errors are only ever raised here, never mid-run.
    pub fn validate(&self) -> Result<()> {
        let tau = self.fusion.iou_threshold;
        if !tau.is_finite() || !(0.0..1.0).contains(&tau) {
            return Err(PipelineError::configuration(format!(
                "iou_threshold must be in [0, 1), got {}",
                tau
            )));
        }

        if self.sink.capacity == 0 {
            return Err(PipelineError::configuration(
                "sink capacity must be at least 1",
            ));
        }

        for (name, size) in [
            ("processing_size", &self.video.processing_size),
            ("display_size", &self.video.display_size),
        ] {
            if let Some(s) = size {
                if s.width == 0 || s.height == 0 {
                    return Err(PipelineError::configuration(format!(
                        "{} must have non-zero dimensions",
                        name
                    )));
                }
            }
        }

        Ok(())
    }
}
