// src/error.rs
//
// Error taxonomy for the pipeline. Errors local to one adapter or one
// detection are contained by the caller; Source/Stage errors abort the
// current run.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Video source could not be opened. Fatal to the run, not retried.
    #[error("failed to open video source '{identifier}': {reason}")]
    SourceOpen { identifier: String, reason: String },

    /// One detector failed on one frame. Contained: the adapter
    /// contributes no detections and the frame continues.
    #[error("adapter '{adapter}' failed: {reason}")]
    Adapter { adapter: String, reason: String },

    /// Invalid configuration. Fatal at start, never raised mid-run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed detection (inverted or empty box). The offending
    /// detection is dropped, not fatal.
    #[error("invalid detection box {bbox:?} from adapter {source_index}")]
    FusionInvariant { bbox: [i32; 4], source_index: usize },

    /// Failure inside a core stage. Fatal: transitions the run to Failed.
    #[error("pipeline stage '{stage}' failed: {reason}")]
    Stage {
        stage: &'static str,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl PipelineError {
    pub fn adapter<S: Into<String>>(name: &str, reason: S) -> Self {
        Self::Adapter {
            adapter: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn source_open<S: Into<String>>(identifier: &str, reason: S) -> Self {
        Self::SourceOpen {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    pub fn stage<S: Into<String>>(stage: &'static str, reason: S) -> Self {
        Self::Stage {
            stage,
            reason: reason.into(),
        }
    }
}
