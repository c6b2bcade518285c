// src/pipeline/mod.rs

pub mod controller;
pub mod event_bus;
pub mod metrics;

pub use controller::{PipelineController, PipelineState};
pub use event_bus::{EventBus, PipelineEvent};
pub use metrics::{MetricsSummary, PipelineMetrics};
