#![doc = include_str!("../README.md")]

pub mod config;
pub mod coordinator;
pub mod handle;
pub mod metrics;

pub use config::{BackendSelection, CoordinatorConfig};
pub use coordinator::{Coordinator, Submission};
pub use handle::BackendHandle;
pub use metrics::{CoordinatorMetrics, CoordinatorMetricsSnapshot};
