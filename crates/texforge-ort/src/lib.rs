#![doc = include_str!("../README.md")]

pub mod executor;
pub mod local;
#[cfg(feature = "ort-runtime")]
pub mod ort_executor;
#[cfg(not(feature = "ort-runtime"))]
#[path = "ort_executor_stub.rs"]
pub mod ort_executor;

pub use executor::{ElementKind, InferenceExecutor, TensorData, TensorInput, TensorOutput};
pub use local::{InferenceMetrics, InferenceMetricsSnapshot, LocalBackend, OrtConfig};
pub use ort_executor::OrtExecutor;
