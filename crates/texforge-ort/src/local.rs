//! In-process upscale backend driven by an [`InferenceExecutor`].
//!
//! Pixel bytes are laid out as an NHWC `[1, h, w, 3]` tensor in the element
//! type the model asks for.  Float inputs are normalized to `[0, 1]`; float
//! outputs are scaled back, clamped to `[0, 255]` and rounded.  The output
//! size is whatever the executor's output shape says, bounded by the same
//! 4× worst case the external backend is held to.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use texforge_core::backend::{BackendKind, Capability, CapabilitySet, UpscaleBackend};
use texforge_core::error::{Result, UpscaleError};
use texforge_core::types::{CHANNELS, TextureBuffer, UpscaledTexture, rgb_len, worst_case_len};

use crate::executor::{ElementKind, InferenceExecutor, TensorData, TensorInput, TensorOutput};
use crate::ort_executor::OrtExecutor;

/// ONNX Runtime session options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrtConfig {
    /// Intra-op thread count for the CPU execution provider.
    pub intra_threads: usize,
}

impl Default for OrtConfig {
    fn default() -> Self {
        Self { intra_threads: 4 }
    }
}

// ─── Inference metrics ───────────────────────────────────────────────────

/// Atomic counters for local inference latency.
#[derive(Debug)]
pub struct InferenceMetrics {
    /// Total frames inferred.
    pub frames_inferred: AtomicU64,
    /// Cumulative inference time in microseconds (for avg latency).
    pub total_inference_us: AtomicU64,
    /// Peak single-frame inference time in microseconds.
    pub peak_inference_us: AtomicU64,
}

impl InferenceMetrics {
    pub const fn new() -> Self {
        Self {
            frames_inferred: AtomicU64::new(0),
            total_inference_us: AtomicU64::new(0),
            peak_inference_us: AtomicU64::new(0),
        }
    }

    pub fn record(&self, elapsed_us: u64) {
        self.frames_inferred.fetch_add(1, Ordering::Relaxed);
        self.total_inference_us
            .fetch_add(elapsed_us, Ordering::Relaxed);
        self.peak_inference_us
            .fetch_max(elapsed_us, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> InferenceMetricsSnapshot {
        let frames = self.frames_inferred.load(Ordering::Relaxed);
        let total = self.total_inference_us.load(Ordering::Relaxed);
        InferenceMetricsSnapshot {
            frames_inferred: frames,
            avg_inference_us: if frames > 0 { total / frames } else { 0 },
            peak_inference_us: self.peak_inference_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for InferenceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of inference metrics for reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InferenceMetricsSnapshot {
    pub frames_inferred: u64,
    pub avg_inference_us: u64,
    pub peak_inference_us: u64,
}

// ─── Tensor conversion ───────────────────────────────────────────────────

fn to_tensor(input: &TextureBuffer<'_>, element: ElementKind) -> TensorInput {
    let pixels = input.pixels();
    let data = match element {
        ElementKind::F32 => TensorData::F32(pixels.iter().map(|&b| f32::from(b) / 255.0).collect()),
        ElementKind::U8 => TensorData::U8(pixels.to_vec()),
    };
    TensorInput {
        shape: [1, input.height() as usize, input.width() as usize, CHANNELS],
        data,
    }
}

/// Read `(width, height)` from an NHWC output shape.
fn output_dims(shape: &[i64]) -> Result<(u32, u32)> {
    if shape.len() < 3 {
        return Err(UpscaleError::ModelMetadata(format!(
            "Expected NHWC output shape, got {}D {shape:?}",
            shape.len()
        )));
    }
    let dim = |v: i64| {
        u32::try_from(v)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| UpscaleError::ModelMetadata(format!("Invalid output dimension {v} in {shape:?}")))
    };
    let height = dim(shape[1])?;
    let width = dim(shape[2])?;
    Ok((width, height))
}

#[inline]
fn f32_to_u8(v: f32) -> u8 {
    // NaN falls through clamp unchanged and casts to 0.
    (v * 255.0).clamp(0.0, 255.0).round() as u8
}

fn from_tensor(output: TensorOutput, input: &TextureBuffer<'_>) -> Result<UpscaledTexture> {
    let (width, height) = output_dims(&output.shape)?;
    let need = rgb_len(width, height).ok_or(UpscaleError::InvalidDimensions { width, height })?;
    let capacity = worst_case_len(input.width(), input.height()).unwrap_or(usize::MAX);
    if need > capacity {
        return Err(UpscaleError::OutputOverflow {
            width,
            height,
            capacity,
        });
    }
    if output.data.len() < need {
        return Err(UpscaleError::ModelMetadata(format!(
            "Output tensor holds {} elements, shape {width}x{height} needs {need}",
            output.data.len()
        )));
    }
    let bytes = match output.data {
        TensorData::F32(values) => values[..need].iter().copied().map(f32_to_u8).collect(),
        TensorData::U8(mut values) => {
            values.truncate(need);
            values
        }
    };
    UpscaledTexture::new(bytes, width, height)
}

// ─── Backend ─────────────────────────────────────────────────────────────

/// Synchronous upscaler over a loaded model.
pub struct LocalBackend {
    executor: Option<Box<dyn InferenceExecutor>>,
    metrics: InferenceMetrics,
}

impl LocalBackend {
    /// Wrap an already-constructed executor.
    pub fn new(executor: Box<dyn InferenceExecutor>) -> Self {
        info!(
            executor = executor.name(),
            element = ?executor.input_element(),
            "Local backend ready"
        );
        Self {
            executor: Some(executor),
            metrics: InferenceMetrics::new(),
        }
    }

    /// Load an ONNX model through ONNX Runtime.
    ///
    /// Without the `ort-runtime` feature this always fails with an
    /// [`UpscaleError::Inference`] naming the missing feature.
    pub fn from_model(path: &Path, config: &OrtConfig) -> Result<Self> {
        let executor = OrtExecutor::load(path, config)?;
        Ok(Self::new(Box::new(executor)))
    }

    pub fn metrics(&self) -> InferenceMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn is_active(&self) -> bool {
        self.executor.is_some()
    }
}

impl UpscaleBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::empty().with(Capability::SyncUpscale)
    }

    fn upscale(&mut self, input: &TextureBuffer<'_>) -> Result<UpscaledTexture> {
        let executor = self.executor.as_mut().ok_or(UpscaleError::NotBound)?;
        let tensor = to_tensor(input, executor.input_element());

        let start = Instant::now();
        let output = executor.run(tensor)?;
        let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.metrics.record(elapsed_us);

        let result = from_tensor(output, input)?;
        debug!(
            in_w = input.width(),
            in_h = input.height(),
            out_w = result.width,
            out_h = result.height,
            elapsed_us,
            "Local upscale complete"
        );
        Ok(result)
    }

    fn shutdown(&mut self) {
        if let Some(executor) = self.executor.take() {
            info!(executor = executor.name(), "Shutting down local backend");
            let snap = self.metrics.snapshot();
            info!(
                frames = snap.frames_inferred,
                avg_us = snap.avg_inference_us,
                peak_us = snap.peak_inference_us,
                "Final inference metrics"
            );
        }
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}
