//! Model executor integration point.
//!
//! The local backend never touches a runtime directly; it talks to an
//! [`InferenceExecutor`], which is constructed from a model file, declares
//! the element type of its input tensor, and returns the output tensor with
//! its shape after every run.

use serde::{Deserialize, Serialize};

use texforge_core::error::Result;

/// Element type of a model input or output tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// 32-bit float, values normalized to `[0, 1]`.
    F32,
    /// 8-bit unsigned, raw pixel values.
    U8,
}

/// Typed tensor payload.
#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    U8(Vec<u8>),
}

impl TensorData {
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::F32(_) => ElementKind::F32,
            Self::U8(_) => ElementKind::U8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Model input: one NHWC image, `[1, height, width, 3]`.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorInput {
    pub shape: [usize; 4],
    pub data: TensorData,
}

/// Model output as declared by the executor after a run.
///
/// `shape` is the output tensor's own descriptor; the local backend reads
/// the spatial size from it rather than assuming a fixed scale.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorOutput {
    pub shape: Vec<i64>,
    pub data: TensorData,
}

/// A loaded model that can run one image at a time.
pub trait InferenceExecutor: Send {
    /// Short identifier for logs (model name or runtime label).
    fn name(&self) -> &str;

    /// Element type the model's input tensor expects.
    fn input_element(&self) -> ElementKind;

    /// Run the model once.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::Inference`](texforge_core::UpscaleError::Inference)
    /// if the runtime rejects the input or fails during execution.
    fn run(&mut self, input: TensorInput) -> Result<TensorOutput>;
}
