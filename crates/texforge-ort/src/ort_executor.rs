//! ONNX Runtime executor on the CPU execution provider.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};
use tracing::{debug, info};

use texforge_core::error::{Result, UpscaleError};

use crate::executor::{ElementKind, InferenceExecutor, TensorData, TensorInput, TensorOutput};
use crate::local::OrtConfig;

fn model_load<E: Display>(path: &Path, e: E) -> UpscaleError {
    UpscaleError::ModelLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn inference<E: Display>(e: E) -> UpscaleError {
    UpscaleError::Inference(e.to_string())
}

/// One ORT session plus the tensor names it was loaded with.
pub struct OrtExecutor {
    session: Session,
    model_path: PathBuf,
    name: String,
    input_name: String,
    output_name: String,
    input_element: ElementKind,
}

impl OrtExecutor {
    /// Load `model_path` and inspect its first input and output.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::ModelLoad`] if the session cannot be built,
    /// [`UpscaleError::ModelMetadata`] if the model's IO is not a single
    /// float32 or uint8 image tensor.
    pub fn load(model_path: &Path, config: &OrtConfig) -> Result<Self> {
        info!(
            path = %model_path.display(),
            intra_threads = config.intra_threads,
            "Loading ONNX model on CPU execution provider"
        );
        let session = Session::builder()
            .map_err(|e| model_load(model_path, e))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| model_load(model_path, e))?
            .commit_from_file(model_path)
            .map_err(|e| model_load(model_path, e))?;

        let (Some(input), Some(output)) = (session.inputs().first(), session.outputs().first())
        else {
            return Err(UpscaleError::ModelMetadata(
                "Model must have at least one input and one output tensor".into(),
            ));
        };
        let input_name = input.name().to_string();
        let output_name = output.name().to_string();

        let input_element = match input.dtype() {
            ValueType::Tensor { ty, .. } => match *ty {
                TensorElementType::Float32 => ElementKind::F32,
                TensorElementType::Uint8 => ElementKind::U8,
                other => {
                    return Err(UpscaleError::ModelMetadata(format!(
                        "Unsupported input element type {other:?}"
                    )));
                }
            },
            other => {
                return Err(UpscaleError::ModelMetadata(format!(
                    "Expected tensor input, got {other:?}"
                )));
            }
        };

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        debug!(
            %input_name,
            %output_name,
            element = ?input_element,
            "Detected model IO"
        );

        Ok(Self {
            session,
            model_path: model_path.to_path_buf(),
            name,
            input_name,
            output_name,
            input_element,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl InferenceExecutor for OrtExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_element(&self) -> ElementKind {
        self.input_element
    }

    fn run(&mut self, input: TensorInput) -> Result<TensorOutput> {
        let shape = input.shape;
        let outputs = match input.data {
            TensorData::F32(values) => {
                let tensor = Tensor::from_array((shape, values)).map_err(inference)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(inference)?
            }
            TensorData::U8(values) => {
                let tensor = Tensor::from_array((shape, values)).map_err(inference)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(inference)?
            }
        };

        let value = &outputs[self.output_name.as_str()];
        let data_type = value.dtype().clone();
        match data_type {
            ValueType::Tensor {
                ty: TensorElementType::Uint8,
                ..
            } => {
                let (out_shape, data) = value.try_extract_tensor::<u8>().map_err(inference)?;
                Ok(TensorOutput {
                    shape: out_shape.to_vec(),
                    data: TensorData::U8(data.to_vec()),
                })
            }
            _ => {
                let (out_shape, data) = value.try_extract_tensor::<f32>().map_err(inference)?;
                Ok(TensorOutput {
                    shape: out_shape.to_vec(),
                    data: TensorData::F32(data.to_vec()),
                })
            }
        }
    }
}
