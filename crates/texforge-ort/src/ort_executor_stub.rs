#![allow(missing_docs)]
//! Stub ONNX Runtime executor for builds without the `ort-runtime` feature.

use std::path::{Path, PathBuf};

use texforge_core::error::{Result, UpscaleError};

use crate::executor::{ElementKind, InferenceExecutor, TensorInput, TensorOutput};
use crate::local::OrtConfig;

fn runtime_disabled_err() -> UpscaleError {
    UpscaleError::Inference(
        "texforge-ort was built without the `ort-runtime` feature; rebuild with \
         `--features ort-runtime` to load ONNX models"
            .into(),
    )
}

pub struct OrtExecutor {
    model_path: PathBuf,
}

impl OrtExecutor {
    pub fn load(model_path: &Path, _config: &OrtConfig) -> Result<Self> {
        let _ = model_path;
        Err(runtime_disabled_err())
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl InferenceExecutor for OrtExecutor {
    fn name(&self) -> &str {
        "ort-disabled"
    }

    fn input_element(&self) -> ElementKind {
        ElementKind::F32
    }

    fn run(&mut self, _input: TensorInput) -> Result<TensorOutput> {
        Err(runtime_disabled_err())
    }
}
