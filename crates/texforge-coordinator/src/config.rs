use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use texforge_core::cache::CachePolicy;
use texforge_core::error::{Result, UpscaleError};
use texforge_ort::OrtConfig;

/// Which backend [`Coordinator::bind_configured`](crate::Coordinator::bind_configured)
/// should bind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSelection {
    /// Load an accelerator module from a path or platform library name.
    External { module: String },
    /// Run an ONNX model in-process.
    Local { model: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Result cache retention.
    pub cache: CachePolicy,
    /// Session options for the local backend.
    pub ort: OrtConfig,
    /// Log degraded fallbacks in `resolve` at warn level.  Capability-absent
    /// outcomes (unbound, unsupported) are always logged at debug.
    pub warn_on_degrade: bool,
    pub backend: Option<BackendSelection>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cache: CachePolicy::default(),
            ort: OrtConfig::default(),
            warn_on_degrade: true,
            backend: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_json_str(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|err| {
            UpscaleError::InvariantViolation(format!("Invalid coordinator config JSON: {err}"))
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|err| {
            UpscaleError::InvariantViolation(format!(
                "Failed to read coordinator config from {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&data)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| {
            UpscaleError::InvariantViolation(format!("Failed to serialize coordinator config: {err}"))
        })
    }
}
