//! Typed error hierarchy for the upscaling core.
//!
//! Every failure the render loop can observe is a variant here.  The three
//! outcomes a caller must never conflate are kept apart:
//!
//! - capability absent ([`UpscaleError::Unsupported`], [`UpscaleError::NotBound`]),
//! - backend call failed ([`UpscaleError::Invocation`], [`UpscaleError::Inference`]),
//! - success (`Ok`).
//!
//! # Error codes
//!
//! Each variant maps to a stable integer code via [`UpscaleError::error_code`]
//! so hosts can log or export failures without string parsing.

use std::path::PathBuf;

use crate::backend::{BackendKind, Capability, RequestId};

/// All errors originating from the upscaling core and its backends.
#[derive(Debug, thiserror::Error)]
pub enum UpscaleError {
    // ── Bind / load ───────────────────────────────────────────────────
    #[error("Failed to load accelerator module {locator}: {reason}")]
    ModuleLoad { locator: String, reason: String },

    #[error("Accelerator module is missing required entry point `{symbol}`")]
    MissingSymbol { symbol: &'static str },

    #[error("{backend} backend initialization failed: {reason}")]
    InitFailed { backend: BackendKind, reason: String },

    #[error("Failed to read model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    // ── Invocation ────────────────────────────────────────────────────
    #[error("{backend} backend call `{call}` reported failure")]
    Invocation {
        backend: BackendKind,
        call: &'static str,
    },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Model metadata error: {0}")]
    ModelMetadata(String),

    // ── Capability ────────────────────────────────────────────────────
    #[error("Capability {0} is not implemented by the bound backend")]
    Unsupported(Capability),

    #[error("No backend is bound")]
    NotBound,

    // ── Request lifecycle ─────────────────────────────────────────────
    #[error("Request {0} not found (never submitted or already collected)")]
    RequestNotFound(RequestId),

    #[error("Request {0} resolved to an error")]
    RequestFailed(RequestId),

    #[error("Request {0} is still pending")]
    RequestPending(RequestId),

    // ── Input / capacity contracts ────────────────────────────────────
    #[error("Invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("Backend output {width}x{height} exceeds the {capacity}-byte worst-case buffer")]
    OutputOverflow {
        width: u32,
        height: u32,
        capacity: usize,
    },

    // ── Allocation / invariants ───────────────────────────────────────
    #[error("Failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl UpscaleError {
    /// Stable integer error code for structured logging.
    ///
    /// Codes are grouped by category:
    /// - 1xx: bind / load
    /// - 2xx: invocation / inference
    /// - 3xx: capability
    /// - 4xx: request lifecycle
    /// - 5xx: input and capacity contracts
    /// - 6xx: allocation / invariants
    pub fn error_code(&self) -> u32 {
        match self {
            Self::ModuleLoad { .. } => 100,
            Self::MissingSymbol { .. } => 101,
            Self::InitFailed { .. } => 102,
            Self::ModelLoad { .. } => 103,
            Self::Invocation { .. } => 200,
            Self::Inference(_) => 201,
            Self::ModelMetadata(_) => 202,
            Self::Unsupported(_) => 300,
            Self::NotBound => 301,
            Self::RequestNotFound(_) => 400,
            Self::RequestFailed(_) => 401,
            Self::RequestPending(_) => 402,
            Self::InvalidDimensions { .. } => 500,
            Self::BufferTooSmall { .. } => 501,
            Self::OutputOverflow { .. } => 502,
            Self::Allocation { .. } => 600,
            Self::InvariantViolation(_) => 601,
        }
    }

    /// Whether this error means "the capability is not there", as opposed to
    /// "the capability is there and failed".  Callers use this to fall back
    /// (e.g. async → sync) without misdiagnosing a fault.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_) | Self::NotBound)
    }

    /// Whether the system keeps serving other requests after this error.
    ///
    /// Only bind-time failures leave the handle unbound; everything else
    /// abandons the one affected request.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::ModuleLoad { .. }
                | Self::MissingSymbol { .. }
                | Self::InitFailed { .. }
                | Self::ModelLoad { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, UpscaleError>;
