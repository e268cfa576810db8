#![doc = include_str!("../README.md")]

pub mod backend;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod tracker;
pub mod types;

pub use backend::{BackendKind, Capability, CapabilitySet, RequestId, RequestState, UpscaleBackend};
pub use cache::{CachePolicy, CacheStats, ResultCache};
pub use error::{Result, UpscaleError};
pub use fingerprint::Fingerprint;
pub use tracker::{RequestTracker, TrackedRequest};
pub use types::{
    CHANNELS, MAX_LINEAR_SCALE, OutputBuffer, TextureBuffer, TextureRef, UpscaledTexture,
};
