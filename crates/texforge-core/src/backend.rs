//! Upscale backend trait: the capability-probed upscaling contract.
//!
//! Every backend implementation must satisfy:
//!
//! 1. **Fixed capabilities**: [`UpscaleBackend::capabilities`] is decided when
//!    the backend is bound and never changes afterwards.
//!
//! 2. **Quiet absence**: a capability the backend does not implement returns
//!    [`UpscaleError::Unsupported`].  The default method bodies already do
//!    this; implementations only override what they actually support.
//!
//! 3. **Owned results**: [`UpscaledTexture`] values handed out are fully
//!    owned by the caller.  No backend keeps a pointer into them.
//!
//! 4. **Deterministic cleanup**: [`UpscaleBackend::shutdown`] releases the
//!    backend's resources exactly once.  Backends must also clean up in
//!    [`Drop`], but callers should prefer explicit `shutdown()`.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpscaleError};
use crate::types::{TextureBuffer, UpscaledTexture};

/// Which variant a bound backend is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process model executor.
    Local,
    /// Dynamically loaded accelerator module.
    External,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Local => "local",
            Self::External => "external",
        })
    }
}

/// One independently optional piece of backend functionality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SyncUpscale,
    AsyncUpscale,
    Toggle,
    Osd,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::SyncUpscale,
        Capability::AsyncUpscale,
        Capability::Toggle,
        Capability::Osd,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::SyncUpscale => 1 << 0,
            Self::AsyncUpscale => 1 << 1,
            Self::Toggle => 1 << 2,
            Self::Osd => 1 << 3,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::SyncUpscale => "sync-upscale",
            Self::AsyncUpscale => "async-upscale",
            Self::Toggle => "toggle",
            Self::Osd => "osd",
        })
    }
}

/// The subset of [`Capability`] a backend implements.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }

    /// `Ok(())` if present, otherwise the matching `Unsupported` error.
    pub fn require(self, capability: Capability) -> Result<()> {
        if self.contains(capability) {
            Ok(())
        } else {
            Err(UpscaleError::Unsupported(capability))
        }
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Identity of an asynchronous upscale request.
///
/// Zero is reserved on the wire as "no request", so a live id is never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(NonZeroU32);

impl RequestId {
    /// Convert a raw id as returned over an ABI.  Zero and negative values
    /// are not valid ids.
    pub fn from_raw(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().and_then(NonZeroU32::new).map(Self)
    }

    pub const fn new(id: NonZeroU32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// The raw value for passing back across an ABI.
    pub fn as_raw(self) -> i32 {
        // Constructed from a non-negative i32 or a caller-supplied NonZeroU32;
        // saturate the latter rather than wrap.
        i32::try_from(self.0.get()).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of an asynchronous request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Ready,
    Failed,
}

/// Capability-probed super-resolution backend.
///
/// See module-level documentation for the full contract.
pub trait UpscaleBackend: Send {
    /// Backend variant, for logging and diagnostics.
    fn kind(&self) -> BackendKind;

    /// Capabilities resolved when the backend was bound.
    fn capabilities(&self) -> CapabilitySet;

    /// Blocking upscale of one texture.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::Unsupported`] if the backend has no synchronous path;
    /// an invocation or inference error if the call itself failed.  No output
    /// is produced on error.
    fn upscale(&mut self, _input: &TextureBuffer<'_>) -> Result<UpscaledTexture> {
        Err(UpscaleError::Unsupported(Capability::SyncUpscale))
    }

    /// Submit a non-blocking upscale, returning the request identity.
    fn submit(&mut self, _input: &TextureBuffer<'_>) -> Result<RequestId> {
        Err(UpscaleError::Unsupported(Capability::AsyncUpscale))
    }

    /// Non-blocking status check.
    fn poll(&mut self, _id: RequestId) -> Result<RequestState> {
        Err(UpscaleError::Unsupported(Capability::AsyncUpscale))
    }

    /// Take the result of a ready request.  Single-shot: a second collect of
    /// the same id is [`UpscaleError::RequestNotFound`].
    fn collect(&mut self, _id: RequestId) -> Result<UpscaledTexture> {
        Err(UpscaleError::Unsupported(Capability::AsyncUpscale))
    }

    fn set_enabled(&mut self, _enabled: bool) -> Result<()> {
        Err(UpscaleError::Unsupported(Capability::Toggle))
    }

    fn enabled(&self) -> Result<bool> {
        Err(UpscaleError::Unsupported(Capability::Toggle))
    }

    fn set_osd_enabled(&mut self, _enabled: bool) -> Result<()> {
        Err(UpscaleError::Unsupported(Capability::Osd))
    }

    fn osd_enabled(&self) -> Result<bool> {
        Err(UpscaleError::Unsupported(Capability::Osd))
    }

    /// Per-frame overlay hook.  Fire-and-forget on the backend side.
    fn render_osd(&mut self) -> Result<()> {
        Err(UpscaleError::Unsupported(Capability::Osd))
    }

    /// Release all backend resources.  Idempotent.
    fn shutdown(&mut self);
}
