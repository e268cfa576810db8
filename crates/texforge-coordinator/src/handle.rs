//! Bind/unbind state machine for the one active backend.
//!
//! ```text
//! Unbound ──bind ok──▶ Bound ──unbind──▶ Unbound
//!    ▲                   │
//!    └──── bind error ───┘ (nothing retained)
//! ```
//!
//! Binding while bound is a no-op that reports the current capabilities.
//! Every other operation on an unbound handle is [`UpscaleError::NotBound`].

use std::path::Path;

use tracing::info;

use texforge_accel::ExternalBackend;
use texforge_core::backend::{BackendKind, CapabilitySet, RequestId, RequestState, UpscaleBackend};
use texforge_core::error::{Result, UpscaleError};
use texforge_core::types::{TextureBuffer, UpscaledTexture};
use texforge_ort::{LocalBackend, OrtConfig};

#[derive(Default)]
pub struct BackendHandle {
    backend: Option<Box<dyn UpscaleBackend>>,
}

impl BackendHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_some()
    }

    pub fn kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|b| b.kind())
    }

    /// Capabilities of the bound backend; empty when unbound.
    pub fn capabilities(&self) -> CapabilitySet {
        self.backend
            .as_ref()
            .map_or(CapabilitySet::empty(), |b| b.capabilities())
    }

    /// Bind whatever `connect` produces, unless already bound.
    ///
    /// `connect` is not called when a backend is already bound.
    pub fn bind_with<F>(&mut self, connect: F) -> Result<CapabilitySet>
    where
        F: FnOnce() -> Result<Box<dyn UpscaleBackend>>,
    {
        if let Some(backend) = &self.backend {
            info!(kind = %backend.kind(), "Backend already bound; bind is a no-op");
            return Ok(backend.capabilities());
        }
        let backend = connect()?;
        let capabilities = backend.capabilities();
        info!(kind = %backend.kind(), ?capabilities, "Backend bound");
        self.backend = Some(backend);
        Ok(capabilities)
    }

    /// Bind an already-constructed backend.  If one is bound already, the
    /// new backend is shut down and the current capabilities are returned.
    pub fn bind(&mut self, mut backend: Box<dyn UpscaleBackend>) -> CapabilitySet {
        if self.is_bound() {
            backend.shutdown();
            return self.capabilities();
        }
        let capabilities = backend.capabilities();
        info!(kind = %backend.kind(), ?capabilities, "Backend bound");
        self.backend = Some(backend);
        capabilities
    }

    /// Load and initialize an accelerator module.
    pub fn bind_external(&mut self, locator: &str) -> Result<CapabilitySet> {
        self.bind_with(|| Ok(Box::new(ExternalBackend::bind(locator)?)))
    }

    /// Load an ONNX model for in-process inference.
    pub fn bind_local(&mut self, model: &Path, config: &OrtConfig) -> Result<CapabilitySet> {
        self.bind_with(|| Ok(Box::new(LocalBackend::from_model(model, config)?)))
    }

    /// Shut down and release the bound backend.  Idempotent.
    pub fn unbind(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            let kind = backend.kind();
            backend.shutdown();
            info!(%kind, "Backend unbound");
        }
    }

    fn backend_mut(&mut self) -> Result<&mut (dyn UpscaleBackend + 'static)> {
        self.backend.as_deref_mut().ok_or(UpscaleError::NotBound)
    }

    fn backend_ref(&self) -> Result<&(dyn UpscaleBackend + 'static)> {
        self.backend.as_deref().ok_or(UpscaleError::NotBound)
    }

    pub fn upscale(&mut self, input: &TextureBuffer<'_>) -> Result<UpscaledTexture> {
        self.backend_mut()?.upscale(input)
    }

    pub fn submit(&mut self, input: &TextureBuffer<'_>) -> Result<RequestId> {
        self.backend_mut()?.submit(input)
    }

    pub fn poll(&mut self, id: RequestId) -> Result<RequestState> {
        self.backend_mut()?.poll(id)
    }

    pub fn collect(&mut self, id: RequestId) -> Result<UpscaledTexture> {
        self.backend_mut()?.collect(id)
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.backend_mut()?.set_enabled(enabled)
    }

    pub fn enabled(&self) -> Result<bool> {
        self.backend_ref()?.enabled()
    }

    pub fn set_osd_enabled(&mut self, enabled: bool) -> Result<()> {
        self.backend_mut()?.set_osd_enabled(enabled)
    }

    pub fn osd_enabled(&self) -> Result<bool> {
        self.backend_ref()?.osd_enabled()
    }

    pub fn render_osd(&mut self) -> Result<()> {
        self.backend_mut()?.render_osd()
    }
}

impl Drop for BackendHandle {
    fn drop(&mut self) {
        self.unbind();
    }
}
