//! Render-loop entry point.
//!
//! Per texture: fingerprint → cache lookup → (miss) backend → cache insert.
//!
//! # Invariants
//!
//! 1. The cache only ever receives complete results from a bound backend.
//! 2. At most one backend call per fingerprint is in flight.  A repeated
//!    submit returns the existing [`RequestId`]; a synchronous upscale of
//!    pending content reports [`UpscaleError::RequestPending`] instead of
//!    calling the backend again.
//! 3. A request is collected at most once.  Its result goes into the cache
//!    and the request leaves the tracker, whatever the collect outcome.
//! 4. Unbinding shuts the backend down and forgets every outstanding
//!    request.  Cached results stay until [`Coordinator::clear_cache`] or
//!    drop, and are served again once a backend is bound.
//!
//! All mutation takes `&mut self`; hosts sharing a coordinator across
//! threads wrap it in a mutex.

use std::path::Path;

use tracing::{debug, info, warn};

use texforge_core::backend::{CapabilitySet, RequestId, RequestState, UpscaleBackend};
use texforge_core::cache::{CacheStats, ResultCache};
use texforge_core::error::{Result, UpscaleError};
use texforge_core::fingerprint::Fingerprint;
use texforge_core::tracker::RequestTracker;
use texforge_core::types::{TextureBuffer, TextureRef};

use crate::config::{BackendSelection, CoordinatorConfig};
use crate::handle::BackendHandle;
use crate::metrics::{CoordinatorMetrics, CoordinatorMetricsSnapshot};

/// Outcome of [`Coordinator::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// The result is already cached; fetch it with [`Coordinator::cached`].
    Cached(Fingerprint),
    /// A request is in flight, either new or reused.
    Pending(RequestId),
}

pub struct Coordinator {
    handle: BackendHandle,
    cache: ResultCache,
    tracker: RequestTracker,
    metrics: CoordinatorMetrics,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            handle: BackendHandle::new(),
            cache: ResultCache::new(config.cache),
            tracker: RequestTracker::new(),
            metrics: CoordinatorMetrics::new(),
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ── Binding ───────────────────────────────────────────────────────

    pub fn is_bound(&self) -> bool {
        self.handle.is_bound()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.handle.capabilities()
    }

    /// Bind the accelerator module at `locator`.
    pub fn bind_external(&mut self, locator: &str) -> Result<CapabilitySet> {
        self.handle.bind_external(locator)
    }

    /// Bind an ONNX model using the configured session options.
    pub fn bind_local(&mut self, model: &Path) -> Result<CapabilitySet> {
        let ort = self.config.ort.clone();
        self.handle.bind_local(model, &ort)
    }

    /// Bind a caller-constructed backend.
    pub fn bind_backend(&mut self, backend: Box<dyn UpscaleBackend>) -> CapabilitySet {
        self.handle.bind(backend)
    }

    /// Bind whatever `config.backend` names.
    pub fn bind_configured(&mut self) -> Result<CapabilitySet> {
        match self.config.backend.clone() {
            Some(BackendSelection::External { module }) => self.bind_external(&module),
            Some(BackendSelection::Local { model }) => self.bind_local(&model),
            None => Err(UpscaleError::InvariantViolation(
                "configuration names no backend".into(),
            )),
        }
    }

    /// Shut down the backend and abandon its outstanding requests.
    /// Idempotent.  The result cache is kept.
    pub fn unbind(&mut self) {
        if !self.handle.is_bound() {
            return;
        }
        let abandoned = self.tracker.drain();
        if !abandoned.is_empty() {
            info!(count = abandoned.len(), "Abandoning in-flight requests on unbind");
        }
        self.handle.unbind();
    }

    /// Report metrics and unbind.
    pub fn shutdown(&mut self) {
        self.metrics.report();
        let stats = self.cache.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            bytes = stats.bytes,
            evictions = stats.evictions,
            "Final cache stats"
        );
        self.unbind();
    }

    // ── Synchronous path ──────────────────────────────────────────────

    /// Fingerprint `input` and make sure its result is cached.
    ///
    /// Content with an async request in flight is not sent to the backend a
    /// second time: the call fails with [`UpscaleError::RequestPending`].
    fn ensure_cached(&mut self, input: &TextureBuffer<'_>) -> Result<Fingerprint> {
        if !self.handle.is_bound() {
            return Err(UpscaleError::NotBound);
        }
        let fingerprint = Fingerprint::of_texture(input);
        if self.cache.get(fingerprint).is_some() {
            CoordinatorMetrics::bump(&self.metrics.cache_hits);
            return Ok(fingerprint);
        }
        if let Some(id) = self.tracker.in_flight(fingerprint) {
            CoordinatorMetrics::bump(&self.metrics.dedup_reuses);
            debug!(%fingerprint, %id, "Upscale requested while async request is pending");
            return Err(UpscaleError::RequestPending(id));
        }

        CoordinatorMetrics::bump(&self.metrics.backend_invocations);
        let texture = self.handle.upscale(input)?;
        debug!(
            %fingerprint,
            in_w = input.width(),
            in_h = input.height(),
            out_w = texture.width,
            out_h = texture.height,
            "Upscaled and cached"
        );
        self.cache.insert(fingerprint, texture);
        Ok(fingerprint)
    }

    /// Upscale `input`, serving repeats from the cache.
    ///
    /// The returned view borrows the cache and is valid until the next
    /// mutating call.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::RequestPending`] if the same content was submitted
    /// asynchronously and has not been collected yet.
    pub fn upscale(&mut self, input: &TextureBuffer<'_>) -> Result<TextureRef<'_>> {
        let fingerprint = self.ensure_cached(input)?;
        self.cache
            .peek(fingerprint)
            .ok_or_else(|| UpscaleError::InvariantViolation(format!("{fingerprint} evicted on insert")))
    }

    /// Like [`Coordinator::upscale`], but never fails: on any error the
    /// original texture is returned and the error is logged.
    pub fn resolve<'a>(&'a mut self, input: &TextureBuffer<'a>) -> TextureRef<'a> {
        match self.ensure_cached(input) {
            Ok(fingerprint) => {
                if let Some(view) = self.cache.peek(fingerprint) {
                    return view;
                }
            }
            Err(err) => self.note_degraded(&err),
        }
        TextureRef {
            data: input.pixels(),
            width: input.width(),
            height: input.height(),
        }
    }

    fn note_degraded(&self, err: &UpscaleError) {
        CoordinatorMetrics::bump(&self.metrics.degraded_fallbacks);
        let expected = err.is_unsupported() || matches!(err, UpscaleError::RequestPending(_));
        if expected || !self.config.warn_on_degrade {
            debug!(error = %err, code = err.error_code(), "Serving original texture");
        } else {
            warn!(error = %err, code = err.error_code(), "Upscale failed; serving original texture");
        }
    }

    // ── Asynchronous path ─────────────────────────────────────────────

    /// Start a non-blocking upscale of `input`.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::NotBound`], or [`UpscaleError::Unsupported`] when the
    /// backend has no async path (use [`Coordinator::upscale`] instead).
    pub fn submit(&mut self, input: &TextureBuffer<'_>) -> Result<Submission> {
        if !self.handle.is_bound() {
            return Err(UpscaleError::NotBound);
        }
        let fingerprint = Fingerprint::of_texture(input);
        if self.cache.get(fingerprint).is_some() {
            CoordinatorMetrics::bump(&self.metrics.cache_hits);
            return Ok(Submission::Cached(fingerprint));
        }
        if let Some(id) = self.tracker.in_flight(fingerprint) {
            CoordinatorMetrics::bump(&self.metrics.dedup_reuses);
            debug!(%fingerprint, %id, "Reusing in-flight request");
            return Ok(Submission::Pending(id));
        }

        let id = self.handle.submit(input)?;
        CoordinatorMetrics::bump(&self.metrics.backend_invocations);
        self.tracker
            .track(id, fingerprint, (input.width(), input.height()))?;
        debug!(%fingerprint, %id, "Submitted async upscale");
        Ok(Submission::Pending(id))
    }

    /// Non-blocking status of a tracked request.
    ///
    /// A backend error while polling ends the request: it leaves the
    /// tracker, so the same content can be submitted again.
    pub fn poll(&mut self, id: RequestId) -> Result<RequestState> {
        if !self.handle.is_bound() {
            return Err(UpscaleError::NotBound);
        }
        let tracked = self.tracker.get(id).ok_or(UpscaleError::RequestNotFound(id))?;
        if tracked.state != RequestState::Pending {
            return Ok(tracked.state);
        }
        let state = match self.handle.poll(id) {
            Ok(state) => state,
            Err(err) => {
                if !err.is_unsupported() {
                    warn!(%id, error = %err, "Poll failed; dropping request");
                    self.tracker.finish(id)?;
                    CoordinatorMetrics::bump(&self.metrics.requests_failed);
                }
                return Err(err);
            }
        };
        self.tracker.update(id, state)?;
        Ok(state)
    }

    /// Take the result of a finished request, caching it.
    ///
    /// # Errors
    ///
    /// - [`UpscaleError::RequestPending`] if the backend is not done yet.
    /// - [`UpscaleError::RequestFailed`] if the backend reported an error.
    /// - [`UpscaleError::RequestNotFound`] for an unknown or already
    ///   collected id.
    pub fn collect(&mut self, id: RequestId) -> Result<TextureRef<'_>> {
        match self.poll(id)? {
            RequestState::Pending => return Err(UpscaleError::RequestPending(id)),
            RequestState::Failed => {
                self.tracker.finish(id)?;
                CoordinatorMetrics::bump(&self.metrics.requests_failed);
                return Err(UpscaleError::RequestFailed(id));
            }
            RequestState::Ready => {}
        }

        let tracked = self.tracker.finish(id)?;
        let texture = self.handle.collect(id).inspect_err(|_| {
            CoordinatorMetrics::bump(&self.metrics.requests_failed);
        })?;
        CoordinatorMetrics::bump(&self.metrics.requests_collected);
        let fingerprint = tracked.fingerprint;
        self.cache.insert(fingerprint, texture);
        self.cache
            .peek(fingerprint)
            .ok_or_else(|| UpscaleError::InvariantViolation(format!("{fingerprint} evicted on insert")))
    }

    /// View a cached result, e.g. after [`Submission::Cached`].  Does not
    /// count as a cache lookup.
    pub fn cached(&self, fingerprint: Fingerprint) -> Option<TextureRef<'_>> {
        self.cache.peek(fingerprint)
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    // ── Pass-through ──────────────────────────────────────────────────

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.handle.set_enabled(enabled)
    }

    pub fn enabled(&self) -> Result<bool> {
        self.handle.enabled()
    }

    pub fn set_osd_enabled(&mut self, enabled: bool) -> Result<()> {
        self.handle.set_osd_enabled(enabled)
    }

    pub fn osd_enabled(&self) -> Result<bool> {
        self.handle.osd_enabled()
    }

    /// Per-frame OSD hook.
    pub fn render_osd(&mut self) -> Result<()> {
        self.handle.render_osd()
    }

    // ── Introspection ─────────────────────────────────────────────────

    pub fn metrics(&self) -> CoordinatorMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}
