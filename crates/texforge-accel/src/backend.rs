//! [`UpscaleBackend`] over a bound accelerator module.
//!
//! # Lifecycle
//!
//! `bind` loads the module, resolves its symbol table and calls
//! `texforge_accel_init`.  Any failure along the way drops the module again,
//! so a failed bind leaves nothing behind.  `shutdown` (or drop) calls
//! `texforge_accel_shutdown` once and then unloads the library.  After that
//! every call reports [`UpscaleError::NotBound`].
//!
//! # Buffers
//!
//! The synchronous path hands the module a worst-case [`OutputBuffer`].
//! Asynchronous results arrive in module-allocated memory; they are copied
//! into an owned `Vec<u8>` and returned through `texforge_accel_free`
//! exactly once, on every path out of `collect`.

use std::os::raw::c_int;
use std::ptr;
use std::slice;

use tracing::{debug, info, warn};

use texforge_core::backend::{
    BackendKind, Capability, CapabilitySet, RequestId, RequestState, UpscaleBackend,
};
use texforge_core::error::{Result, UpscaleError};
use texforge_core::types::{OutputBuffer, TextureBuffer, UpscaledTexture, rgb_len};

use crate::abi::{self, FreeFn};
use crate::symbols::{AcceleratorSymbols, DynamicModule, SymbolSource};

fn invocation(call: &'static str) -> UpscaleError {
    UpscaleError::Invocation {
        backend: BackendKind::External,
        call,
    }
}

fn abi_dims(input: &TextureBuffer<'_>) -> Result<(c_int, c_int)> {
    let (width, height) = (input.width(), input.height());
    match (c_int::try_from(width), c_int::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(UpscaleError::InvalidDimensions { width, height }),
    }
}

/// Byte length of a result buffer as the module described it: `w × h × 3`,
/// or 0 when either dimension is negative.
fn reported_len(out_w: c_int, out_h: c_int) -> usize {
    match (u64::try_from(out_w), u64::try_from(out_h)) {
        (Ok(w), Ok(h)) => usize::try_from(w * h * 3).unwrap_or(usize::MAX),
        _ => 0,
    }
}

/// A module-owned result buffer, released through the module on drop.
struct ModuleBuffer {
    ptr: *mut u8,
    len: usize,
    free: FreeFn,
}

impl ModuleBuffer {
    /// Copy the contents into host memory.
    fn to_texture(&self, width: u32, height: u32) -> Result<UpscaledTexture> {
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(self.len)
            .map_err(|_| UpscaleError::Allocation { bytes: self.len })?;
        // SAFETY: the module handed out `ptr` as a buffer of `w × h × 3`
        // bytes, which is `len`, and it stays valid until freed in `drop`.
        owned.extend_from_slice(unsafe { slice::from_raw_parts(self.ptr, self.len) });
        UpscaledTexture::new(owned, width, height)
    }
}

impl Drop for ModuleBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from the module's result call and is released
        // here and nowhere else.
        unsafe { (self.free)(self.ptr, self.len) };
    }
}

/// Backend bound to an external accelerator module.
pub struct ExternalBackend {
    locator: String,
    symbols: AcceleratorSymbols,
    capabilities: CapabilitySet,
    /// Keeps the symbol source loaded.  `None` once shut down.
    module: Option<Box<dyn Send>>,
}

impl ExternalBackend {
    /// Load the shared library at `locator` and initialize it.
    ///
    /// The module is trusted to export the signatures in [`crate::abi`].
    ///
    /// # Errors
    ///
    /// [`UpscaleError::ModuleLoad`], [`UpscaleError::MissingSymbol`] or
    /// [`UpscaleError::InitFailed`]; the library is unloaded again in each
    /// case.
    pub fn bind(locator: &str) -> Result<Self> {
        let module = DynamicModule::open(locator)?;
        Self::bind_with(locator, module)
    }

    /// Initialize a module whose symbols come from `source`.
    pub fn bind_with<S>(locator: &str, source: S) -> Result<Self>
    where
        S: SymbolSource + Send + 'static,
    {
        // SAFETY: the host vouches that `source` exports the ABI signatures.
        // The table lives in `Self` next to `source` and is never called once
        // `source` is dropped.
        let symbols = unsafe { AcceleratorSymbols::resolve(&source)? };

        // SAFETY: resolved from a live source with the declared signature.
        let status = unsafe { (symbols.core.init)() };
        if status != abi::OK {
            warn!(locator, status, "Accelerator init failed; unloading module");
            return Err(UpscaleError::InitFailed {
                backend: BackendKind::External,
                reason: format!("{} returned {status}", abi::INIT),
            });
        }

        let capabilities = symbols.capabilities();
        info!(locator, ?capabilities, "Accelerator module bound");
        Ok(Self {
            locator: locator.to_string(),
            symbols,
            capabilities,
            module: Some(Box::new(source)),
        })
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn is_active(&self) -> bool {
        self.module.is_some()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.module.is_some() {
            Ok(())
        } else {
            Err(UpscaleError::NotBound)
        }
    }

    fn async_api(&self) -> Result<crate::symbols::AsyncSymbols> {
        self.ensure_active()?;
        self.symbols
            .async_api
            .ok_or(UpscaleError::Unsupported(Capability::AsyncUpscale))
    }

    fn toggle(&self) -> Result<crate::symbols::ToggleSymbols> {
        self.ensure_active()?;
        self.symbols
            .toggle
            .ok_or(UpscaleError::Unsupported(Capability::Toggle))
    }

    fn osd(&self) -> Result<crate::symbols::OsdSymbols> {
        self.ensure_active()?;
        self.symbols
            .osd
            .ok_or(UpscaleError::Unsupported(Capability::Osd))
    }
}

impl UpscaleBackend for ExternalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn upscale(&mut self, input: &TextureBuffer<'_>) -> Result<UpscaledTexture> {
        self.ensure_active()?;
        let (w, h) = abi_dims(input)?;
        let mut out = OutputBuffer::worst_case(input.width(), input.height())?;
        let (mut out_w, mut out_h): (c_int, c_int) = (0, 0);

        // SAFETY: `input` holds w × h × 3 bytes and `out` is the worst-case
        // buffer the ABI promises the module may fill.
        let status = unsafe {
            (self.symbols.core.process)(
                input.pixels().as_ptr(),
                w,
                h,
                out.as_mut_slice().as_mut_ptr(),
                &mut out_w,
                &mut out_h,
            )
        };
        if status != abi::OK {
            return Err(invocation(abi::PROCESS));
        }

        let width = u32::try_from(out_w).unwrap_or(0);
        let height = u32::try_from(out_h).unwrap_or(0);
        out.finish(width, height)
    }

    fn submit(&mut self, input: &TextureBuffer<'_>) -> Result<RequestId> {
        let api = self.async_api()?;
        let (w, h) = abi_dims(input)?;
        // SAFETY: `input` holds w × h × 3 bytes; the module copies what it
        // needs before returning.
        let raw = unsafe { (api.submit)(input.pixels().as_ptr(), w, h) };
        let id = RequestId::from_raw(raw).ok_or_else(|| invocation(abi::SUBMIT))?;
        debug!(%id, in_w = input.width(), in_h = input.height(), "Accelerator request submitted");
        Ok(id)
    }

    fn poll(&mut self, id: RequestId) -> Result<RequestState> {
        let api = self.async_api()?;
        // SAFETY: plain integer call on a live module.
        let status = unsafe { (api.status)(id.as_raw()) };
        Ok(match status {
            abi::STATUS_PENDING => RequestState::Pending,
            abi::STATUS_READY => RequestState::Ready,
            abi::STATUS_ERROR => RequestState::Failed,
            other => {
                warn!(%id, status = other, "Accelerator returned unknown request status");
                RequestState::Failed
            }
        })
    }

    fn collect(&mut self, id: RequestId) -> Result<UpscaledTexture> {
        let api = self.async_api()?;
        let mut data: *mut u8 = ptr::null_mut();
        let (mut out_w, mut out_h): (c_int, c_int) = (0, 0);

        // SAFETY: out-pointers are valid locals.
        let ok = unsafe { (api.result)(id.as_raw(), &mut data, &mut out_w, &mut out_h) };
        if !ok {
            return Err(UpscaleError::RequestNotFound(id));
        }
        if data.is_null() {
            return Err(invocation(abi::RESULT));
        }

        let buffer = ModuleBuffer {
            ptr: data,
            len: reported_len(out_w, out_h),
            free: api.free,
        };
        let (Ok(width), Ok(height)) = (u32::try_from(out_w), u32::try_from(out_h)) else {
            warn!(%id, out_w, out_h, "Accelerator reported negative result dimensions");
            return Err(invocation(abi::RESULT));
        };
        if width == 0 || height == 0 || rgb_len(width, height) != Some(buffer.len) {
            return Err(UpscaleError::InvalidDimensions { width, height });
        }
        buffer.to_texture(width, height)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        let toggle = self.toggle()?;
        // SAFETY: plain integer call on a live module.
        unsafe { (toggle.set_enabled)(c_int::from(enabled)) };
        Ok(())
    }

    fn enabled(&self) -> Result<bool> {
        let toggle = self.toggle()?;
        // SAFETY: plain integer call on a live module.
        Ok(unsafe { (toggle.get_enabled)() } != 0)
    }

    fn set_osd_enabled(&mut self, enabled: bool) -> Result<()> {
        let osd = self.osd()?;
        // SAFETY: plain integer call on a live module.
        unsafe { (osd.set_enabled)(c_int::from(enabled)) };
        Ok(())
    }

    fn osd_enabled(&self) -> Result<bool> {
        let osd = self.osd()?;
        // SAFETY: plain integer call on a live module.
        Ok(unsafe { (osd.get_enabled)() } != 0)
    }

    fn render_osd(&mut self) -> Result<()> {
        let osd = self.osd()?;
        // SAFETY: no arguments; the module draws with its own state.
        unsafe { (osd.render)() };
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(module) = self.module.take() {
            info!(locator = %self.locator, "Shutting down accelerator module");
            // SAFETY: the module is still loaded; this is the only shutdown call.
            unsafe { (self.symbols.core.shutdown)() };
            drop(module);
            debug!(locator = %self.locator, "Accelerator module unloaded");
        }
    }
}

impl Drop for ExternalBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    //! Fake modules built from `extern "C"` functions with per-thread state.

    use super::*;
    use crate::abi::{
        GetFlagFn, InitFn, ProcessFn, RenderOsdFn, ResultFn, SetFlagFn, ShutdownFn, StatusFn,
        SubmitFn,
    };
    use crate::symbols::SymbolTable;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeState {
        init_status: Cell<c_int>,
        init_calls: Cell<u32>,
        shutdown_calls: Cell<u32>,
        process_calls: Cell<u32>,
        process_status: Cell<c_int>,
        /// Linear scale the fake reports from `process`.
        scale: Cell<c_int>,
        next_id: Cell<c_int>,
        /// id → (status, w, h) for submitted requests.
        requests: RefCell<HashMap<c_int, (c_int, c_int, c_int)>>,
        allocations: Cell<u32>,
        frees: Cell<u32>,
        last_free_len: Cell<usize>,
        /// Dimensions `fake_result_reporting` hands back.
        result_dims: Cell<(c_int, c_int)>,
        enabled: Cell<c_int>,
        osd_enabled: Cell<c_int>,
        osd_renders: Cell<u32>,
    }

    thread_local! {
        static FAKE: FakeState = FakeState::default();
    }

    fn reset(scale: c_int) {
        FAKE.with(|s| {
            s.init_status.set(abi::OK);
            s.init_calls.set(0);
            s.shutdown_calls.set(0);
            s.process_calls.set(0);
            s.process_status.set(abi::OK);
            s.scale.set(scale);
            s.next_id.set(1);
            s.requests.borrow_mut().clear();
            s.allocations.set(0);
            s.frees.set(0);
            s.last_free_len.set(0);
            s.result_dims.set((0, 0));
            s.enabled.set(1);
            s.osd_enabled.set(0);
            s.osd_renders.set(0);
        });
    }

    fn read<T>(f: impl FnOnce(&FakeState) -> T) -> T {
        FAKE.with(f)
    }

    unsafe extern "C" fn fake_init() -> c_int {
        FAKE.with(|s| {
            s.init_calls.set(s.init_calls.get() + 1);
            s.init_status.get()
        })
    }

    unsafe extern "C" fn fake_shutdown() {
        FAKE.with(|s| s.shutdown_calls.set(s.shutdown_calls.get() + 1));
    }

    unsafe extern "C" fn fake_process(
        input: *const u8,
        w: c_int,
        h: c_int,
        out: *mut u8,
        out_w: *mut c_int,
        out_h: *mut c_int,
    ) -> c_int {
        FAKE.with(|s| {
            s.process_calls.set(s.process_calls.get() + 1);
            if s.process_status.get() != abi::OK {
                return s.process_status.get();
            }
            let scale = s.scale.get();
            let (ow, oh) = (w * scale, h * scale);
            // Only write when the result fits the caller's 4× buffer.
            if scale <= 4 {
                let first = unsafe { *input };
                let len = (ow * oh * 3) as usize;
                unsafe { ptr::write_bytes(out, first, len) };
            }
            unsafe {
                *out_w = ow;
                *out_h = oh;
            }
            abi::OK
        })
    }

    unsafe extern "C" fn fake_submit(_input: *const u8, w: c_int, h: c_int) -> c_int {
        FAKE.with(|s| {
            let id = s.next_id.get();
            s.next_id.set(id + 1);
            s.requests
                .borrow_mut()
                .insert(id, (abi::STATUS_PENDING, w * 2, h * 2));
            id
        })
    }

    unsafe extern "C" fn fake_submit_fails(_input: *const u8, _w: c_int, _h: c_int) -> c_int {
        0
    }

    unsafe extern "C" fn fake_status(id: c_int) -> c_int {
        FAKE.with(|s| {
            let mut requests = s.requests.borrow_mut();
            match requests.get_mut(&id) {
                // Each poll advances a pending request to ready.
                Some(entry) if entry.0 == abi::STATUS_PENDING => {
                    entry.0 = abi::STATUS_READY;
                    abi::STATUS_PENDING
                }
                Some(entry) => entry.0,
                None => abi::STATUS_ERROR,
            }
        })
    }

    unsafe extern "C" fn fake_result(
        id: c_int,
        out: *mut *mut u8,
        out_w: *mut c_int,
        out_h: *mut c_int,
    ) -> bool {
        FAKE.with(|s| {
            let mut requests = s.requests.borrow_mut();
            match requests.get(&id) {
                Some(&(abi::STATUS_READY, w, h)) => {
                    requests.remove(&id);
                    let buf = vec![9u8; (w * h * 3) as usize].into_boxed_slice();
                    s.allocations.set(s.allocations.get() + 1);
                    unsafe {
                        *out = Box::into_raw(buf).cast::<u8>();
                        *out_w = w;
                        *out_h = h;
                    }
                    true
                }
                _ => false,
            }
        })
    }

    /// Result storage for `fake_result_reporting`; never written.
    static REPORTED_RESULT: [u8; 12] = [5; 12];

    /// Hands out `REPORTED_RESULT` under whatever dimensions the test set.
    unsafe extern "C" fn fake_result_reporting(
        _id: c_int,
        out: *mut *mut u8,
        out_w: *mut c_int,
        out_h: *mut c_int,
    ) -> bool {
        FAKE.with(|s| {
            let (w, h) = s.result_dims.get();
            unsafe {
                *out = REPORTED_RESULT.as_ptr().cast_mut();
                *out_w = w;
                *out_h = h;
            }
            true
        })
    }

    unsafe extern "C" fn fake_free_record_only(_ptr: *mut u8, len: usize) {
        FAKE.with(|s| {
            s.frees.set(s.frees.get() + 1);
            s.last_free_len.set(len);
        });
    }

    unsafe extern "C" fn fake_free(ptr: *mut u8, len: usize) {
        FAKE.with(|s| {
            s.frees.set(s.frees.get() + 1);
            s.last_free_len.set(len);
        });
        let slice = ptr::slice_from_raw_parts_mut(ptr, len);
        drop(unsafe { Box::from_raw(slice) });
    }

    unsafe extern "C" fn fake_set_enabled(v: c_int) {
        FAKE.with(|s| s.enabled.set(v));
    }

    unsafe extern "C" fn fake_get_enabled() -> c_int {
        FAKE.with(|s| s.enabled.get())
    }

    unsafe extern "C" fn fake_set_osd(v: c_int) {
        FAKE.with(|s| s.osd_enabled.set(v));
    }

    unsafe extern "C" fn fake_get_osd() -> c_int {
        FAKE.with(|s| s.osd_enabled.get())
    }

    unsafe extern "C" fn fake_render_osd() {
        FAKE.with(|s| s.osd_renders.set(s.osd_renders.get() + 1));
    }

    fn core_table() -> SymbolTable {
        SymbolTable::new()
            .with(abi::INIT, fake_init as InitFn as *const ())
            .with(abi::SHUTDOWN, fake_shutdown as ShutdownFn as *const ())
            .with(abi::PROCESS, fake_process as ProcessFn as *const ())
    }

    fn full_table() -> SymbolTable {
        core_table()
            .with(abi::SUBMIT, fake_submit as SubmitFn as *const ())
            .with(abi::STATUS, fake_status as StatusFn as *const ())
            .with(abi::RESULT, fake_result as ResultFn as *const ())
            .with(abi::FREE, fake_free as FreeFn as *const ())
            .with(abi::SET_ENABLED, fake_set_enabled as SetFlagFn as *const ())
            .with(abi::GET_ENABLED, fake_get_enabled as GetFlagFn as *const ())
            .with(abi::SET_OSD_ENABLED, fake_set_osd as SetFlagFn as *const ())
            .with(abi::GET_OSD_ENABLED, fake_get_osd as GetFlagFn as *const ())
            .with(abi::RENDER_OSD, fake_render_osd as RenderOsdFn as *const ())
    }

    fn bind(table: SymbolTable) -> Result<ExternalBackend> {
        ExternalBackend::bind_with("fake", table)
    }

    #[test]
    fn sync_upscale_trims_worst_case_buffer() {
        reset(4);
        let mut backend = bind(core_table()).expect("bind");
        let data = vec![0u8; 64 * 64 * 3];
        let tex = TextureBuffer::new(&data, 64, 64).expect("64x64");
        let out = backend.upscale(&tex).expect("upscale");
        assert_eq!((out.width, out.height), (256, 256));
        assert_eq!(out.data.len(), 256 * 256 * 3);
        assert_eq!(read(|s| s.process_calls.get()), 1);
    }

    #[test]
    fn oversized_report_is_output_overflow() {
        reset(5);
        let mut backend = bind(core_table()).expect("bind");
        let data = [1u8; 3];
        let tex = TextureBuffer::new(&data, 1, 1).expect("1x1");
        assert!(matches!(
            backend.upscale(&tex),
            Err(UpscaleError::OutputOverflow { .. })
        ));
    }

    #[test]
    fn reported_failure_is_invocation_error() {
        reset(2);
        FAKE.with(|s| s.process_status.set(0));
        let mut backend = bind(core_table()).expect("bind");
        let data = [1u8; 3];
        let tex = TextureBuffer::new(&data, 1, 1).expect("1x1");
        let err = backend.upscale(&tex).expect_err("module failed");
        assert!(matches!(
            err,
            UpscaleError::Invocation {
                call: "texforge_accel_process",
                ..
            }
        ));
        assert!(!err.is_unsupported());
    }

    #[test]
    fn module_without_submit_binds_sync_only() {
        reset(2);
        let table = full_table().without(abi::SUBMIT);
        let mut backend = bind(table).expect("bind");
        assert!(!backend.capabilities().contains(Capability::AsyncUpscale));
        assert!(backend.capabilities().contains(Capability::Toggle));

        let data = [1u8; 3];
        let tex = TextureBuffer::new(&data, 1, 1).expect("1x1");
        assert!(matches!(
            backend.submit(&tex),
            Err(UpscaleError::Unsupported(Capability::AsyncUpscale))
        ));
        let id = RequestId::from_raw(1).expect("id");
        assert!(backend.poll(id).expect_err("no async").is_unsupported());
        assert!(backend.collect(id).expect_err("no async").is_unsupported());
        assert!(backend.upscale(&tex).is_ok());
    }

    #[test]
    fn partial_async_group_is_dropped_whole() {
        reset(2);
        for missing in [abi::SUBMIT, abi::STATUS, abi::RESULT, abi::FREE] {
            let backend = bind(full_table().without(missing)).expect("bind");
            assert!(
                !backend.capabilities().contains(Capability::AsyncUpscale),
                "async advertised without {missing}"
            );
        }
    }

    #[test]
    fn rejected_result_is_freed_with_reported_len() {
        reset(2);
        let table = full_table()
            .with(abi::RESULT, fake_result_reporting as ResultFn as *const ())
            .with(abi::FREE, fake_free_record_only as FreeFn as *const ());
        let mut backend = bind(table).expect("bind");
        let id = RequestId::from_raw(1).expect("id");

        FAKE.with(|s| s.result_dims.set((0, 4)));
        assert!(matches!(
            backend.collect(id),
            Err(UpscaleError::InvalidDimensions { .. })
        ));
        assert_eq!(read(|s| (s.frees.get(), s.last_free_len.get())), (1, 0));

        FAKE.with(|s| s.result_dims.set((-2, 4)));
        assert!(matches!(
            backend.collect(id),
            Err(UpscaleError::Invocation { call: "texforge_accel_result", .. })
        ));
        assert_eq!(read(|s| (s.frees.get(), s.last_free_len.get())), (2, 0));

        FAKE.with(|s| s.result_dims.set((2, 2)));
        let out = backend.collect(id).expect("valid dims");
        assert_eq!((out.width, out.height), (2, 2));
        assert_eq!(read(|s| (s.frees.get(), s.last_free_len.get())), (3, 12));
    }

    #[test]
    fn missing_core_symbol_fails_bind() {
        reset(2);
        let err = bind(full_table().without(abi::SHUTDOWN))
            .err()
            .expect("bind fails");
        assert!(matches!(err, UpscaleError::MissingSymbol { .. }));
        assert_eq!(read(|s| s.init_calls.get()), 0);
    }

    #[test]
    fn init_failure_rolls_back() {
        reset(2);
        FAKE.with(|s| s.init_status.set(0));
        let err = bind(full_table()).err().expect("init fails");
        assert!(matches!(err, UpscaleError::InitFailed { .. }));
        assert!(!err.is_recoverable());
        assert_eq!(read(|s| s.init_calls.get()), 1);
        assert_eq!(read(|s| s.shutdown_calls.get()), 0);
    }

    #[test]
    fn async_round_trip_frees_module_buffer_once() {
        reset(2);
        let mut backend = bind(full_table()).expect("bind");
        let data = [3u8; 2 * 2 * 3];
        let tex = TextureBuffer::new(&data, 2, 2).expect("2x2");

        let id = backend.submit(&tex).expect("submit");
        assert_eq!(backend.poll(id).expect("poll"), RequestState::Pending);
        assert_eq!(backend.poll(id).expect("poll"), RequestState::Ready);

        let out = backend.collect(id).expect("collect");
        assert_eq!((out.width, out.height), (4, 4));
        assert!(out.data.iter().all(|&b| b == 9));
        assert_eq!(read(|s| (s.allocations.get(), s.frees.get())), (1, 1));
        assert_eq!(read(|s| s.last_free_len.get()), 4 * 4 * 3);

        assert!(matches!(
            backend.collect(id),
            Err(UpscaleError::RequestNotFound(_))
        ));
        assert_eq!(read(|s| s.frees.get()), 1);
    }

    #[test]
    fn unknown_request_polls_as_failed() {
        reset(2);
        let mut backend = bind(full_table()).expect("bind");
        let id = RequestId::from_raw(99).expect("id");
        assert_eq!(backend.poll(id).expect("poll"), RequestState::Failed);
    }

    #[test]
    fn submit_returning_zero_is_invocation_error() {
        reset(2);
        let table = full_table().with(abi::SUBMIT, fake_submit_fails as SubmitFn as *const ());
        let mut backend = bind(table).expect("bind");
        let data = [0u8; 3];
        let tex = TextureBuffer::new(&data, 1, 1).expect("1x1");
        assert!(matches!(
            backend.submit(&tex),
            Err(UpscaleError::Invocation { call: "texforge_accel_submit", .. })
        ));
    }

    #[test]
    fn toggle_and_osd_pass_through() {
        reset(2);
        let mut backend = bind(full_table()).expect("bind");
        assert!(backend.enabled().expect("enabled"));
        backend.set_enabled(false).expect("disable");
        assert!(!backend.enabled().expect("enabled"));

        assert!(!backend.osd_enabled().expect("osd"));
        backend.set_osd_enabled(true).expect("osd on");
        assert!(backend.osd_enabled().expect("osd"));
        backend.render_osd().expect("render");
        backend.render_osd().expect("render");
        assert_eq!(read(|s| s.osd_renders.get()), 2);
    }

    #[test]
    fn shutdown_runs_once_and_disables_calls() {
        reset(2);
        let mut backend = bind(full_table()).expect("bind");
        backend.shutdown();
        backend.shutdown();
        drop(backend);
        assert_eq!(read(|s| s.shutdown_calls.get()), 1);

        reset(2);
        let mut backend = bind(full_table()).expect("bind");
        backend.shutdown();
        let data = [0u8; 3];
        let tex = TextureBuffer::new(&data, 1, 1).expect("1x1");
        assert!(matches!(backend.upscale(&tex), Err(UpscaleError::NotBound)));
        assert!(matches!(backend.submit(&tex), Err(UpscaleError::NotBound)));
        assert!(matches!(backend.enabled(), Err(UpscaleError::NotBound)));
    }

    #[test]
    fn drop_calls_module_shutdown() {
        reset(2);
        let backend = bind(core_table()).expect("bind");
        drop(backend);
        assert_eq!(read(|s| s.shutdown_calls.get()), 1);
    }
}
