//! Symbol resolution for accelerator modules.
//!
//! [`AcceleratorSymbols::resolve`] turns a [`SymbolSource`] into a typed
//! table.  The core group must resolve completely or binding fails; each
//! optional group is all-or-nothing and only disables its own capability.

use std::collections::HashMap;
use std::mem;

use libloading::Library;
use tracing::debug;

use texforge_core::backend::{Capability, CapabilitySet};
use texforge_core::error::{Result, UpscaleError};

use crate::abi::{
    self, FreeFn, GetFlagFn, InitFn, ProcessFn, RenderOsdFn, ResultFn, SetFlagFn, ShutdownFn,
    StatusFn, SubmitFn,
};

/// Something that can look up exported functions by name.
pub trait SymbolSource {
    /// Look up `name` and reinterpret it as `T`.
    ///
    /// # Safety
    ///
    /// `T` must be a function pointer type whose signature matches the
    /// exported symbol exactly.  The returned value is only valid while
    /// `self` is alive.
    unsafe fn resolve<T: Copy>(&self, name: &'static str) -> Option<T>;
}

// ─── Shared library ──────────────────────────────────────────────────────

/// A loaded shared library.  Dropping it unloads the module.
pub struct DynamicModule {
    library: Library,
    locator: String,
}

impl DynamicModule {
    /// Load the module at `locator` (a path or a name the platform loader
    /// can find).
    ///
    /// Loading runs the module's static initializers; the host must trust
    /// the module it names.
    pub fn open(locator: &str) -> Result<Self> {
        // SAFETY: loading a library runs arbitrary initialization code. The
        // locator is chosen by the host, which vouches for the module.
        let library = unsafe { Library::new(locator) }.map_err(|e| UpscaleError::ModuleLoad {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;
        debug!(locator, "Accelerator module loaded");
        Ok(Self {
            library,
            locator: locator.to_string(),
        })
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

impl SymbolSource for DynamicModule {
    unsafe fn resolve<T: Copy>(&self, name: &'static str) -> Option<T> {
        // SAFETY: forwarded to the caller's contract on `T`.
        let symbol = unsafe { self.library.get::<T>(name.as_bytes()) }.ok()?;
        Some(*symbol)
    }
}

// ─── In-process table ────────────────────────────────────────────────────

/// Name → function address map for modules linked into the host process.
///
/// Used to bind accelerators that are statically linked, and to exercise
/// the binding logic without a shared library on disk.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<&'static str, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `addr` (a function pointer cast to `*const ()`) under `name`.
    #[must_use]
    pub fn with(mut self, name: &'static str, addr: *const ()) -> Self {
        self.entries.insert(name, addr as usize);
        self
    }

    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.entries.remove(name);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

impl SymbolSource for SymbolTable {
    unsafe fn resolve<T: Copy>(&self, name: &'static str) -> Option<T> {
        if mem::size_of::<T>() != mem::size_of::<*const ()>() {
            return None;
        }
        let ptr = *self.entries.get(name)? as *const ();
        if ptr.is_null() {
            return None;
        }
        // SAFETY: sizes match, and the caller guarantees `T` is the function
        // pointer type registered under `name`.
        Some(unsafe { mem::transmute_copy(&ptr) })
    }
}

// ─── Typed table ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct CoreSymbols {
    pub init: InitFn,
    pub shutdown: ShutdownFn,
    pub process: ProcessFn,
}

#[derive(Clone, Copy, Debug)]
pub struct AsyncSymbols {
    pub submit: SubmitFn,
    pub status: StatusFn,
    pub result: ResultFn,
    pub free: FreeFn,
}

#[derive(Clone, Copy, Debug)]
pub struct ToggleSymbols {
    pub set_enabled: SetFlagFn,
    pub get_enabled: GetFlagFn,
}

#[derive(Clone, Copy, Debug)]
pub struct OsdSymbols {
    pub set_enabled: SetFlagFn,
    pub get_enabled: GetFlagFn,
    pub render: RenderOsdFn,
}

/// Every entry point an accelerator module may export.
#[derive(Clone, Copy, Debug)]
pub struct AcceleratorSymbols {
    pub core: CoreSymbols,
    pub async_api: Option<AsyncSymbols>,
    pub toggle: Option<ToggleSymbols>,
    pub osd: Option<OsdSymbols>,
}

unsafe fn required<S: SymbolSource, T: Copy>(source: &S, name: &'static str) -> Result<T> {
    // SAFETY: forwarded to the caller's contract.
    unsafe { source.resolve(name) }.ok_or(UpscaleError::MissingSymbol { symbol: name })
}

impl AcceleratorSymbols {
    /// Resolve the full table from `source`.
    ///
    /// # Safety
    ///
    /// Every symbol `source` exports under an ABI name must have the
    /// signature declared in [`crate::abi`].  The table must not be used
    /// after `source` is dropped.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::MissingSymbol`] naming the first absent core symbol.
    pub unsafe fn resolve<S: SymbolSource>(source: &S) -> Result<Self> {
        // SAFETY: the caller guarantees the exported signatures.
        unsafe {
            let core = CoreSymbols {
                init: required(source, abi::INIT)?,
                shutdown: required(source, abi::SHUTDOWN)?,
                process: required(source, abi::PROCESS)?,
            };

            let async_api = (|| {
                Some(AsyncSymbols {
                    submit: source.resolve(abi::SUBMIT)?,
                    status: source.resolve(abi::STATUS)?,
                    result: source.resolve(abi::RESULT)?,
                    free: source.resolve(abi::FREE)?,
                })
            })();
            let toggle = (|| {
                Some(ToggleSymbols {
                    set_enabled: source.resolve(abi::SET_ENABLED)?,
                    get_enabled: source.resolve(abi::GET_ENABLED)?,
                })
            })();
            let osd = (|| {
                Some(OsdSymbols {
                    set_enabled: source.resolve(abi::SET_OSD_ENABLED)?,
                    get_enabled: source.resolve(abi::GET_OSD_ENABLED)?,
                    render: source.resolve(abi::RENDER_OSD)?,
                })
            })();

            let table = Self {
                core,
                async_api,
                toggle,
                osd,
            };
            debug!(
                async_api = table.async_api.is_some(),
                toggle = table.toggle.is_some(),
                osd = table.osd.is_some(),
                "Resolved accelerator symbol groups"
            );
            Ok(table)
        }
    }

    /// Capabilities implied by which groups resolved.
    pub fn capabilities(&self) -> CapabilitySet {
        let mut caps = CapabilitySet::empty().with(Capability::SyncUpscale);
        if self.async_api.is_some() {
            caps = caps.with(Capability::AsyncUpscale);
        }
        if self.toggle.is_some() {
            caps = caps.with(Capability::Toggle);
        }
        if self.osd.is_some() {
            caps = caps.with(Capability::Osd);
        }
        caps
    }
}
