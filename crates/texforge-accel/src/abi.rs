//! Accelerator module ABI: exported symbol names and their signatures.
//!
//! Dimensions cross the boundary as `c_int`; buffers are packed RGB8.

use std::os::raw::c_int;

// ─── Core (required) ─────────────────────────────────────────────────────

pub const INIT: &str = "texforge_accel_init";
pub const SHUTDOWN: &str = "texforge_accel_shutdown";
pub const PROCESS: &str = "texforge_accel_process";

/// Returns `1` on success.
pub type InitFn = unsafe extern "C" fn() -> c_int;
pub type ShutdownFn = unsafe extern "C" fn();
/// `(in, w, h, out, out_w, out_h)`; returns `1` on success.
pub type ProcessFn =
    unsafe extern "C" fn(*const u8, c_int, c_int, *mut u8, *mut c_int, *mut c_int) -> c_int;

// ─── Async (optional group) ──────────────────────────────────────────────

pub const SUBMIT: &str = "texforge_accel_submit";
pub const STATUS: &str = "texforge_accel_status";
pub const RESULT: &str = "texforge_accel_result";
pub const FREE: &str = "texforge_accel_free";

/// `(in, w, h)`; returns a request id, `0` on failure.
pub type SubmitFn = unsafe extern "C" fn(*const u8, c_int, c_int) -> c_int;
/// Returns one of [`STATUS_PENDING`], [`STATUS_READY`], [`STATUS_ERROR`].
pub type StatusFn = unsafe extern "C" fn(c_int) -> c_int;
/// `(id, out, w, h)`; hands a module-allocated buffer to the caller.
pub type ResultFn = unsafe extern "C" fn(c_int, *mut *mut u8, *mut c_int, *mut c_int) -> bool;
/// Releases a buffer obtained from [`ResultFn`].
///
/// `len` is `w × h × 3` computed from the dimensions the result call
/// reported, even when those dimensions were rejected; it is 0 if either
/// reported dimension was negative.
pub type FreeFn = unsafe extern "C" fn(*mut u8, usize);

pub const STATUS_PENDING: c_int = 0;
pub const STATUS_READY: c_int = 1;
pub const STATUS_ERROR: c_int = -1;

// ─── Toggle (optional group) ─────────────────────────────────────────────

pub const SET_ENABLED: &str = "texforge_accel_set_enabled";
pub const GET_ENABLED: &str = "texforge_accel_get_enabled";

// ─── OSD (optional group) ────────────────────────────────────────────────

pub const SET_OSD_ENABLED: &str = "texforge_accel_set_osd_enabled";
pub const GET_OSD_ENABLED: &str = "texforge_accel_get_osd_enabled";
pub const RENDER_OSD: &str = "texforge_accel_render_osd";

pub type SetFlagFn = unsafe extern "C" fn(c_int);
pub type GetFlagFn = unsafe extern "C" fn() -> c_int;
pub type RenderOsdFn = unsafe extern "C" fn();

/// Success value for `c_int` status returns.
pub const OK: c_int = 1;
