//! Texture buffer types and the worst-case output capacity contract.
//!
//! # Ownership model
//!
//! - [`TextureBuffer`] borrows the caller's pixels.  The core never mutates
//!   or retains it beyond a single call.
//! - [`UpscaledTexture`] is an owned result.  Whatever a backend allocated on
//!   the caller's behalf has already been copied into it and released on the
//!   backend's side, so dropping it is the one and only release.
//! - [`TextureRef`] is a borrowed view into the result cache, valid until the
//!   next mutating call on the cache.
//!
//! All pixel data is interleaved 8-bit RGB: `[R G B R G B ...]`, rows packed
//! with no padding.

use crate::error::{Result, UpscaleError};

/// Channels per pixel.  Fixed: every buffer in the system is RGB.
pub const CHANNELS: usize = 3;

/// Largest linear upscale factor any backend may produce.
///
/// Worst-case output buffers hold `(w × 4) × (h × 4) × 3` bytes, i.e. 16× the
/// input pixel count.
pub const MAX_LINEAR_SCALE: u32 = 4;

/// Byte length of a packed RGB image, or `None` on overflow.
#[inline]
pub fn rgb_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(CHANNELS)
}

/// Byte length of the worst-case output buffer for an input of the given size.
#[inline]
pub fn worst_case_len(width: u32, height: u32) -> Option<usize> {
    let w = width.checked_mul(MAX_LINEAR_SCALE)?;
    let h = height.checked_mul(MAX_LINEAR_SCALE)?;
    rgb_len(w, h)
}

// ─── Input ────────────────────────────────────────────────────────────────

/// A raw RGB texture handed over by the render loop.
///
/// # Invariants
///
/// 1. `width > 0 && height > 0`.
/// 2. `data.len() >= width × height × 3`.  Trailing bytes beyond the packed
///    image are ignored by every consumer, including the fingerprint.
#[derive(Clone, Copy, Debug)]
pub struct TextureBuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> TextureBuffer<'a> {
    /// Validate and wrap a caller-owned buffer.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::InvalidDimensions`] for a zero (or overflowing) size,
    /// [`UpscaleError::BufferTooSmall`] when `data` is shorter than the image.
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(UpscaleError::InvalidDimensions { width, height });
        }
        let need = rgb_len(width, height).ok_or(UpscaleError::InvalidDimensions { width, height })?;
        if data.len() < need {
            return Err(UpscaleError::BufferTooSmall {
                need,
                have: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// The packed `width × height × 3` pixel bytes.
    #[inline]
    pub fn pixels(&self) -> &'a [u8] {
        &self.data[..self.len()]
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed byte length.  Cannot overflow: checked in [`TextureBuffer::new`].
    #[inline]
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

// ─── Output ───────────────────────────────────────────────────────────────

/// An owned, completed upscale result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpscaledTexture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl UpscaledTexture {
    /// Wrap an owned buffer, checking it holds the full image.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(UpscaleError::InvalidDimensions { width, height });
        }
        let need = rgb_len(width, height).ok_or(UpscaleError::InvalidDimensions { width, height })?;
        if data.len() != need {
            return Err(UpscaleError::BufferTooSmall {
                need,
                have: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn view(&self) -> TextureRef<'_> {
        TextureRef {
            data: &self.data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Borrowed view of an upscaled texture held by the result cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureRef<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl TextureRef<'_> {
    pub fn to_texture(&self) -> UpscaledTexture {
        UpscaledTexture {
            data: self.data.to_vec(),
            width: self.width,
            height: self.height,
        }
    }
}

// ─── Worst-case output buffer ─────────────────────────────────────────────

/// Caller-owned output buffer sized for the largest permitted upscale.
///
/// Backends that write into caller memory (the external accelerator ABI)
/// receive one of these, report the dimensions they actually produced, and
/// the buffer is then trimmed by [`OutputBuffer::finish`].
///
/// Postcondition of `finish`: `out_w × out_h × 3 ≤ capacity()`.  A backend
/// that reports more than fits is treated as a failed call and the buffer is
/// dropped.
#[derive(Debug)]
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    /// Allocate a zeroed worst-case buffer for an input of `width × height`.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::Allocation`] if the allocator refuses; nothing is
    /// retained in that case.
    pub fn worst_case(width: u32, height: u32) -> Result<Self> {
        let bytes =
            worst_case_len(width, height).ok_or(UpscaleError::InvalidDimensions { width, height })?;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| UpscaleError::Allocation { bytes })?;
        data.resize(bytes, 0);
        Ok(Self { data })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Trim to the reported dimensions and hand ownership to the caller.
    pub fn finish(mut self, width: u32, height: u32) -> Result<UpscaledTexture> {
        if width == 0 || height == 0 {
            return Err(UpscaleError::InvalidDimensions { width, height });
        }
        let capacity = self.capacity();
        match rgb_len(width, height) {
            Some(used) if used <= capacity => {
                self.data.truncate(used);
                Ok(UpscaledTexture {
                    data: self.data,
                    width,
                    height,
                })
            }
            _ => Err(UpscaleError::OutputOverflow {
                width,
                height,
                capacity,
            }),
        }
    }
}
