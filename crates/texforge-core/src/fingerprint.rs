//! Content fingerprinting for the result cache.
//!
//! A [`Fingerprint`] is the xxHash64 (seed 0) of a texture's packed pixel
//! bytes.  Dimensions are deliberately not mixed in: two buffers with the
//! same bytes are the same texture as far as the cache is concerned.
//! Collisions are accepted as negligible, not handled.

use std::fmt;

use twox_hash::XxHash64;

use crate::types::TextureBuffer;

const SEED: u64 = 0;

/// 64-bit content digest used as the cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Hash raw bytes.  Zero-length input is valid and yields a fixed value.
    #[inline]
    pub fn of(bytes: &[u8]) -> Self {
        Self(XxHash64::oneshot(SEED, bytes))
    }

    /// Hash the packed pixels of a texture.
    #[inline]
    pub fn of_texture(texture: &TextureBuffer<'_>) -> Self {
        Self::of(texture.pixels())
    }

    #[inline]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
