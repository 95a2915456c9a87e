//! Opaque asset handle shared between the cache, the loader and callers.
//!
//! Decoding is out of scope: an `Asset` is just the fetched bytes behind an
//! `Arc`, so cloning in and out of the cache is cheap.

use std::fmt;
use std::sync::Arc;

/// Loaded asset payload. Cheap to clone (shared bytes).
#[derive(Clone)]
pub struct Asset {
    bytes: Arc<[u8]>,
}

impl Asset {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Raw payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for Asset {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset").field("len", &self.len()).finish()
    }
}
