//! LRU cache of decompressed frames.
//!
//! Catalog parsing and sequential member reads keep returning to the same
//! few frames; caching them avoids decompressing a frame once per small read.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Decompressed frames keyed by frame ordinal.
///
/// Keys are only meaningful for one archive, so a cache must not be shared
/// between readers of different archives.
pub struct FrameCache {
    inner: Mutex<LruCache<usize, Arc<Vec<u8>>>>,
}

impl FrameCache {
    /// `None` when `capacity` is 0 (caching disabled).
    pub fn new(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(|cap| FrameCache {
            inner: Mutex::new(LruCache::new(cap)),
        })
    }

    pub fn get(&self, frame: usize) -> Option<Arc<Vec<u8>>> {
        self.inner.lock().get(&frame).cloned()
    }

    pub fn put(&self, frame: usize, plain: Arc<Vec<u8>>) {
        self.inner.lock().put(frame, plain);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
