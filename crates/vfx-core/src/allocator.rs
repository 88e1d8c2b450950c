//! Pooled byte-blob allocator.
//!
//! Filter pipelines allocate many same-size staging buffers per frame
//! (tile uploads, channel-retrieval scratch, format-conversion
//! intermediates); re-using them cuts allocator pressure and, on the GPU
//! path, driver churn from repeated buffer creation. This mirrors the
//! size-bucketed pooling idiom `vfx-compute`'s region cache already uses
//! for GPU staging, applied here to plain heap blobs.

use std::sync::{Arc, Mutex};

/// A pool-owned byte buffer.
///
/// Dropping a [`Blob`] returns its storage to the pool it came from rather
/// than freeing it, so callers don't need to call an explicit `release`.
/// A [`Blob`] obtained via [`Allocator::alloc`] on OOM is empty (`len() ==
/// 0`); callers must check.
pub struct Blob {
    data: Vec<u8>,
    pool: Option<Arc<Mutex<PoolInner>>>,
}

impl Blob {
    fn owned(data: Vec<u8>) -> Self {
        Blob { data, pool: None }
    }

    fn pooled(data: Vec<u8>, pool: Arc<Mutex<PoolInner>>) -> Self {
        Blob {
            data,
            pool: Some(pool),
        }
    }

    /// Number of usable bytes. `0` signals an OOM allocation.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if this blob holds no bytes (the OOM sentinel value).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read access to the underlying bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the underlying bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for Blob {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let data = std::mem::take(&mut self.data);
            let class = size_class(data.len());
            if let Ok(mut inner) = pool.lock() {
                inner.buckets.entry(class).or_default().push(data);
            }
        }
    }
}

/// Round a requested size up to its pooling bucket so blobs of similar
/// size are fungible (a 1024x1024 tile upload and a slightly smaller one
/// share a bucket rather than each needing an exact-size match).
fn size_class(bytes: usize) -> usize {
    bytes.next_power_of_two().max(64)
}

#[derive(Default)]
struct PoolInner {
    buckets: std::collections::HashMap<usize, Vec<Vec<u8>>>,
}

/// Reusable byte-blob allocator.
///
/// `alloc`/`release`(implicit via `Drop`)/`reserve`/`release_unused` are
/// internally serialized by a mutex, so a single `Allocator` can be shared
/// across the worker threads that mutate a `Session`'s images.
#[derive(Clone, Default)]
pub struct Allocator {
    pool: Arc<Mutex<PoolInner>>,
}

impl Allocator {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Allocator::default()
    }

    /// Allocates at least `bytes` bytes, reusing a pooled buffer of the
    /// matching size class when available. Returns an empty [`Blob`]
    /// (`len() == 0`) on OOM rather than panicking; callers must check.
    pub fn alloc(&self, bytes: usize) -> Blob {
        let class = size_class(bytes);
        let mut inner = match self.pool.lock() {
            Ok(inner) => inner,
            Err(_) => return Blob::owned(Vec::new()),
        };
        let mut data = inner
            .buckets
            .get_mut(&class)
            .and_then(|bucket| bucket.pop())
            .unwrap_or_default();
        drop(inner);

        if data.len() < bytes {
            if data.try_reserve(bytes - data.len()).is_err() {
                return Blob::owned(Vec::new());
            }
            data.resize(bytes, 0);
        } else {
            data.truncate(bytes);
        }
        Blob::pooled(data, self.pool.clone())
    }

    /// Pre-fills the pool with `count` buffers of `size` bytes so a
    /// subsequent burst of `alloc(size)` calls doesn't pay allocation
    /// cost on the hot path.
    pub fn reserve(&self, count: usize, size: usize) {
        let class = size_class(size);
        let mut inner = match self.pool.lock() {
            Ok(inner) => inner,
            Err(_) => return,
        };
        let bucket = inner.buckets.entry(class).or_default();
        for _ in 0..count {
            bucket.push(vec![0u8; class]);
        }
    }

    /// Frees every buffer currently sitting unused in the pool.
    pub fn release_unused(&self) {
        if let Ok(mut inner) = self.pool.lock() {
            inner.buckets.clear();
        }
    }

    /// Number of buffers currently pooled, across all size classes.
    /// Exposed for tests.
    pub fn pooled_count(&self) -> usize {
        self.pool
            .lock()
            .map(|inner| inner.buckets.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_gives_requested_size() {
        let a = Allocator::new();
        let b = a.alloc(100);
        assert_eq!(b.len(), 100);
    }

    #[test]
    fn blob_reused_after_drop() {
        let a = Allocator::new();
        {
            let _b = a.alloc(1024);
        }
        assert_eq!(a.pooled_count(), 1);
        let b2 = a.alloc(1000);
        assert_eq!(b2.len(), 1000);
        assert_eq!(a.pooled_count(), 0);
    }

    #[test]
    fn reserve_prefills_pool() {
        let a = Allocator::new();
        a.reserve(4, 512);
        assert_eq!(a.pooled_count(), 4);
    }

    #[test]
    fn release_unused_clears_pool() {
        let a = Allocator::new();
        a.reserve(4, 512);
        a.release_unused();
        assert_eq!(a.pooled_count(), 0);
    }

    #[test]
    fn concurrent_alloc_is_safe() {
        use std::thread;
        let a = Allocator::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let a = a.clone();
                thread::spawn(move || {
                    let blob = a.alloc(4096);
                    assert_eq!(blob.len(), 4096);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
