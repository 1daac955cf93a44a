//! Allocator capability used for sample and frame storage.

use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Source of byte buffers for sessions and pools.
///
/// Buffers handed out by `allocate` are owned by the caller until they are
/// passed back through `recycle`.
pub trait Allocator: Send + Sync {
    /// Allocate an empty buffer with room for at least `size` bytes.
    fn allocate(&self, size: usize) -> Result<Vec<u8>>;

    /// Give a buffer back. The default simply drops it.
    fn recycle(&self, buffer: Vec<u8>) {
        drop(buffer);
    }
}

/// Allocator backed by the global heap. Allocation failure is reported, not aborted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| Error::OutOfMemory { size })?;
        Ok(buffer)
    }
}

/// Shared allocator handle.
#[derive(Clone)]
pub struct AllocatorRef(Arc<dyn Allocator>);

impl AllocatorRef {
    /// Wrap an allocator.
    pub fn new(allocator: impl Allocator + 'static) -> Self {
        AllocatorRef(Arc::new(allocator))
    }

    /// Share an existing allocator.
    pub fn shared(allocator: Arc<dyn Allocator>) -> Self {
        AllocatorRef(allocator)
    }

    /// Allocate a buffer.
    pub fn allocate(&self, size: usize) -> Result<Vec<u8>> {
        self.0.allocate(size)
    }

    /// Return a buffer.
    pub fn recycle(&self, buffer: Vec<u8>) {
        self.0.recycle(buffer);
    }
}

impl Default for AllocatorRef {
    fn default() -> Self {
        AllocatorRef::new(SystemAllocator)
    }
}

impl fmt::Debug for AllocatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocatorRef").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAllocator {
        allocations: AtomicUsize,
        recycled: AtomicUsize,
    }

    impl Allocator for CountingAllocator {
        fn allocate(&self, size: usize) -> Result<Vec<u8>> {
            self.allocations.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::with_capacity(size))
        }

        fn recycle(&self, _buffer: Vec<u8>) {
            self.recycled.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_system_allocator() {
        let buffer = SystemAllocator.allocate(1024).unwrap();
        assert!(buffer.capacity() >= 1024);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_system_allocator_reports_oom() {
        let result = SystemAllocator.allocate(usize::MAX);
        assert!(matches!(result, Err(Error::OutOfMemory { .. })));
    }

    #[test]
    fn test_shared_allocator() {
        let counting = Arc::new(CountingAllocator {
            allocations: AtomicUsize::new(0),
            recycled: AtomicUsize::new(0),
        });
        let handle = AllocatorRef::shared(counting.clone());
        let other = handle.clone();

        let buffer = handle.allocate(16).unwrap();
        other.recycle(buffer);

        assert_eq!(counting.allocations.load(Ordering::SeqCst), 1);
        assert_eq!(counting.recycled.load(Ordering::SeqCst), 1);
    }
}
