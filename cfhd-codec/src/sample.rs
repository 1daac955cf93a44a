//! Encoded sample buffers and their recycling pool.

use crate::transform::Thumbnail;
use cfhd_core::{AllocatorRef, Result};
use std::collections::VecDeque;

/// An encoded sample produced by an [`EncoderPool`](crate::EncoderPool).
///
/// Hand it back with [`EncoderPool::release_sample_buffer`](crate::EncoderPool::release_sample_buffer)
/// so its storage can be reused.
#[derive(Debug)]
pub struct SampleBuffer {
    data: Vec<u8>,
    frame_number: u64,
    thumbnail: Option<Thumbnail>,
    pool_id: u64,
}

impl SampleBuffer {
    pub(crate) fn new(
        data: Vec<u8>,
        frame_number: u64,
        thumbnail: Option<Thumbnail>,
        pool_id: u64,
    ) -> Self {
        SampleBuffer {
            data,
            frame_number,
            thumbnail,
            pool_id,
        }
    }

    /// Frame number given at submit.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Thumbnail, when the pool was configured to produce one.
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    pub(crate) fn pool_id(&self) -> u64 {
        self.pool_id
    }

    pub(crate) fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Bounded list of reusable sample storage.
#[derive(Debug)]
pub(crate) struct BufferPool {
    available: VecDeque<Vec<u8>>,
    allocator: AllocatorRef,
    /// Maximum number of buffers kept for reuse.
    max_size: usize,
    /// Buffers allocated over the pool's life.
    total_allocated: usize,
}

impl BufferPool {
    pub fn new(allocator: AllocatorRef, max_size: usize) -> Self {
        BufferPool {
            available: VecDeque::with_capacity(max_size),
            allocator,
            max_size,
            total_allocated: 0,
        }
    }

    /// An empty buffer with room for at least `size` bytes.
    ///
    /// Reuses a released buffer when one is available.
    pub fn acquire(&mut self, size: usize) -> Result<Vec<u8>> {
        if let Some(mut buffer) = self.available.pop_front() {
            buffer.clear();
            if buffer.capacity() < size {
                buffer
                    .try_reserve_exact(size)
                    .map_err(|_| cfhd_core::Error::OutOfMemory { size })?;
            }
            return Ok(buffer);
        }
        let buffer = self.allocator.allocate(size)?;
        self.total_allocated += 1;
        Ok(buffer)
    }

    /// Return a buffer for reuse. Buffers beyond the limit go back to the allocator.
    pub fn release(&mut self, buffer: Vec<u8>) {
        if self.available.len() < self.max_size {
            self.available.push_back(buffer);
        } else {
            self.allocator.recycle(buffer);
        }
    }

    pub fn available(&self) -> usize {
        self.available.len()
    }

    pub fn total_allocated(&self) -> usize {
        self.total_allocated
    }

    /// Hand every pooled buffer back to the allocator.
    pub fn clear(&mut self) {
        for buffer in self.available.drain(..) {
            self.allocator.recycle(buffer);
        }
    }
}
