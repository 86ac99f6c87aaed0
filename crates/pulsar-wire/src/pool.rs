//! Reusable scratch buffers for encoding.
//!
//! # Why pool buffers? (for beginners)
//!
//! Every frame written to a stream needs some scratch memory: the checksum has
//! to be known before the checksummed bytes can be sent.  Allocating and
//! freeing that memory for every message produces a lot of allocator traffic
//! on a busy producer.  A pool keeps a handful of cleared `Vec<u8>`s around
//! and hands them out again.
//!
//! # Scoped leases
//!
//! [`BufferPool::lease`] returns a [`PooledBuffer`] guard.  When the guard is
//! dropped (normal return, early `?` return, or unwinding panic) its buffer
//! goes back to the pool.  A lease therefore never outlives the encode call
//! that took it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::buffer::{BufferWriter, PatchableWriter, VecWriter};
use crate::config::PoolConfig;
use crate::error::EncodeError;

/// A thread-safe pool of reusable byte buffers.
///
/// Cloning is cheap: clones share the same underlying pool.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled_buffers: usize,
    max_retained_capacity: usize,
}

impl BufferPool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(config.max_pooled_buffers)),
                max_pooled_buffers: config.max_pooled_buffers,
                max_retained_capacity: config.max_retained_capacity,
            }),
        }
    }

    /// Checks out an empty buffer with room for at least `capacity` bytes.
    pub fn lease(&self, capacity: usize) -> PooledBuffer {
        let mut buf = self.lock_free().pop().unwrap_or_default();
        buf.reserve(capacity);
        PooledBuffer {
            writer: VecWriter::from(buf),
            pool: self.clone(),
        }
    }

    /// Number of idle buffers currently held by the pool.
    pub fn idle(&self) -> usize {
        self.lock_free().len()
    }

    fn lock_free(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        // A panic while holding the lock cannot leave the free list in an
        // inconsistent state, so poisoning is ignored.
        self.inner.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn give_back(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.inner.max_retained_capacity {
            debug!(
                capacity = buf.capacity(),
                max = self.inner.max_retained_capacity,
                "dropping oversized buffer instead of pooling it"
            );
            return;
        }
        buf.clear();
        let mut free = self.lock_free();
        if free.len() < self.inner.max_pooled_buffers {
            free.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(&PoolConfig::default())
    }
}

/// A buffer checked out of a [`BufferPool`]; returned to it on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    writer: VecWriter,
    pool: BufferPool,
}

impl PooledBuffer {
    /// The committed bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.writer.as_slice()
    }

    /// Allocated capacity of the leased buffer.
    pub fn capacity(&self) -> usize {
        self.writer.capacity()
    }
}

impl BufferWriter for PooledBuffer {
    fn reserve(&mut self, min_size_hint: usize) -> Result<&mut [u8], EncodeError> {
        self.writer.reserve(min_size_hint)
    }

    fn commit(&mut self, n: usize) -> Result<(), EncodeError> {
        self.writer.commit(n)
    }

    fn written(&self) -> usize {
        self.writer.written()
    }
}

impl PatchableWriter for PooledBuffer {
    fn committed_mut(&mut self) -> &mut [u8] {
        self.writer.committed_mut()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.writer).into_inner();
        self.pool.give_back(buf);
    }
}
