//! Incremental write sinks used by the frame encoder.
//!
//! A [`BufferWriter`] hands out writable memory with [`reserve`] and is told
//! how much of it was filled with [`commit`].  Record serializers write
//! straight into that memory, so a frame is assembled without a scratch copy.
//!
//! [`PatchableWriter`] adds access to bytes that were already committed.  The
//! single-pass encoder needs it to fill in the checksum field after the
//! checksummed region has been written.
//!
//! [`reserve`]: BufferWriter::reserve
//! [`commit`]: BufferWriter::commit

use std::io;

use crate::error::EncodeError;

/// A sink over contiguous memory that is written in reserve/commit steps.
///
/// Only one reservation is outstanding at a time: calling `reserve` again
/// abandons the previous, uncommitted region.
pub trait BufferWriter {
    /// Returns at least `min_size_hint` contiguous writable bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::OutOfCapacity`] if the sink cannot grow.
    fn reserve(&mut self, min_size_hint: usize) -> Result<&mut [u8], EncodeError>;

    /// Marks the first `n` bytes of the last reservation as written.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::InvariantViolation`] if `n` exceeds the size of
    /// the last reservation.
    fn commit(&mut self, n: usize) -> Result<(), EncodeError>;

    /// Number of bytes committed so far.
    fn written(&self) -> usize;

    /// Copies `bytes` into the sink (reserve, copy, commit).
    fn write(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let region = self.reserve(bytes.len())?;
        region[..bytes.len()].copy_from_slice(bytes);
        self.commit(bytes.len())
    }
}

/// A [`BufferWriter`] whose committed bytes can be revisited and patched.
pub trait PatchableWriter: BufferWriter {
    /// Mutable view of every byte committed so far.
    fn committed_mut(&mut self) -> &mut [u8];
}

fn commit_overrun(n: usize, reserved: usize) -> EncodeError {
    EncodeError::InvariantViolation(format!(
        "commit of {n} bytes exceeds reservation of {reserved} bytes"
    ))
}

// ── VecWriter ─────────────────────────────────────────────────────────────────

/// A growable sink backed by a `Vec<u8>`.  Never runs out of capacity.
#[derive(Debug, Default, Clone)]
pub struct VecWriter {
    buf: Vec<u8>,
    committed: usize,
    reserved: usize,
}

impl VecWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from(Vec::with_capacity(capacity))
    }

    /// The committed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.committed]
    }

    /// Allocated capacity of the underlying vector.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Discards all bytes while keeping the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.committed = 0;
        self.reserved = 0;
    }

    /// Returns the committed bytes, dropping any uncommitted reservation.
    pub fn into_inner(mut self) -> Vec<u8> {
        self.buf.truncate(self.committed);
        self.buf
    }
}

impl From<Vec<u8>> for VecWriter {
    /// Wraps `buf`, treating its current contents as already committed.
    fn from(buf: Vec<u8>) -> Self {
        let committed = buf.len();
        Self {
            buf,
            committed,
            reserved: 0,
        }
    }
}

impl BufferWriter for VecWriter {
    fn reserve(&mut self, min_size_hint: usize) -> Result<&mut [u8], EncodeError> {
        self.buf.truncate(self.committed);
        self.buf.resize(self.committed + min_size_hint, 0);
        self.reserved = min_size_hint;
        Ok(&mut self.buf[self.committed..])
    }

    fn commit(&mut self, n: usize) -> Result<(), EncodeError> {
        if n > self.reserved {
            return Err(commit_overrun(n, self.reserved));
        }
        self.committed += n;
        self.reserved = 0;
        self.buf.truncate(self.committed);
        Ok(())
    }

    fn written(&self) -> usize {
        self.committed
    }
}

impl PatchableWriter for VecWriter {
    fn committed_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.committed]
    }
}

// ── SliceWriter ───────────────────────────────────────────────────────────────

/// A fixed-capacity sink over caller-provided memory.
///
/// Useful when the destination is a pre-sized or externally pooled region:
/// the frame is written in place and nothing is allocated.
#[derive(Debug)]
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    reserved: usize,
}

impl<'a> SliceWriter<'a> {
    /// Creates a writer that fills `buf` from its start.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            reserved: 0,
        }
    }

    /// Bytes still free after the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The committed prefix of the underlying buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

impl BufferWriter for SliceWriter<'_> {
    fn reserve(&mut self, min_size_hint: usize) -> Result<&mut [u8], EncodeError> {
        let available = self.remaining();
        if min_size_hint > available {
            self.reserved = 0;
            return Err(EncodeError::OutOfCapacity {
                requested: min_size_hint,
                available,
            });
        }
        self.reserved = available;
        Ok(&mut self.buf[self.pos..])
    }

    fn commit(&mut self, n: usize) -> Result<(), EncodeError> {
        if n > self.reserved {
            return Err(commit_overrun(n, self.reserved));
        }
        self.pos += n;
        self.reserved = 0;
        Ok(())
    }

    fn written(&self) -> usize {
        self.pos
    }
}

impl PatchableWriter for SliceWriter<'_> {
    fn committed_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.pos]
    }
}

// ── RecordWriter ──────────────────────────────────────────────────────────────

/// Adapts any [`BufferWriter`] to [`std::io::Write`] so that serializers
/// (bincode, in this crate) can write directly into sink memory.
///
/// A sink failure is reported to the serializer as an I/O error; the original
/// [`EncodeError`] is kept and can be recovered with
/// [`take_error`](RecordWriter::take_error).
pub struct RecordWriter<'a, W: BufferWriter + ?Sized> {
    inner: &'a mut W,
    error: Option<EncodeError>,
}

impl<'a, W: BufferWriter + ?Sized> RecordWriter<'a, W> {
    pub fn new(inner: &'a mut W) -> Self {
        Self { inner, error: None }
    }

    /// Returns the sink error that interrupted the last write, if any.
    pub fn take_error(&mut self) -> Option<EncodeError> {
        self.error.take()
    }
}

impl<W: BufferWriter + ?Sized> io::Write for RecordWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match BufferWriter::write(self.inner, buf) {
            Ok(()) => Ok(buf.len()),
            Err(e) => {
                let message = e.to_string();
                self.error = Some(e);
                Err(io::Error::new(io::ErrorKind::Other, message))
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
