//! Reading and writing frames on blocking and async byte streams.
//!
//! The readers check the total length field before allocating for the body,
//! so a peer cannot make them reserve more than the configured maximum.

use std::io::{self, Read, Write};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::buffer::BufferWriter;
use crate::error::{DecodeError, EncodeError};
use crate::protocol::codec::{DecodedFrame, FrameCodec, LENGTH_FIELD_SIZE};
use crate::protocol::record::WireRecord;

// ── Blocking ──────────────────────────────────────────────────────────────────

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` if the stream ends cleanly before the first byte of a
/// frame.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedFrame`] if the stream ends inside a frame,
/// [`DecodeError::Io`] for read failures, and any decode error for the frame.
pub fn read_frame<C, M, R>(
    reader: &mut R,
    codec: &FrameCodec,
) -> Result<Option<DecodedFrame<C, M>>, DecodeError>
where
    C: WireRecord,
    M: WireRecord,
    R: Read + ?Sized,
{
    let mut prefix = [0u8; LENGTH_FIELD_SIZE];
    let got = fill(reader, &mut prefix)?;
    if got == 0 {
        return Ok(None);
    }
    let mut frame = begin_frame(codec, &prefix, got)?;
    let got = fill(reader, &mut frame[LENGTH_FIELD_SIZE..])?;
    finish_frame(codec, frame, got).map(Some)
}

/// Writes one frame to `out` and flushes it.  Returns the number of bytes
/// written.
pub fn write_frame<C, M, O>(
    out: &mut O,
    codec: &FrameCodec,
    command: &C,
    metadata: &M,
    payload: &[u8],
) -> Result<usize, EncodeError>
where
    C: WireRecord,
    M: WireRecord,
    O: Write + ?Sized,
{
    let written = codec.encode_to_writer(command, metadata, payload, out)?;
    out.flush()?;
    Ok(written)
}

/// Reads until `buf` is full or the stream ends; returns the bytes read.
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Async ─────────────────────────────────────────────────────────────────────

/// Async counterpart of [`read_frame`].
pub async fn read_frame_async<C, M, R>(
    reader: &mut R,
    codec: &FrameCodec,
) -> Result<Option<DecodedFrame<C, M>>, DecodeError>
where
    C: WireRecord,
    M: WireRecord,
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; LENGTH_FIELD_SIZE];
    let got = fill_async(reader, &mut prefix).await?;
    if got == 0 {
        return Ok(None);
    }
    let mut frame = begin_frame(codec, &prefix, got)?;
    let got = fill_async(reader, &mut frame[LENGTH_FIELD_SIZE..]).await?;
    finish_frame(codec, frame, got).map(Some)
}

/// Async counterpart of [`write_frame`].
///
/// The frame is encoded in one pass into a pooled buffer, which is then
/// written with a single `write_all`.
pub async fn write_frame_async<C, M, O>(
    out: &mut O,
    codec: &FrameCodec,
    command: &C,
    metadata: &M,
    payload: &[u8],
) -> Result<usize, EncodeError>
where
    C: WireRecord,
    M: WireRecord,
    O: AsyncWrite + Unpin + ?Sized,
{
    let sizes = codec.measure(command, metadata, payload)?;
    let mut lease = codec.pool().lease(sizes.frame_length() as usize);
    codec.encode(command, metadata, payload, &mut lease)?;
    out.write_all(lease.as_slice()).await?;
    out.flush().await?;
    Ok(lease.written())
}

async fn fill_async<R: AsyncRead + Unpin + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

// ── Shared steps ──────────────────────────────────────────────────────────────

/// Validates the length prefix and allocates the whole frame, prefix included.
fn begin_frame(
    codec: &FrameCodec,
    prefix: &[u8; LENGTH_FIELD_SIZE],
    got: usize,
) -> Result<Vec<u8>, DecodeError> {
    if got < LENGTH_FIELD_SIZE {
        return Err(DecodeError::TruncatedFrame {
            needed: LENGTH_FIELD_SIZE,
            available: got,
        });
    }
    let total_length = u32::from_be_bytes(*prefix);
    codec.check_declared_length(total_length)?;
    let mut frame = vec![0u8; LENGTH_FIELD_SIZE + total_length as usize];
    frame[..LENGTH_FIELD_SIZE].copy_from_slice(prefix);
    Ok(frame)
}

fn finish_frame<C, M>(
    codec: &FrameCodec,
    frame: Vec<u8>,
    body_read: usize,
) -> Result<DecodedFrame<C, M>, DecodeError>
where
    C: WireRecord,
    M: WireRecord,
{
    let available = LENGTH_FIELD_SIZE + body_read;
    if available < frame.len() {
        return Err(DecodeError::TruncatedFrame {
            needed: frame.len(),
            available,
        });
    }
    let (decoded, _) = codec.decode_bytes(&Bytes::from(frame))?;
    Ok(decoded)
}
