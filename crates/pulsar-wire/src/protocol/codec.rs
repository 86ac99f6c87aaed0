//! Binary codec for encoding and decoding protocol frames.
//!
//! Wire format:
//! ```text
//! [total_len:4][cmd_len:4][command:N][magic:2 = 0x0E 0x01][crc32c:4][meta_len:4][metadata:M][payload:P]
//!                                                                   \________ checksummed region ________/
//! ```
//! `total_len` counts every byte after itself.  All integers are big-endian.
//! The CRC-32C covers only the checksummed region, never the command or the
//! fields in front of it.

use std::io;
use std::ops::Range;

use bytes::Bytes;
use tracing::{trace, warn};

use crate::buffer::{BufferWriter, PatchableWriter, VecWriter};
use crate::checksum::crc32c;
use crate::config::CodecConfig;
use crate::error::{DecodeError, EncodeError};
use crate::pool::BufferPool;
use crate::protocol::record::WireRecord;

// ── Frame layout constants ────────────────────────────────────────────────────

/// Fixed marker between the command and the checksum.
pub const MAGIC_NUMBER: [u8; 2] = [0x0E, 0x01];

/// Size of every length prefix (total, command, metadata).
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Size of the magic marker.
pub const MAGIC_SIZE: usize = 2;

/// Size of the CRC-32C field.
pub const CHECKSUM_SIZE: usize = 4;

/// Smallest consistent `total_len`: empty command, metadata and payload.
pub const MIN_TOTAL_LENGTH: usize = LENGTH_FIELD_SIZE + MAGIC_SIZE + CHECKSUM_SIZE + LENGTH_FIELD_SIZE;

// ── Sizes ─────────────────────────────────────────────────────────────────────

/// Serialized sizes of the three variable parts of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizes {
    pub command: usize,
    pub metadata: usize,
    pub payload: usize,
}

impl FrameSizes {
    /// Length of the checksummed region: metadata length field + metadata + payload.
    pub fn checksummed_length(&self) -> u64 {
        LENGTH_FIELD_SIZE as u64 + self.metadata as u64 + self.payload as u64
    }

    /// Value written in the total length field.
    pub fn total_length(&self) -> u64 {
        (LENGTH_FIELD_SIZE + MAGIC_SIZE + CHECKSUM_SIZE) as u64
            + self.command as u64
            + self.checksummed_length()
    }

    /// Number of bytes the whole frame occupies on the wire.
    pub fn frame_length(&self) -> u64 {
        LENGTH_FIELD_SIZE as u64 + self.total_length()
    }
}

// ── Decoded views ─────────────────────────────────────────────────────────────

/// A fully decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame<C, M> {
    pub command: C,
    pub metadata: M,
    pub payload: Bytes,
}

/// A validated frame whose records have not been deserialized.
///
/// Every slice borrows from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame<'a> {
    pub total_length: u32,
    pub command: &'a [u8],
    pub metadata: &'a [u8],
    pub payload: &'a [u8],
    /// The CRC-32C stored in (and verified against) the frame.
    pub checksum: u32,
}

impl RawFrame<'_> {
    /// Number of bytes the frame occupies on the wire.
    pub fn frame_length(&self) -> usize {
        LENGTH_FIELD_SIZE + self.total_length as usize
    }
}

/// Byte offsets of each part of a frame, relative to its first byte.
#[derive(Debug, Clone)]
struct FrameLayout {
    total_length: u32,
    command: Range<usize>,
    checksum: u32,
    metadata: Range<usize>,
    payload: Range<usize>,
}

impl FrameLayout {
    fn frame_length(&self) -> usize {
        LENGTH_FIELD_SIZE + self.total_length as usize
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Encodes and decodes frames.
///
/// The codec holds only its size limit and a shared [`BufferPool`]; every call
/// works on caller-supplied buffers, so one instance can be shared by any
/// number of threads or tasks.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: u32,
    pool: BufferPool,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl FrameCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self::with_pool(config, BufferPool::new(&config.pool))
    }

    /// Creates a codec that leases scratch buffers from an existing pool.
    pub fn with_pool(config: &CodecConfig, pool: BufferPool) -> Self {
        Self {
            max_frame_size: config.max_frame_size,
            pool,
        }
    }

    /// Largest accepted value of the total length field.
    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// The pool used for stream encoding.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    // ── Encoding ──────────────────────────────────────────────────────────────

    /// Measures the frame that `command`, `metadata` and `payload` would produce.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::FrameTooLarge`] if the total length would exceed
    /// the configured maximum, or a serialization error from a record.
    pub fn measure<C, M>(
        &self,
        command: &C,
        metadata: &M,
        payload: &[u8],
    ) -> Result<FrameSizes, EncodeError>
    where
        C: WireRecord,
        M: WireRecord,
    {
        let sizes = FrameSizes {
            command: command.encoded_len()?,
            metadata: metadata.encoded_len()?,
            payload: payload.len(),
        };
        let total = sizes.total_length();
        if total > self.max_frame_size as u64 {
            return Err(EncodeError::FrameTooLarge {
                size: total,
                max: self.max_frame_size,
            });
        }
        Ok(sizes)
    }

    /// Encodes one frame into `sink` in a single pass.
    ///
    /// The checksum field is written as zeros first and patched once the
    /// checksummed region has been committed.  On error the sink may hold a
    /// partial frame, which the caller must discard.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::OutOfCapacity`] if the sink cannot hold the
    /// frame, [`EncodeError::InvariantViolation`] if a record writes a
    /// different number of bytes than it measured, and the errors of
    /// [`FrameCodec::measure`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pulsar_wire::buffer::VecWriter;
    /// use pulsar_wire::protocol::{BaseCommand, FrameCodec, MessageMetadata};
    ///
    /// let codec = FrameCodec::default();
    /// let mut sink = VecWriter::new();
    /// codec
    ///     .encode(&BaseCommand::Ping, &MessageMetadata::default(), b"", &mut sink)
    ///     .unwrap();
    /// let frame = sink.into_inner();
    /// let total = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    /// assert_eq!(total as usize, frame.len() - 4);
    /// ```
    pub fn encode<C, M, W>(
        &self,
        command: &C,
        metadata: &M,
        payload: &[u8],
        sink: &mut W,
    ) -> Result<(), EncodeError>
    where
        C: WireRecord,
        M: WireRecord,
        W: PatchableWriter + ?Sized,
    {
        let sizes = self.measure(command, metadata, payload)?;
        let start = sink.written();

        // measure() bounded every length by max_frame_size, so the casts are lossless
        sink.write(&(sizes.total_length() as u32).to_be_bytes())?;
        sink.write(&(sizes.command as u32).to_be_bytes())?;
        write_record(command, sizes.command, sink, "command")?;
        sink.write(&MAGIC_NUMBER)?;
        let checksum_at = sink.written();
        sink.write(&[0u8; CHECKSUM_SIZE])?;

        let region_start = sink.written();
        write_checksummed_region(metadata, sizes.metadata, payload, sink)?;

        let committed = sink.committed_mut();
        let checksum = crc32c(&committed[region_start..]);
        committed[checksum_at..checksum_at + CHECKSUM_SIZE].copy_from_slice(&checksum.to_be_bytes());

        let written = (sink.written() - start) as u64;
        if written != sizes.frame_length() {
            return Err(EncodeError::InvariantViolation(format!(
                "frame measured {} bytes but wrote {written}",
                sizes.frame_length()
            )));
        }

        trace!(
            total_length = sizes.total_length(),
            command_len = sizes.command,
            metadata_len = sizes.metadata,
            payload_len = sizes.payload,
            checksum = format_args!("0x{checksum:08X}"),
            "encoded frame"
        );
        Ok(())
    }

    /// Encodes one frame into a new vector.
    pub fn encode_to_vec<C, M>(
        &self,
        command: &C,
        metadata: &M,
        payload: &[u8],
    ) -> Result<Vec<u8>, EncodeError>
    where
        C: WireRecord,
        M: WireRecord,
    {
        let sizes = self.measure(command, metadata, payload)?;
        let mut sink = VecWriter::with_capacity(sizes.frame_length() as usize);
        self.encode(command, metadata, payload, &mut sink)?;
        Ok(sink.into_inner())
    }

    /// Encodes one frame into a new [`Bytes`] without an extra copy.
    pub fn encode_to_bytes<C, M>(
        &self,
        command: &C,
        metadata: &M,
        payload: &[u8],
    ) -> Result<Bytes, EncodeError>
    where
        C: WireRecord,
        M: WireRecord,
    {
        self.encode_to_vec(command, metadata, payload).map(Bytes::from)
    }

    /// Encodes one frame onto a stream that cannot be revisited.
    ///
    /// The checksummed region is built in a pooled buffer first, its checksum
    /// computed, and then the header, checksum and region are emitted in
    /// order.  Both pooled buffers are returned before this function returns,
    /// on success and on error.
    ///
    /// Returns the number of bytes written.
    pub fn encode_to_writer<C, M, O>(
        &self,
        command: &C,
        metadata: &M,
        payload: &[u8],
        out: &mut O,
    ) -> Result<usize, EncodeError>
    where
        C: WireRecord,
        M: WireRecord,
        O: io::Write + ?Sized,
    {
        let sizes = self.measure(command, metadata, payload)?;

        let mut region = self.pool.lease(sizes.checksummed_length() as usize);
        write_checksummed_region(metadata, sizes.metadata, payload, &mut region)?;
        let checksum = crc32c(region.as_slice());

        let header_len = 2 * LENGTH_FIELD_SIZE + sizes.command + MAGIC_SIZE + CHECKSUM_SIZE;
        let mut header = self.pool.lease(header_len);
        header.write(&(sizes.total_length() as u32).to_be_bytes())?;
        header.write(&(sizes.command as u32).to_be_bytes())?;
        write_record(command, sizes.command, &mut header, "command")?;
        header.write(&MAGIC_NUMBER)?;
        header.write(&checksum.to_be_bytes())?;

        out.write_all(header.as_slice())?;
        out.write_all(region.as_slice())?;

        trace!(
            total_length = sizes.total_length(),
            checksum = format_args!("0x{checksum:08X}"),
            "wrote frame to stream"
        );
        Ok(header.as_slice().len() + region.as_slice().len())
    }

    // ── Decoding ──────────────────────────────────────────────────────────────

    /// Validates one frame at the start of `bytes` without deserializing its
    /// records.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedFrame`], [`DecodeError::FrameTooLarge`],
    /// [`DecodeError::MalformedFrame`] or [`DecodeError::ChecksumMismatch`].
    pub fn inspect<'a>(&self, bytes: &'a [u8]) -> Result<RawFrame<'a>, DecodeError> {
        let layout = self.parse_layout(bytes)?;
        Ok(RawFrame {
            total_length: layout.total_length,
            command: &bytes[layout.command.clone()],
            metadata: &bytes[layout.metadata.clone()],
            payload: &bytes[layout.payload.clone()],
            checksum: layout.checksum,
        })
    }

    /// Decodes one frame from the start of `bytes`.
    ///
    /// Returns the decoded frame and the number of bytes it occupied, so the
    /// caller can advance past it.  The payload is copied out of `bytes`; use
    /// [`FrameCodec::decode_bytes`] to avoid the copy.
    ///
    /// # Errors
    ///
    /// As [`FrameCodec::inspect`], plus [`DecodeError::InvalidRecord`] if the
    /// command or metadata bytes do not deserialize.
    pub fn decode<C, M>(&self, bytes: &[u8]) -> Result<(DecodedFrame<C, M>, usize), DecodeError>
    where
        C: WireRecord,
        M: WireRecord,
    {
        let layout = self.parse_layout(bytes)?;
        let payload = Bytes::copy_from_slice(&bytes[layout.payload.clone()]);
        let frame = decode_records(bytes, &layout, payload)?;
        Ok((frame, layout.frame_length()))
    }

    /// Decodes one frame from the start of `bytes`, sharing the payload with
    /// the input buffer instead of copying it.
    pub fn decode_bytes<C, M>(&self, bytes: &Bytes) -> Result<(DecodedFrame<C, M>, usize), DecodeError>
    where
        C: WireRecord,
        M: WireRecord,
    {
        let layout = self.parse_layout(bytes)?;
        let payload = bytes.slice(layout.payload.clone());
        let frame = decode_records(bytes, &layout, payload)?;
        Ok((frame, layout.frame_length()))
    }

    /// Checks a total length field before any more of the frame is read.
    pub(crate) fn check_declared_length(&self, total_length: u32) -> Result<(), DecodeError> {
        if total_length > self.max_frame_size {
            return Err(DecodeError::FrameTooLarge {
                size: total_length,
                max: self.max_frame_size,
            });
        }
        if (total_length as usize) < MIN_TOTAL_LENGTH {
            return Err(DecodeError::MalformedFrame(format!(
                "total length {total_length} is below the minimum of {MIN_TOTAL_LENGTH}"
            )));
        }
        Ok(())
    }

    fn parse_layout(&self, bytes: &[u8]) -> Result<FrameLayout, DecodeError> {
        let total_length = read_u32(bytes, 0).ok_or(DecodeError::TruncatedFrame {
            needed: LENGTH_FIELD_SIZE,
            available: bytes.len(),
        })?;
        self.check_declared_length(total_length)?;

        let frame_len = LENGTH_FIELD_SIZE + total_length as usize;
        if bytes.len() < frame_len {
            return Err(DecodeError::TruncatedFrame {
                needed: frame_len,
                available: bytes.len(),
            });
        }
        let frame = &bytes[..frame_len];

        // check_declared_length guarantees the fixed fields fit
        let command_len = read_u32(frame, LENGTH_FIELD_SIZE).unwrap_or_default() as usize;
        let command_room = total_length as usize - MIN_TOTAL_LENGTH;
        if command_len > command_room {
            return Err(DecodeError::MalformedFrame(format!(
                "command length {command_len} exceeds the {command_room} bytes available"
            )));
        }
        let command = 2 * LENGTH_FIELD_SIZE..2 * LENGTH_FIELD_SIZE + command_len;

        let magic_at = command.end;
        let magic = [frame[magic_at], frame[magic_at + 1]];
        if magic != MAGIC_NUMBER {
            return Err(DecodeError::MalformedFrame(format!(
                "bad magic number 0x{:02X}{:02X}, expected 0x0E01",
                magic[0], magic[1]
            )));
        }

        let checksum_at = magic_at + MAGIC_SIZE;
        let checksum = read_u32(frame, checksum_at).unwrap_or_default();

        let checksummed = checksum_at + CHECKSUM_SIZE..frame_len;
        let actual = crc32c(&frame[checksummed.clone()]);
        if actual != checksum {
            warn!(
                expected = format_args!("0x{checksum:08X}"),
                actual = format_args!("0x{actual:08X}"),
                total_length,
                "frame checksum mismatch"
            );
            return Err(DecodeError::ChecksumMismatch {
                expected: checksum,
                actual,
            });
        }

        // the region is intact, so a bad metadata length was written that way
        let metadata_len = read_u32(frame, checksummed.start).unwrap_or_default() as usize;
        let metadata_start = checksummed.start + LENGTH_FIELD_SIZE;
        let metadata_room = frame_len - metadata_start;
        if metadata_len > metadata_room {
            return Err(DecodeError::MalformedFrame(format!(
                "metadata length {metadata_len} exceeds the {metadata_room} bytes available"
            )));
        }
        let metadata = metadata_start..metadata_start + metadata_len;
        let payload = metadata.end..frame_len;

        Ok(FrameLayout {
            total_length,
            command,
            checksum,
            metadata,
            payload,
        })
    }
}

// ── Free functions ────────────────────────────────────────────────────────────

/// Encodes a frame with the default codec settings.
///
/// # Examples
///
/// ```rust
/// use pulsar_wire::protocol::{decode_frame, encode_frame};
/// use pulsar_wire::protocol::messages::{BaseCommand, CommandSend, MessageMetadata};
///
/// let command = BaseCommand::Send(CommandSend { producer_id: 1, sequence_id: 0, num_messages: 1 });
/// let metadata = MessageMetadata::new("producer-1", 0, 1_700_000_000_000);
/// let bytes = encode_frame(&command, &metadata, b"hello").unwrap();
///
/// let (frame, consumed) = decode_frame::<BaseCommand, MessageMetadata>(&bytes).unwrap();
/// assert_eq!(frame.command, command);
/// assert_eq!(frame.metadata, metadata);
/// assert_eq!(&frame.payload[..], b"hello");
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame<C, M>(command: &C, metadata: &M, payload: &[u8]) -> Result<Vec<u8>, EncodeError>
where
    C: WireRecord,
    M: WireRecord,
{
    FrameCodec::default().encode_to_vec(command, metadata, payload)
}

/// Decodes a frame with the default codec settings.
pub fn decode_frame<C, M>(bytes: &[u8]) -> Result<(DecodedFrame<C, M>, usize), DecodeError>
where
    C: WireRecord,
    M: WireRecord,
{
    FrameCodec::default().decode(bytes)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Writes a record and checks that it produced exactly `measured` bytes.
fn write_record<R, W>(record: &R, measured: usize, sink: &mut W, what: &str) -> Result<(), EncodeError>
where
    R: WireRecord,
    W: BufferWriter + ?Sized,
{
    let before = sink.written();
    record.encode_into(sink)?;
    let actual = sink.written() - before;
    if actual != measured {
        return Err(EncodeError::InvariantViolation(format!(
            "{what} measured {measured} bytes but wrote {actual}"
        )));
    }
    Ok(())
}

fn write_checksummed_region<M, W>(
    metadata: &M,
    metadata_len: usize,
    payload: &[u8],
    sink: &mut W,
) -> Result<(), EncodeError>
where
    M: WireRecord,
    W: BufferWriter + ?Sized,
{
    sink.write(&(metadata_len as u32).to_be_bytes())?;
    write_record(metadata, metadata_len, sink, "metadata")?;
    sink.write(payload)
}

fn decode_records<C, M>(
    bytes: &[u8],
    layout: &FrameLayout,
    payload: Bytes,
) -> Result<DecodedFrame<C, M>, DecodeError>
where
    C: WireRecord,
    M: WireRecord,
{
    Ok(DecodedFrame {
        command: C::decode_from(&bytes[layout.command.clone()])?,
        metadata: M::decode_from(&bytes[layout.metadata.clone()])?,
        payload,
    })
}

fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
