//! Incremental frame decoding for byte streams.
//!
//! A socket delivers bytes in arbitrary chunks.  [`FrameDecoder`] buffers them
//! and yields a frame only once every byte of it has arrived, so a short read
//! means "wait", not [`DecodeError::TruncatedFrame`].

use std::marker::PhantomData;

use bytes::BytesMut;
use tracing::trace;

use crate::error::DecodeError;
use crate::protocol::codec::{DecodedFrame, FrameCodec, LENGTH_FIELD_SIZE};
use crate::protocol::record::WireRecord;

/// Buffers incoming bytes and splits them into frames.
///
/// ```rust
/// use pulsar_wire::protocol::{encode_frame, BaseCommand, FrameDecoder, MessageMetadata};
///
/// let bytes = encode_frame(&BaseCommand::Ping, &MessageMetadata::default(), b"").unwrap();
/// let mut decoder = FrameDecoder::<BaseCommand, MessageMetadata>::default();
///
/// decoder.extend(&bytes[..5]);
/// assert!(decoder.decode().unwrap().is_none());
///
/// decoder.extend(&bytes[5..]);
/// let frame = decoder.decode().unwrap().unwrap();
/// assert_eq!(frame.command, BaseCommand::Ping);
/// assert_eq!(decoder.buffered(), 0);
/// ```
#[derive(Debug)]
pub struct FrameDecoder<C, M> {
    codec: FrameCodec,
    buf: BytesMut,
    _records: PhantomData<fn() -> (C, M)>,
}

impl<C, M> Default for FrameDecoder<C, M> {
    fn default() -> Self {
        Self::new(FrameCodec::default())
    }
}

impl<C, M> FrameDecoder<C, M> {
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            codec,
            buf: BytesMut::new(),
            _records: PhantomData,
        }
    }

    /// Appends received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes received but not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Discards everything buffered, e.g. after a fatal error.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl<C: WireRecord, M: WireRecord> FrameDecoder<C, M> {
    /// Decodes the next complete frame.
    ///
    /// Returns `Ok(None)` while the buffered bytes do not yet hold a whole
    /// frame.  An oversized or undersized length field is reported as soon as
    /// its four bytes are visible, without waiting for the body.
    ///
    /// # Errors
    ///
    /// Any structural or record error from [`FrameCodec::decode_bytes`].  The
    /// bytes of the offending frame have been consumed when the error comes
    /// from the body, but the stream should be considered unusable anyway.
    pub fn decode(&mut self) -> Result<Option<DecodedFrame<C, M>>, DecodeError> {
        let Some(prefix) = self.buf.get(..LENGTH_FIELD_SIZE) else {
            return Ok(None);
        };
        let total_length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        self.codec.check_declared_length(total_length)?;

        let frame_len = LENGTH_FIELD_SIZE + total_length as usize;
        if self.buf.len() < frame_len {
            self.buf.reserve(frame_len - self.buf.len());
            return Ok(None);
        }

        let frame = self.buf.split_to(frame_len).freeze();
        let (decoded, _) = self.codec.decode_bytes(&frame)?;
        trace!(frame_len, buffered = self.buf.len(), "decoded buffered frame");
        Ok(Some(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use crate::protocol::codec::encode_frame;
    use crate::protocol::messages::*;

    type Decoder = FrameDecoder<BaseCommand, MessageMetadata>;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let command = BaseCommand::Send(CommandSend {
            producer_id: 3,
            sequence_id: 11,
            num_messages: 1,
        });
        encode_frame(&command, &MessageMetadata::new("p", 11, 1), payload).unwrap()
    }

    #[test]
    fn test_empty_decoder_needs_more_bytes() {
        let mut decoder = Decoder::default();
        assert!(decoder.decode().unwrap().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_byte_by_byte_feeding_yields_one_frame() {
        let bytes = frame(b"trickle");
        let mut decoder = Decoder::default();
        for (i, byte) in bytes.iter().enumerate() {
            decoder.extend(std::slice::from_ref(byte));
            let result = decoder.decode().unwrap();
            if i + 1 < bytes.len() {
                assert!(result.is_none(), "frame completed early at byte {i}");
            } else {
                let decoded = result.expect("frame should be complete");
                assert_eq!(&decoded.payload[..], b"trickle");
            }
        }
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_several_frames_in_one_chunk() {
        let mut bytes = frame(b"one");
        bytes.extend_from_slice(&frame(b"two"));
        bytes.extend_from_slice(&frame(b"three")[..10]);

        let mut decoder = Decoder::default();
        decoder.extend(&bytes);
        assert_eq!(&decoder.decode().unwrap().unwrap().payload[..], b"one");
        assert_eq!(&decoder.decode().unwrap().unwrap().payload[..], b"two");
        assert!(decoder.decode().unwrap().is_none());
        assert_eq!(decoder.buffered(), 10);
    }

    #[test]
    fn test_oversized_length_is_rejected_before_body_arrives() {
        let codec = FrameCodec::new(&CodecConfig {
            max_frame_size: 1024,
            ..CodecConfig::default()
        });
        let mut decoder = Decoder::new(codec);
        decoder.extend(&4096u32.to_be_bytes());
        assert!(matches!(
            decoder.decode(),
            Err(DecodeError::FrameTooLarge {
                size: 4096,
                max: 1024
            })
        ));
    }

    #[test]
    fn test_corrupted_frame_is_fatal_error() {
        let mut bytes = frame(b"payload");
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let mut decoder = Decoder::default();
        decoder.extend(&bytes);
        let err = decoder.decode().unwrap_err();
        assert!(matches!(err, DecodeError::ChecksumMismatch { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let mut decoder = Decoder::default();
        decoder.extend(&frame(b"x")[..7]);
        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
        decoder.extend(&frame(b"y"));
        assert_eq!(&decoder.decode().unwrap().unwrap().payload[..], b"y");
    }
}
