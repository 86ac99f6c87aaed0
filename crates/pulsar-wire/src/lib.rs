//! # pulsar-wire
//!
//! Binary frame codec for the Pulsar pub/sub wire protocol: the CRC-32C
//! checksum, the buffer writers frames are assembled in, and frame
//! encode/decode.
//!
//! The crate does no networking of its own beyond the small stream helpers in
//! [`protocol::io`]; connection handling belongs to the caller.
//!
//! # Architecture overview (for beginners)
//!
//! A Pulsar client and broker exchange *frames*.  A frame that carries a
//! message looks like this on the wire:
//!
//! ```text
//! [total_len][cmd_len][command][0x0E 0x01][crc32c][meta_len][metadata][payload]
//! ```
//!
//! The command says what to do (send, deliver, acknowledge...), the metadata
//! describes the message, and the payload is the message body, which the codec
//! never interprets.  The checksum protects metadata and payload so a broker
//! can detect corruption without understanding either.
//!
//! This crate is split into:
//!
//! - **`checksum`** – CRC-32C (Castagnoli), table driven, one-shot or
//!   incremental.
//!
//! - **`buffer`** – The [`buffer::BufferWriter`] sink contract (reserve, fill,
//!   commit) and its implementations over a growable `Vec<u8>` or a fixed
//!   caller-provided slice.
//!
//! - **`pool`** – Reusable scratch buffers for writing frames to streams.
//!
//! - **`protocol`** – The records ([`BaseCommand`], [`MessageMetadata`]), the
//!   [`FrameCodec`] that lays them out with length prefixes, magic marker and
//!   checksum, and an incremental [`FrameDecoder`] for socket reads.
//!
//! - **`config`** / **`error`** – TOML-loadable settings and the error enums.

pub mod buffer;
pub mod checksum;
pub mod config;
pub mod error;
pub mod pool;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pulsar_wire::FrameCodec` instead of `pulsar_wire::protocol::codec::FrameCodec`.
pub use buffer::{BufferWriter, PatchableWriter, SliceWriter, VecWriter};
pub use checksum::{crc32c, Crc32c};
pub use config::{CodecConfig, PoolConfig};
pub use error::{ConfigError, DecodeError, EncodeError};
pub use pool::{BufferPool, PooledBuffer};
pub use protocol::codec::{decode_frame, encode_frame, DecodedFrame, FrameCodec, RawFrame};
pub use protocol::decoder::FrameDecoder;
pub use protocol::messages::{BaseCommand, MessageMetadata};
pub use protocol::record::{BincodeRecord, WireRecord};
