//! Error types for frame encoding, frame decoding, and codec configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while encoding a frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The sink cannot provide the requested writable region.
    #[error("out of capacity: requested {requested} bytes, {available} available")]
    OutOfCapacity { requested: usize, available: usize },

    /// An internal contract was broken (measured length differs from the bytes
    /// actually written, or a commit overran its reservation).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The frame would exceed the configured maximum size.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u32 },

    /// A command or metadata record could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Writing the finished frame to an I/O sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame structure is inconsistent (wrong magic marker, or an inner
    /// length that points past the end of the frame).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The CRC-32C stored in the frame does not match the recomputed value.
    #[error("checksum mismatch: frame says 0x{expected:08X}, computed 0x{actual:08X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Fewer bytes are available than the frame declares.
    #[error("truncated frame: need {needed} bytes, got {available}")]
    TruncatedFrame { needed: usize, available: usize },

    /// The declared frame length exceeds the configured maximum.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    /// The command or metadata bytes could not be deserialized.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Reading the frame from an I/O source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Returns `true` if the bytes received so far can never become a valid
    /// frame, so the connection layer should discard them.
    ///
    /// A [`DecodeError::TruncatedFrame`] is the only non-fatal case: more bytes
    /// may still arrive.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DecodeError::TruncatedFrame { .. })
    }
}

/// Errors raised while loading a [`crate::config::CodecConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value the codec cannot work with.
    #[error("invalid config: {0}")]
    Invalid(String),
}
