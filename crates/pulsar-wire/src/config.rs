//! Codec configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.  Example:
//!
//! ```toml
//! max_frame_size = 5253120
//!
//! [pool]
//! max_pooled_buffers = 16
//! max_retained_capacity = 1048576
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::codec::MIN_TOTAL_LENGTH;

/// Default largest accepted total length: the broker's default 5 MiB maximum
/// message size plus 10 KiB for command and metadata.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 5 * 1024 * 1024 + 10 * 1024;

/// Settings for [`crate::protocol::codec::FrameCodec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Largest value accepted in (or produced for) the total length field.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: u32,
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Settings for [`crate::pool::BufferPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// How many idle buffers are kept for reuse.  `0` disables pooling.
    #[serde(default = "default_max_pooled_buffers")]
    pub max_pooled_buffers: usize,
    /// Buffers that grew beyond this capacity are freed instead of pooled.
    #[serde(default = "default_max_retained_capacity")]
    pub max_retained_capacity: usize,
}

fn default_max_frame_size() -> u32 {
    DEFAULT_MAX_FRAME_SIZE
}

fn default_max_pooled_buffers() -> usize {
    16
}

fn default_max_retained_capacity() -> usize {
    1024 * 1024
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pooled_buffers: default_max_pooled_buffers(),
            max_retained_capacity: default_max_retained_capacity(),
        }
    }
}

impl CodecConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`CodecConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that the settings describe a usable codec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (self.max_frame_size as usize) < MIN_TOTAL_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "max_frame_size must be at least {MIN_TOTAL_LENGTH}, got {}",
                self.max_frame_size
            )));
        }
        Ok(())
    }
}
