//! pulsar-wire inspector entry point.
//!
//! Reads a capture of concatenated Pulsar frames (for example the bytes a
//! producer wrote to a socket, dumped to a file) and validates every frame:
//! length fields, magic marker and CRC-32C.
//!
//! # Usage
//!
//! ```text
//! pulsar-wire-inspect frames <FILE> [--config <TOML>] [--max-frame-size <N>] [--decode] [--json]
//! pulsar-wire-inspect checksum <FILE>
//! ```
//!
//! `frames` exits with a non-zero status at the first frame that fails
//! validation.  Set `RUST_LOG=debug` (or `trace`) for codec-level detail.

mod scan;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pulsar_wire::{crc32c, CodecConfig, FrameCodec};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "pulsar-wire-inspect",
    about = "Validate and summarize captured Pulsar wire frames",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate every frame in a capture file and print one summary per frame.
    Frames {
        /// File holding concatenated frames.
        file: PathBuf,

        /// Codec settings in TOML.
        #[arg(long, env = "PULSAR_WIRE_CONFIG")]
        config: Option<PathBuf>,

        /// Overrides `max_frame_size` from the config file.
        #[arg(long, env = "PULSAR_WIRE_MAX_FRAME_SIZE")]
        max_frame_size: Option<u32>,

        /// Also deserialize the command and metadata records.
        #[arg(long, default_value_t = false)]
        decode: bool,

        /// Print summaries as JSON lines.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the CRC-32C of a file.
    Checksum {
        file: PathBuf,
    },
}

/// Builds the codec configuration from an optional file plus CLI overrides.
fn codec_config(path: Option<&Path>, max_frame_size: Option<u32>) -> anyhow::Result<CodecConfig> {
    let mut config = match path {
        Some(path) => CodecConfig::load(path)
            .with_context(|| format!("failed to load codec config from {}", path.display()))?,
        None => CodecConfig::default(),
    };
    if let Some(max) = max_frame_size {
        config.max_frame_size = max;
    }
    config.validate().context("invalid codec configuration")?;
    Ok(config)
}

// ── Subcommands ───────────────────────────────────────────────────────────────

async fn run_frames(file: &Path, config: &CodecConfig, decode: bool, json: bool) -> anyhow::Result<()> {
    let capture = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read capture {}", file.display()))?;
    let codec = FrameCodec::new(config);
    let result = scan::scan(&codec, &capture, decode);

    for frame in &result.frames {
        if json {
            println!("{}", serde_json::to_string(frame)?);
        } else {
            println!(
                "#{:<5} @{:<10} total={:<8} cmd={:<6} meta={:<6} payload={:<8} crc={}{}",
                frame.index,
                frame.offset,
                frame.total_length,
                frame.command_len,
                frame.metadata_len,
                frame.payload_len,
                frame.checksum,
                frame
                    .command
                    .as_deref()
                    .map(|c| format!(" {c}"))
                    .unwrap_or_default(),
            );
        }
    }

    if let Some(failure) = result.failure {
        error!(
            index = failure.index,
            offset = failure.offset,
            "frame failed validation: {}",
            failure.error
        );
        bail!(
            "frame #{} at offset {} is invalid: {}",
            failure.index,
            failure.offset,
            failure.error
        );
    }

    info!(frames = result.frames.len(), bytes = capture.len(), "capture is valid");
    Ok(())
}

async fn run_checksum(file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    println!("0x{:08X}  {}", crc32c(&bytes), file.display());
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` selects the level; fall back to `info`.  Logs go to stderr so
    // that stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Frames {
            file,
            config,
            max_frame_size,
            decode,
            json,
        } => {
            let config = codec_config(config.as_deref(), max_frame_size)?;
            run_frames(&file, &config, decode, json).await
        }
        Command::Checksum { file } => run_checksum(&file).await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
