//! Walks a capture of concatenated frames and summarizes each one.

use pulsar_wire::protocol::messages::{BaseCommand, MessageMetadata};
use pulsar_wire::{DecodeError, FrameCodec, WireRecord};
use serde::Serialize;

/// One line of inspector output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    pub index: usize,
    /// Byte offset of the frame inside the capture.
    pub offset: usize,
    pub total_length: u32,
    pub command_len: usize,
    pub metadata_len: usize,
    pub payload_len: usize,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Numeric command type code as carried by the protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_code: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<u64>,
}

/// The first frame that could not be read, and why.
#[derive(Debug)]
pub struct ScanFailure {
    pub index: usize,
    pub offset: usize,
    pub error: DecodeError,
}

/// Result of scanning a capture.
#[derive(Debug, Default)]
pub struct Scan {
    pub frames: Vec<FrameSummary>,
    pub failure: Option<ScanFailure>,
}

/// Validates every frame in `capture`, stopping at the first error.
///
/// With `decode` set, the command and metadata records are deserialized as
/// well and their key fields added to the summary.
pub fn scan(codec: &FrameCodec, capture: &[u8], decode: bool) -> Scan {
    let mut result = Scan::default();
    let mut offset = 0;
    while offset < capture.len() {
        let index = result.frames.len();
        match summarize(codec, &capture[offset..], index, offset, decode) {
            Ok((summary, frame_len)) => {
                offset += frame_len;
                result.frames.push(summary);
            }
            Err(error) => {
                result.failure = Some(ScanFailure {
                    index,
                    offset,
                    error,
                });
                break;
            }
        }
    }
    result
}

fn summarize(
    codec: &FrameCodec,
    bytes: &[u8],
    index: usize,
    offset: usize,
    decode: bool,
) -> Result<(FrameSummary, usize), DecodeError> {
    let raw = codec.inspect(bytes)?;
    let mut summary = FrameSummary {
        index,
        offset,
        total_length: raw.total_length,
        command_len: raw.command.len(),
        metadata_len: raw.metadata.len(),
        payload_len: raw.payload.len(),
        checksum: format!("0x{:08X}", raw.checksum),
        command: None,
        command_code: None,
        producer_name: None,
        sequence_id: None,
    };
    if decode {
        let command = BaseCommand::decode_from(raw.command)?;
        let command_type = command.command_type();
        summary.command = Some(format!("{command_type:?}"));
        summary.command_code = Some(command_type as u8);
        if command.carries_payload() {
            let metadata = MessageMetadata::decode_from(raw.metadata)?;
            summary.producer_name = Some(metadata.producer_name);
            summary.sequence_id = Some(metadata.sequence_id);
        }
    }
    Ok((summary, raw.frame_length()))
}
