//! Integration tests for the pulsar-wire frame codec.
//!
//! These tests drive complete frames through the public API: every command
//! type, every encode strategy, the incremental decoder, and the corruption
//! cases a broker has to reject.

use bytes::Bytes;
use pulsar_wire::{
    crc32c, decode_frame, encode_frame,
    protocol::{
        io::{read_frame, write_frame},
        messages::{
            AckType, CommandAck, CommandConnect, CommandConnected, CommandError, CommandFlow,
            CommandMessage, CommandProducer, CommandProducerSuccess, CommandSend,
            CommandSendError, CommandSendReceipt, CommandSubscribe, CompressionType,
            MessageIdData, ServerError, SubType,
        },
    },
    BaseCommand, CodecConfig, DecodeError, DecodedFrame, EncodeError, FrameCodec, FrameDecoder,
    MessageMetadata, SliceWriter, VecWriter,
};

type Frame = DecodedFrame<BaseCommand, MessageMetadata>;

/// Encodes a frame and then decodes it, asserting that every byte was
/// consumed and the records survived unchanged.
fn roundtrip(command: BaseCommand, metadata: MessageMetadata, payload: &[u8]) -> Frame {
    let bytes = encode_frame(&command, &metadata, payload).expect("encode must succeed");
    let (decoded, consumed): (Frame, usize) = decode_frame(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    assert_eq!(decoded.command, command);
    assert_eq!(decoded.metadata, metadata);
    assert_eq!(&decoded.payload[..], payload);
    decoded
}

fn message_id() -> MessageIdData {
    MessageIdData {
        ledger_id: 12,
        entry_id: 345,
        partition: -1,
        batch_index: -1,
    }
}

fn metadata() -> MessageMetadata {
    MessageMetadata {
        producer_name: "standalone-0-1".to_string(),
        sequence_id: 7,
        publish_time: 1_700_000_000_123,
        partition_key: Some("user-42".to_string()),
        compression: CompressionType::Lz4,
        uncompressed_size: 2048,
        num_messages_in_batch: Some(4),
        event_time: 1_700_000_000_000,
        ordering_key: Some(vec![1, 2, 3]),
        ..MessageMetadata::default()
    }
    .with_property("trace-id", "abc123")
    .with_property("source", "integration")
}

#[test]
fn test_roundtrip_send_with_payload() {
    roundtrip(
        BaseCommand::Send(CommandSend {
            producer_id: 1,
            sequence_id: 7,
            num_messages: 4,
        }),
        metadata(),
        b"hello from the producer",
    );
}

#[test]
fn test_roundtrip_message_delivery() {
    roundtrip(
        BaseCommand::Message(CommandMessage {
            consumer_id: 2,
            message_id: message_id(),
            redelivery_count: 0,
        }),
        metadata(),
        &[0u8, 255, 128, 1],
    );
}

#[test]
fn test_roundtrip_every_command_type() {
    let commands = vec![
        BaseCommand::Connect(CommandConnect {
            client_version: "pulsar-wire".to_string(),
            protocol_version: 6,
            auth_method_name: None,
        }),
        BaseCommand::Connected(CommandConnected {
            server_version: "Pulsar Server".to_string(),
            protocol_version: 6,
            max_message_size: Some(5 * 1024 * 1024),
        }),
        BaseCommand::Producer(CommandProducer {
            topic: "persistent://public/default/orders".to_string(),
            producer_id: 1,
            request_id: 10,
            producer_name: None,
        }),
        BaseCommand::ProducerSuccess(CommandProducerSuccess {
            request_id: 10,
            producer_name: "standalone-0-1".to_string(),
            last_sequence_id: -1,
        }),
        BaseCommand::SendReceipt(CommandSendReceipt {
            producer_id: 1,
            sequence_id: 7,
            message_id: message_id(),
        }),
        BaseCommand::SendError(CommandSendError {
            producer_id: 1,
            sequence_id: 8,
            error: ServerError::PersistenceError,
            message: "bookie unavailable".to_string(),
        }),
        BaseCommand::Subscribe(CommandSubscribe {
            topic: "persistent://public/default/orders".to_string(),
            subscription: "billing".to_string(),
            sub_type: SubType::Shared,
            consumer_id: 2,
            request_id: 11,
            consumer_name: Some("billing-1".to_string()),
        }),
        BaseCommand::Flow(CommandFlow {
            consumer_id: 2,
            message_permits: 1000,
        }),
        BaseCommand::Ack(CommandAck {
            consumer_id: 2,
            ack_type: AckType::Cumulative,
            message_ids: vec![message_id()],
        }),
        BaseCommand::Success { request_id: 11 },
        BaseCommand::Error(CommandError {
            request_id: 12,
            error: ServerError::TopicNotFound,
            message: "no such topic".to_string(),
        }),
        BaseCommand::CloseProducer {
            producer_id: 1,
            request_id: 13,
        },
        BaseCommand::CloseConsumer {
            consumer_id: 2,
            request_id: 14,
        },
        BaseCommand::Ping,
        BaseCommand::Pong,
    ];
    for command in commands {
        roundtrip(command, MessageMetadata::default(), b"");
    }
}

#[test]
fn test_roundtrip_one_mebibyte_payload() {
    let payload: Vec<u8> = (0..1024 * 1024).map(|i: u32| (i * 31 % 256) as u8).collect();
    let decoded = roundtrip(
        BaseCommand::Send(CommandSend {
            producer_id: 1,
            sequence_id: 0,
            num_messages: 1,
        }),
        metadata(),
        &payload,
    );
    assert_eq!(decoded.payload.len(), payload.len());
}

#[test]
fn test_all_encode_strategies_agree() {
    let codec = FrameCodec::default();
    let command = BaseCommand::Send(CommandSend {
        producer_id: 9,
        sequence_id: 1,
        num_messages: 1,
    });
    let payload = b"strategy";

    let reference = codec.encode_to_vec(&command, &metadata(), payload).unwrap();

    let bytes = codec.encode_to_bytes(&command, &metadata(), payload).unwrap();
    assert_eq!(&bytes[..], &reference[..]);

    let mut stream = Vec::new();
    codec
        .encode_to_writer(&command, &metadata(), payload, &mut stream)
        .unwrap();
    assert_eq!(stream, reference);

    let mut storage = vec![0u8; reference.len()];
    let mut slice = SliceWriter::new(&mut storage);
    codec.encode(&command, &metadata(), payload, &mut slice).unwrap();
    assert_eq!(storage, reference);

    let mut growable = VecWriter::new();
    codec.encode(&command, &metadata(), payload, &mut growable).unwrap();
    assert_eq!(growable.as_slice(), &reference[..]);
}

#[test]
fn test_stored_checksum_matches_checksummed_region() {
    let bytes = encode_frame(&BaseCommand::Ping, &metadata(), b"crc").unwrap();
    let raw = FrameCodec::default().inspect(&bytes).unwrap();
    let region_len = 4 + raw.metadata.len() + raw.payload.len();
    assert_eq!(raw.checksum, crc32c(&bytes[bytes.len() - region_len..]));
}

#[test]
fn test_every_bit_flip_in_checksummed_region_is_rejected() {
    let bytes = encode_frame(&BaseCommand::Ping, &metadata(), b"bit flips").unwrap();
    let raw = FrameCodec::default().inspect(&bytes).unwrap();
    let region_start = bytes.len() - (4 + raw.metadata.len() + raw.payload.len());
    for offset in region_start..bytes.len() {
        for bit in 0..8 {
            let mut corrupted = bytes.clone();
            corrupted[offset] ^= 1 << bit;
            let result: Result<(Frame, usize), _> = decode_frame(&corrupted);
            assert!(
                matches!(result, Err(DecodeError::ChecksumMismatch { .. })),
                "flip at {offset}:{bit} was not detected as a checksum mismatch"
            );
        }
    }
}

#[test]
fn test_truncation_at_every_length_is_rejected() {
    let bytes = encode_frame(&BaseCommand::Pong, &MessageMetadata::default(), b"xy").unwrap();
    for len in 0..bytes.len() {
        let result: Result<(Frame, usize), _> = decode_frame(&bytes[..len]);
        assert!(
            matches!(result, Err(DecodeError::TruncatedFrame { .. })),
            "prefix of {len} bytes was not reported as truncated"
        );
    }
}

#[test]
fn test_decoder_reassembles_arbitrary_chunking() {
    let mut wire = Vec::new();
    for i in 0..5u8 {
        let command = BaseCommand::Send(CommandSend {
            producer_id: 1,
            sequence_id: i as u64,
            num_messages: 1,
        });
        wire.extend(encode_frame(&command, &metadata(), &vec![i; i as usize * 10]).unwrap());
    }

    for chunk in [1, 3, 7, 64, wire.len()] {
        let mut decoder = FrameDecoder::<BaseCommand, MessageMetadata>::default();
        let mut frames = Vec::new();
        for piece in wire.chunks(chunk) {
            decoder.extend(piece);
            while let Some(frame) = decoder.decode().unwrap() {
                frames.push(frame);
            }
        }
        assert_eq!(frames.len(), 5, "chunk size {chunk}");
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.payload, Bytes::from(vec![i as u8; i * 10]));
        }
        assert_eq!(decoder.buffered(), 0);
    }
}

#[test]
fn test_configured_limit_applies_to_both_directions() {
    let config = CodecConfig::from_toml_str("max_frame_size = 128").unwrap();
    let small = FrameCodec::new(&config);
    let large = FrameCodec::default();
    let payload = [0u8; 200];

    let err = small
        .encode_to_vec(&BaseCommand::Ping, &MessageMetadata::default(), &payload)
        .unwrap_err();
    assert!(matches!(err, EncodeError::FrameTooLarge { max: 128, .. }));

    let bytes = large
        .encode_to_vec(&BaseCommand::Ping, &MessageMetadata::default(), &payload)
        .unwrap();
    let result: Result<(Frame, usize), _> = small.decode(&bytes);
    assert!(matches!(result, Err(DecodeError::FrameTooLarge { max: 128, .. })));
}

#[test]
fn test_stream_helpers_over_a_byte_pipe() {
    let codec = FrameCodec::default();
    let mut wire = Vec::new();
    for seq in 0..3u64 {
        let command = BaseCommand::Send(CommandSend {
            producer_id: 5,
            sequence_id: seq,
            num_messages: 1,
        });
        write_frame(&mut wire, &codec, &command, &metadata(), b"piped").unwrap();
    }

    let mut reader = std::io::Cursor::new(wire);
    let mut sequence_ids = Vec::new();
    while let Some(frame) = read_frame::<BaseCommand, MessageMetadata, _>(&mut reader, &codec).unwrap() {
        if let BaseCommand::Send(send) = frame.command {
            sequence_ids.push(send.sequence_id);
        }
    }
    assert_eq!(sequence_ids, vec![0, 1, 2]);
}
