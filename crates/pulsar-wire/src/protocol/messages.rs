//! Command and metadata records carried inside frames.
//!
//! A frame holds exactly one [`BaseCommand`].  Commands that carry a message
//! (`Send` from a producer, `Message` to a consumer) are followed by a
//! [`MessageMetadata`] record and the opaque payload.  Both records are
//! serialized with bincode through the [`BincodeRecord`] marker; the frame
//! codec only measures and copies them.

use serde::{Deserialize, Serialize};

use crate::protocol::record::BincodeRecord;

// ── Command type codes ────────────────────────────────────────────────────────

/// Numeric command type, matching the protocol's `BaseCommand.Type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    Connect = 2,
    Connected = 3,
    Subscribe = 4,
    Producer = 5,
    Send = 6,
    SendReceipt = 7,
    SendError = 8,
    Message = 9,
    Ack = 10,
    Flow = 11,
    Success = 13,
    Error = 14,
    CloseProducer = 15,
    CloseConsumer = 16,
    ProducerSuccess = 17,
    Ping = 18,
    Pong = 19,
}

impl TryFrom<u8> for CommandType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            2 => Ok(CommandType::Connect),
            3 => Ok(CommandType::Connected),
            4 => Ok(CommandType::Subscribe),
            5 => Ok(CommandType::Producer),
            6 => Ok(CommandType::Send),
            7 => Ok(CommandType::SendReceipt),
            8 => Ok(CommandType::SendError),
            9 => Ok(CommandType::Message),
            10 => Ok(CommandType::Ack),
            11 => Ok(CommandType::Flow),
            13 => Ok(CommandType::Success),
            14 => Ok(CommandType::Error),
            15 => Ok(CommandType::CloseProducer),
            16 => Ok(CommandType::CloseConsumer),
            17 => Ok(CommandType::ProducerSuccess),
            18 => Ok(CommandType::Ping),
            19 => Ok(CommandType::Pong),
            _ => Err(()),
        }
    }
}

// ── Shared field types ────────────────────────────────────────────────────────

/// Position of a message in a topic's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MessageIdData {
    pub ledger_id: u64,
    pub entry_id: u64,
    /// Partition index, `-1` for non-partitioned topics.
    pub partition: i32,
    /// Index inside a batch, `-1` when the message was not batched.
    pub batch_index: i32,
}

/// Error codes a broker can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerError {
    UnknownError,
    MetadataError,
    PersistenceError,
    AuthenticationError,
    AuthorizationError,
    ConsumerBusy,
    ServiceNotReady,
    ProducerBlockedQuotaExceeded,
    ChecksumError,
    TopicNotFound,
}

/// Subscription mode requested by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubType {
    Exclusive,
    Shared,
    Failover,
    KeyShared,
}

/// Individual or cumulative acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckType {
    Individual,
    Cumulative,
}

/// Compression applied to the payload upstream of the codec.
///
/// The codec never compresses or decompresses; it only carries this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressionType {
    #[default]
    None,
    Lz4,
    Zlib,
    Zstd,
    Snappy,
}

/// A user-defined message property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

// ── Per-command payload structs ───────────────────────────────────────────────

/// CONNECT: first command sent by a client on a new connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConnect {
    pub client_version: String,
    pub protocol_version: i32,
    pub auth_method_name: Option<String>,
}

/// CONNECTED: broker accepts the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConnected {
    pub server_version: String,
    pub protocol_version: i32,
    pub max_message_size: Option<i32>,
}

/// PRODUCER: register a producer on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandProducer {
    pub topic: String,
    pub producer_id: u64,
    pub request_id: u64,
    pub producer_name: Option<String>,
}

/// PRODUCER_SUCCESS: producer registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandProducerSuccess {
    pub request_id: u64,
    pub producer_name: String,
    /// Highest sequence id already persisted for this producer name, or `-1`.
    pub last_sequence_id: i64,
}

/// SEND: publish a message (followed by metadata and payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSend {
    pub producer_id: u64,
    pub sequence_id: u64,
    /// Number of messages packed into the payload (greater than 1 for batches).
    pub num_messages: i32,
}

/// SEND_RECEIPT: broker persisted a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSendReceipt {
    pub producer_id: u64,
    pub sequence_id: u64,
    pub message_id: MessageIdData,
}

/// SEND_ERROR: broker failed to persist a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSendError {
    pub producer_id: u64,
    pub sequence_id: u64,
    pub error: ServerError,
    pub message: String,
}

/// SUBSCRIBE: attach a consumer to a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSubscribe {
    pub topic: String,
    pub subscription: String,
    pub sub_type: SubType,
    pub consumer_id: u64,
    pub request_id: u64,
    pub consumer_name: Option<String>,
}

/// FLOW: grant the broker permits to push more messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFlow {
    pub consumer_id: u64,
    pub message_permits: u32,
}

/// MESSAGE: broker delivers a message (followed by metadata and payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub consumer_id: u64,
    pub message_id: MessageIdData,
    pub redelivery_count: u32,
}

/// ACK: acknowledge one or more messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub consumer_id: u64,
    pub ack_type: AckType,
    pub message_ids: Vec<MessageIdData>,
}

/// ERROR: a request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub request_id: u64,
    pub error: ServerError,
    pub message: String,
}

// ── Top-level command ─────────────────────────────────────────────────────────

/// The command descriptor at the front of every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseCommand {
    Connect(CommandConnect),
    Connected(CommandConnected),
    Subscribe(CommandSubscribe),
    Producer(CommandProducer),
    Send(CommandSend),
    SendReceipt(CommandSendReceipt),
    SendError(CommandSendError),
    Message(CommandMessage),
    Ack(CommandAck),
    Flow(CommandFlow),
    Success { request_id: u64 },
    Error(CommandError),
    CloseProducer { producer_id: u64, request_id: u64 },
    CloseConsumer { consumer_id: u64, request_id: u64 },
    ProducerSuccess(CommandProducerSuccess),
    Ping,
    Pong,
}

impl BaseCommand {
    /// Returns the [`CommandType`] code for this command.
    pub fn command_type(&self) -> CommandType {
        match self {
            BaseCommand::Connect(_) => CommandType::Connect,
            BaseCommand::Connected(_) => CommandType::Connected,
            BaseCommand::Subscribe(_) => CommandType::Subscribe,
            BaseCommand::Producer(_) => CommandType::Producer,
            BaseCommand::Send(_) => CommandType::Send,
            BaseCommand::SendReceipt(_) => CommandType::SendReceipt,
            BaseCommand::SendError(_) => CommandType::SendError,
            BaseCommand::Message(_) => CommandType::Message,
            BaseCommand::Ack(_) => CommandType::Ack,
            BaseCommand::Flow(_) => CommandType::Flow,
            BaseCommand::Success { .. } => CommandType::Success,
            BaseCommand::Error(_) => CommandType::Error,
            BaseCommand::CloseProducer { .. } => CommandType::CloseProducer,
            BaseCommand::CloseConsumer { .. } => CommandType::CloseConsumer,
            BaseCommand::ProducerSuccess(_) => CommandType::ProducerSuccess,
            BaseCommand::Ping => CommandType::Ping,
            BaseCommand::Pong => CommandType::Pong,
        }
    }

    /// Returns `true` for commands that are followed by metadata and a payload.
    pub fn carries_payload(&self) -> bool {
        matches!(self, BaseCommand::Send(_) | BaseCommand::Message(_))
    }
}

impl BincodeRecord for BaseCommand {}

// ── Message metadata ──────────────────────────────────────────────────────────

/// Per-message metadata that precedes the payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub producer_name: String,
    pub sequence_id: u64,
    /// Milliseconds since the Unix epoch at publish time.
    pub publish_time: u64,
    pub properties: Vec<KeyValue>,
    pub partition_key: Option<String>,
    pub compression: CompressionType,
    /// Payload size before compression; equals the payload length when
    /// `compression` is [`CompressionType::None`].
    pub uncompressed_size: u32,
    pub num_messages_in_batch: Option<i32>,
    /// Application-defined event time in milliseconds, `0` when unset.
    pub event_time: u64,
    pub ordering_key: Option<Vec<u8>>,
}

impl MessageMetadata {
    /// Creates metadata with the three fields every message must carry.
    pub fn new(producer_name: impl Into<String>, sequence_id: u64, publish_time: u64) -> Self {
        Self {
            producer_name: producer_name.into(),
            sequence_id,
            publish_time,
            ..Self::default()
        }
    }

    /// Appends a property and returns `self` for chaining.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(KeyValue {
            key: key.into(),
            value: value.into(),
        });
        self
    }
}

impl BincodeRecord for MessageMetadata {}
