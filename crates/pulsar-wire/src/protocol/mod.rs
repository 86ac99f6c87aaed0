//! Protocol module containing the record types, the frame codec, and stream
//! helpers.

pub mod codec;
pub mod decoder;
pub mod io;
pub mod messages;
pub mod record;

pub use codec::{decode_frame, encode_frame, DecodedFrame, FrameCodec, FrameSizes, RawFrame};
pub use decoder::FrameDecoder;
pub use messages::*;
pub use record::{BincodeRecord, WireRecord};
