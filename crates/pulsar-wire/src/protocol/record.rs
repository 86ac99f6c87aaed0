//! The serializer contract the frame codec relies on.
//!
//! The codec never looks inside a command or metadata record.  It only needs
//! to know how many bytes a record will occupy *before* writing it (the length
//! prefixes come first on the wire), and then to have the record write itself
//! into the sink.  Measuring must be cheap and must agree exactly with the
//! bytes written; the codec checks this on every encode.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

use crate::buffer::{BufferWriter, RecordWriter};
use crate::error::{DecodeError, EncodeError};

/// A structured record that can be measured, written into a sink, and read
/// back from its exact serialized bytes.
pub trait WireRecord: Sized {
    /// Serialized length in bytes, computed without producing the bytes.
    fn encoded_len(&self) -> Result<usize, EncodeError>;

    /// Writes the serialized record into `out`.
    fn encode_into<W: BufferWriter + ?Sized>(&self, out: &mut W) -> Result<(), EncodeError>;

    /// Parses a record that occupies all of `bytes`.
    fn decode_from(bytes: &[u8]) -> Result<Self, DecodeError>;
}

/// Marker for serde types that are carried on the wire as bincode.
///
/// Implementing this (an empty impl) gives the type a [`WireRecord`]
/// implementation backed by `bincode::serialized_size` for the measure pass
/// and `bincode::Options::serialize_into` for the write pass.
pub trait BincodeRecord: Serialize + DeserializeOwned {}

/// Bincode settings shared by measuring, writing and reading.
///
/// Variable-length integers, little-endian, trailing bytes rejected.
fn options() -> impl Options {
    bincode::DefaultOptions::new()
}

impl<T: BincodeRecord> WireRecord for T {
    fn encoded_len(&self) -> Result<usize, EncodeError> {
        let size = options()
            .serialized_size(self)
            .map_err(|e| EncodeError::Serialization(e.to_string()))?;
        usize::try_from(size).map_err(|_| {
            EncodeError::Serialization(format!("record of {size} bytes does not fit in memory"))
        })
    }

    fn encode_into<W: BufferWriter + ?Sized>(&self, out: &mut W) -> Result<(), EncodeError> {
        let mut adapter = RecordWriter::new(out);
        match options().serialize_into(&mut adapter, self) {
            Ok(()) => Ok(()),
            // Prefer the sink's own error (e.g. OutOfCapacity) over the io wrapper.
            Err(e) => Err(adapter
                .take_error()
                .unwrap_or_else(|| EncodeError::Serialization(e.to_string()))),
        }
    }

    fn decode_from(bytes: &[u8]) -> Result<Self, DecodeError> {
        options()
            .with_limit(bytes.len() as u64)
            .deserialize(bytes)
            .map_err(|e| DecodeError::InvalidRecord(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{SliceWriter, VecWriter};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u64,
        name: String,
        tags: Vec<String>,
    }

    impl BincodeRecord for Sample {}

    fn sample() -> Sample {
        Sample {
            id: 300,
            name: "orders".to_string(),
            tags: vec!["a".to_string(), "bc".to_string()],
        }
    }

    #[test]
    fn test_measured_length_equals_written_length() {
        let record = sample();
        let mut sink = VecWriter::new();
        record.encode_into(&mut sink).unwrap();
        assert_eq!(record.encoded_len().unwrap(), sink.written());
    }

    #[test]
    fn test_decode_reads_back_written_record() {
        let record = sample();
        let mut sink = VecWriter::new();
        record.encode_into(&mut sink).unwrap();
        assert_eq!(Sample::decode_from(sink.as_slice()).unwrap(), record);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut sink = VecWriter::new();
        sample().encode_into(&mut sink).unwrap();
        let mut bytes = sink.into_inner();
        bytes.push(0);
        assert!(matches!(
            Sample::decode_from(&bytes),
            Err(DecodeError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_decode_rejects_short_input() {
        let mut sink = VecWriter::new();
        sample().encode_into(&mut sink).unwrap();
        let bytes = sink.into_inner();
        assert!(Sample::decode_from(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_encode_into_small_sink_surfaces_out_of_capacity() {
        let mut storage = [0u8; 3];
        let mut sink = SliceWriter::new(&mut storage);
        let err = sample().encode_into(&mut sink).unwrap_err();
        assert!(matches!(err, EncodeError::OutOfCapacity { .. }));
    }
}
