//! Command codec adapter
//!
//! Command and data messages are a flat sequence of AMF0 values whose
//! positions are fixed by the protocol. `CommandReader` walks that sequence
//! one typed read at a time; `encode_command` writes a named command with
//! its ordered arguments.

use bytes::{Buf, Bytes};

use super::amf0::{self, Amf0Decoder};
use super::value::AmfValue;
use crate::error::AmfError;

/// Typed cursor over an AMF0 payload
pub struct CommandReader {
    buf: Bytes,
    decoder: Amf0Decoder,
}

impl CommandReader {
    /// Reader over a plain AMF0 payload
    pub fn new(payload: Bytes) -> Self {
        Self {
            buf: payload,
            decoder: Amf0Decoder::new(),
        }
    }

    /// Reader over an AMF3-typed message (type 15/17)
    ///
    /// Those payloads carry AMF0 values behind a single leading format byte.
    pub fn with_amf3_prefix(mut payload: Bytes) -> Self {
        if payload.has_remaining() {
            payload.advance(1);
        }
        Self::new(payload)
    }

    /// Whether any values remain
    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    /// Next value of any type
    pub fn read_value(&mut self) -> Result<AmfValue, AmfError> {
        self.decoder.decode(&mut self.buf)
    }

    pub fn read_string(&mut self) -> Result<String, AmfError> {
        self.read_value()?.expect_string()
    }

    pub fn read_number(&mut self) -> Result<f64, AmfError> {
        self.read_value()?.expect_number()
    }

    pub fn read_bool(&mut self) -> Result<bool, AmfError> {
        self.read_value()?.expect_bool()
    }

    pub fn read_null(&mut self) -> Result<(), AmfError> {
        self.read_value()?.expect_null()
    }

    /// Object or ECMA array
    pub fn read_object(&mut self) -> Result<AmfValue, AmfError> {
        self.read_value()?.expect_object()
    }
}

/// Encode `name, args...` into a command/data payload
pub fn encode_command(name: &str, args: &[AmfValue]) -> Bytes {
    let mut values = Vec::with_capacity(args.len() + 1);
    values.push(AmfValue::from(name));
    values.extend_from_slice(args);
    amf0::encode_all(&values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_reads_in_order() {
        let payload = encode_command(
            "pause",
            &[AmfValue::Number(4.0), AmfValue::Null, AmfValue::Boolean(true)],
        );
        let mut reader = CommandReader::new(payload);

        assert_eq!(reader.read_string().unwrap(), "pause");
        assert_eq!(reader.read_number().unwrap(), 4.0);
        reader.read_null().unwrap();
        assert!(reader.read_bool().unwrap());
        assert!(!reader.has_remaining());
        assert_eq!(reader.read_value(), Err(AmfError::UnexpectedEof));
    }

    #[test]
    fn test_type_mismatch() {
        let payload = encode_command("seek", &[AmfValue::from("not a number")]);
        let mut reader = CommandReader::new(payload);
        reader.read_string().unwrap();

        assert_eq!(
            reader.read_number(),
            Err(AmfError::TypeMismatch {
                expected: "number",
                found: "string"
            })
        );
    }

    #[test]
    fn test_amf3_prefix_skipped() {
        let body = encode_command("play", &[AmfValue::Number(0.0)]);
        let mut prefixed = vec![0x00];
        prefixed.extend_from_slice(&body);

        let mut reader = CommandReader::with_amf3_prefix(Bytes::from(prefixed));
        assert_eq!(reader.read_string().unwrap(), "play");
        assert_eq!(reader.read_number().unwrap(), 0.0);
    }

    #[test]
    fn test_read_object_accepts_ecma_array() {
        let payload = encode_command(
            "@setDataFrame",
            &[AmfValue::EcmaArray(Default::default())],
        );
        let mut reader = CommandReader::new(payload);
        reader.read_string().unwrap();
        assert!(reader.read_object().is_ok());
    }
}
