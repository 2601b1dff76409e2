//! AMF0 encoder and decoder
//!
//! Only the subset that RTMP command and data messages use in practice.
//!
//! Type Markers:
//! ```text
//! 0x00 - Number (IEEE 754 double)
//! 0x01 - Boolean
//! 0x02 - String (UTF-8, 16-bit length prefix)
//! 0x03 - Object (key-value pairs until 0x000009)
//! 0x05 - Null
//! 0x06 - Undefined
//! 0x07 - Reference (16-bit index)
//! 0x08 - ECMA Array (32-bit count hint + key-value pairs)
//! 0x0A - Strict Array (dense array)
//! 0x0B - Date (double + timezone)
//! 0x0C - Long String (UTF-8, 32-bit length prefix)
//! 0x0D - Unsupported
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;

use super::value::AmfValue;
use crate::error::AmfError;

const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_REFERENCE: u8 = 0x07;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;
const MARKER_UNSUPPORTED: u8 = 0x0D;

const MAX_NESTING_DEPTH: usize = 64;

/// AMF0 decoder
///
/// Keeps the reference table for a single message; create one per payload.
#[derive(Default)]
pub struct Amf0Decoder {
    references: Vec<AmfValue>,
    depth: usize,
}

impl Amf0Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a single value, advancing `buf`
    pub fn decode(&mut self, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        if !buf.has_remaining() {
            return Err(AmfError::UnexpectedEof);
        }

        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(AmfError::NestingTooDeep);
        }

        let marker = buf.get_u8();
        let result = self.decode_value(marker, buf);
        self.depth -= 1;
        result
    }

    fn decode_value(&mut self, marker: u8, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        match marker {
            MARKER_NUMBER => Ok(AmfValue::Number(read_f64(buf)?)),
            MARKER_BOOLEAN => {
                ensure(buf, 1)?;
                Ok(AmfValue::Boolean(buf.get_u8() != 0))
            }
            MARKER_STRING => Ok(AmfValue::String(read_utf8(buf)?)),
            MARKER_LONG_STRING => Ok(AmfValue::String(read_utf8_long(buf)?)),
            MARKER_OBJECT => {
                let index = self.references.len();
                self.references.push(AmfValue::Null);
                let props = self.decode_properties(buf)?;
                let value = AmfValue::Object(props);
                self.references[index] = value.clone();
                Ok(value)
            }
            MARKER_ECMA_ARRAY => {
                // Count is only a hint; the terminator decides
                ensure(buf, 4)?;
                buf.advance(4);
                let index = self.references.len();
                self.references.push(AmfValue::Null);
                let props = self.decode_properties(buf)?;
                let value = AmfValue::EcmaArray(props);
                self.references[index] = value.clone();
                Ok(value)
            }
            MARKER_STRICT_ARRAY => {
                ensure(buf, 4)?;
                let count = buf.get_u32() as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.decode(buf)?);
                }
                Ok(AmfValue::Array(items))
            }
            MARKER_DATE => {
                let millis = read_f64(buf)?;
                ensure(buf, 2)?;
                buf.advance(2); // timezone, always zero
                Ok(AmfValue::Date(millis))
            }
            MARKER_REFERENCE => {
                ensure(buf, 2)?;
                let idx = buf.get_u16();
                self.references
                    .get(idx as usize)
                    .cloned()
                    .ok_or(AmfError::InvalidReference(idx))
            }
            MARKER_NULL => Ok(AmfValue::Null),
            MARKER_UNDEFINED | MARKER_UNSUPPORTED => Ok(AmfValue::Undefined),
            other => Err(AmfError::UnknownMarker(other)),
        }
    }

    fn decode_properties(
        &mut self,
        buf: &mut Bytes,
    ) -> Result<HashMap<String, AmfValue>, AmfError> {
        let mut props = HashMap::new();
        loop {
            let key = read_utf8(buf)?;
            if key.is_empty() {
                // Some encoders drop the end marker at the end of the payload
                if buf.has_remaining() && buf.chunk()[0] == MARKER_OBJECT_END {
                    buf.advance(1);
                }
                return Ok(props);
            }
            let value = self.decode(buf)?;
            props.insert(key, value);
        }
    }
}

fn ensure(buf: &Bytes, n: usize) -> Result<(), AmfError> {
    if buf.remaining() < n {
        Err(AmfError::UnexpectedEof)
    } else {
        Ok(())
    }
}

fn read_f64(buf: &mut Bytes) -> Result<f64, AmfError> {
    ensure(buf, 8)?;
    Ok(buf.get_f64())
}

fn read_utf8(buf: &mut Bytes) -> Result<String, AmfError> {
    ensure(buf, 2)?;
    let len = buf.get_u16() as usize;
    read_str_bytes(buf, len)
}

fn read_utf8_long(buf: &mut Bytes) -> Result<String, AmfError> {
    ensure(buf, 4)?;
    let len = buf.get_u32() as usize;
    read_str_bytes(buf, len)
}

fn read_str_bytes(buf: &mut Bytes, len: usize) -> Result<String, AmfError> {
    ensure(buf, len)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

/// AMF0 encoder
#[derive(Default)]
pub struct Amf0Encoder {
    buf: BytesMut,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the encoded bytes, leaving the encoder empty
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn encode(&mut self, value: &AmfValue) {
        match value {
            AmfValue::Null => self.buf.put_u8(MARKER_NULL),
            AmfValue::Undefined => self.buf.put_u8(MARKER_UNDEFINED),
            AmfValue::Boolean(b) => {
                self.buf.put_u8(MARKER_BOOLEAN);
                self.buf.put_u8(u8::from(*b));
            }
            AmfValue::Number(n) => {
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*n);
            }
            AmfValue::String(s) => {
                if s.len() > u16::MAX as usize {
                    self.buf.put_u8(MARKER_LONG_STRING);
                    self.buf.put_u32(s.len() as u32);
                    self.buf.put_slice(s.as_bytes());
                } else {
                    self.buf.put_u8(MARKER_STRING);
                    self.write_utf8(s);
                }
            }
            AmfValue::Object(props) => {
                self.buf.put_u8(MARKER_OBJECT);
                self.write_properties(props);
            }
            AmfValue::EcmaArray(props) => {
                self.buf.put_u8(MARKER_ECMA_ARRAY);
                self.buf.put_u32(props.len() as u32);
                self.write_properties(props);
            }
            AmfValue::Array(items) => {
                self.buf.put_u8(MARKER_STRICT_ARRAY);
                self.buf.put_u32(items.len() as u32);
                for item in items {
                    self.encode(item);
                }
            }
            AmfValue::Date(millis) => {
                self.buf.put_u8(MARKER_DATE);
                self.buf.put_f64(*millis);
                self.buf.put_i16(0);
            }
        }
    }

    fn write_properties(&mut self, props: &HashMap<String, AmfValue>) {
        for (key, value) in props {
            self.write_utf8(key);
            self.encode(value);
        }
        self.buf.put_u16(0);
        self.buf.put_u8(MARKER_OBJECT_END);
    }

    fn write_utf8(&mut self, s: &str) {
        let len = s.len().min(u16::MAX as usize);
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&s.as_bytes()[..len]);
    }
}

/// Encode a sequence of values into one payload
pub fn encode_all(values: &[AmfValue]) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    for value in values {
        encoder.encode(value);
    }
    encoder.finish()
}

/// Decode every value in a payload
pub fn decode_all(data: Bytes) -> Result<Vec<AmfValue>, AmfError> {
    let mut buf = data;
    let mut decoder = Amf0Decoder::new();
    let mut values = Vec::new();
    while buf.has_remaining() {
        values.push(decoder.decode(&mut buf)?);
    }
    Ok(values)
}
