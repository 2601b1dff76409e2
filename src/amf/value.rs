//! AMF value type
//!
//! Command arguments arrive as a loosely-typed value stream. `AmfValue` is
//! the tagged union every decoded argument lands in; typed reads go through
//! the `expect_*` accessors, which fail with `AmfError::TypeMismatch`
//! instead of converting implicitly.

use std::collections::HashMap;

use crate::error::AmfError;

/// Decoded AMF0 value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AmfValue {
    /// Null (0x05)
    #[default]
    Null,

    /// Undefined (0x06)
    Undefined,

    /// Boolean (0x01)
    Boolean(bool),

    /// IEEE 754 double (0x00)
    Number(f64),

    /// UTF-8 string (0x02 short, 0x0C long)
    String(String),

    /// Anonymous object (0x03)
    Object(HashMap<String, AmfValue>),

    /// Associative array (0x08), used by most encoders for onMetaData
    EcmaArray(HashMap<String, AmfValue>),

    /// Dense array (0x0A)
    Array(Vec<AmfValue>),

    /// Milliseconds since the Unix epoch (0x0B)
    Date(f64),
}

impl AmfValue {
    /// Empty anonymous object
    pub fn object() -> Self {
        AmfValue::Object(HashMap::new())
    }

    /// Builder-style property insert; no-op on non-object values
    pub fn with(mut self, key: &str, value: impl Into<AmfValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert a property; no-op on non-object values
    pub fn set(&mut self, key: &str, value: impl Into<AmfValue>) {
        if let Some(map) = self.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
    }

    /// Short name of the value's type, used in mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            AmfValue::Null => "null",
            AmfValue::Undefined => "undefined",
            AmfValue::Boolean(_) => "boolean",
            AmfValue::Number(_) => "number",
            AmfValue::String(_) => "string",
            AmfValue::Object(_) => "object",
            AmfValue::EcmaArray(_) => "ecma array",
            AmfValue::Array(_) => "array",
            AmfValue::Date(_) => "date",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Object view; ECMA arrays are accepted since encoders use both for key/value data
    pub fn as_object(&self) -> Option<&HashMap<String, AmfValue>> {
        match self {
            AmfValue::Object(m) | AmfValue::EcmaArray(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut HashMap<String, AmfValue>> {
        match self {
            AmfValue::Object(m) | AmfValue::EcmaArray(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, AmfValue::Null | AmfValue::Undefined)
    }

    /// Get a property from an object value
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        self.as_object()?.get(key)
    }

    /// Get a string property; missing or non-string yields `None`
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Get a number property; missing or non-number yields `None`
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_number()
    }

    pub fn expect_string(self) -> Result<String, AmfError> {
        match self {
            AmfValue::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }

    pub fn expect_number(&self) -> Result<f64, AmfError> {
        self.as_number().ok_or_else(|| mismatch("number", self))
    }

    pub fn expect_bool(&self) -> Result<bool, AmfError> {
        self.as_bool().ok_or_else(|| mismatch("boolean", self))
    }

    /// Accepts null or undefined
    pub fn expect_null(&self) -> Result<(), AmfError> {
        if self.is_null_or_undefined() {
            Ok(())
        } else {
            Err(mismatch("null", self))
        }
    }

    /// Accepts object or ECMA array
    pub fn expect_object(self) -> Result<AmfValue, AmfError> {
        if self.as_object().is_some() {
            Ok(self)
        } else {
            Err(mismatch("object", &self))
        }
    }
}

fn mismatch(expected: &'static str, found: &AmfValue) -> AmfError {
    AmfError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

impl From<bool> for AmfValue {
    fn from(v: bool) -> Self {
        AmfValue::Boolean(v)
    }
}

impl From<f64> for AmfValue {
    fn from(v: f64) -> Self {
        AmfValue::Number(v)
    }
}

impl From<u32> for AmfValue {
    fn from(v: u32) -> Self {
        AmfValue::Number(v as f64)
    }
}

impl From<String> for AmfValue {
    fn from(v: String) -> Self {
        AmfValue::String(v)
    }
}

impl From<&str> for AmfValue {
    fn from(v: &str) -> Self {
        AmfValue::String(v.to_string())
    }
}

impl From<HashMap<String, AmfValue>> for AmfValue {
    fn from(v: HashMap<String, AmfValue>) -> Self {
        AmfValue::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_builder() {
        let obj = AmfValue::object()
            .with("level", "status")
            .with("capabilities", 31.0);

        assert_eq!(obj.get_string("level"), Some("status"));
        assert_eq!(obj.get_number("capabilities"), Some(31.0));
        assert_eq!(obj.get_string("missing"), None);
    }

    #[test]
    fn test_set_on_non_object_is_noop() {
        let mut v = AmfValue::Number(1.0);
        v.set("key", "value");
        assert_eq!(v, AmfValue::Number(1.0));
    }

    #[test]
    fn test_expect_accessors() {
        assert_eq!(AmfValue::from("x").expect_string().unwrap(), "x");
        assert_eq!(AmfValue::Number(2.0).expect_number().unwrap(), 2.0);
        assert!(AmfValue::Boolean(true).expect_bool().unwrap());
        assert!(AmfValue::Undefined.expect_null().is_ok());

        assert_eq!(
            AmfValue::Number(1.0).expect_string(),
            Err(AmfError::TypeMismatch {
                expected: "string",
                found: "number"
            })
        );
        assert!(AmfValue::Null.expect_bool().is_err());
        assert!(AmfValue::String("0".into()).expect_number().is_err());
    }

    #[test]
    fn test_ecma_array_is_object() {
        let mut props = HashMap::new();
        props.insert("width".to_string(), AmfValue::Number(1280.0));
        let ecma = AmfValue::EcmaArray(props);

        assert_eq!(ecma.get_number("width"), Some(1280.0));
        assert!(ecma.expect_object().is_ok());
        assert!(AmfValue::Array(vec![]).expect_object().is_err());
    }
}
