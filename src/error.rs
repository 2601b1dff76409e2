//! Error types
//!
//! Errors are split by layer: value decoding (`AmfError`), protocol
//! violations detected by the session (`ProtocolError`), and media bus
//! failures (`RegistryError`). All of them are fatal to the connection
//! that raised them.

use std::fmt;

pub use crate::registry::RegistryError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Command/data payload could not be decoded
    Amf(AmfError),
    /// Peer violated the command protocol
    Protocol(ProtocolError),
    /// Media bus operation failed
    Registry(RegistryError),
    /// Transport I/O failure
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Amf(e) => write!(f, "AMF error: {}", e),
            Error::Protocol(e) => write!(f, "protocol error: {}", e),
            Error::Registry(e) => write!(f, "registry error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Amf(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<AmfError> for Error {
    fn from(e: AmfError) -> Self {
        Error::Amf(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// AMF decoding errors
#[derive(Debug, Clone, PartialEq)]
pub enum AmfError {
    /// Ran out of bytes mid-value (or no value left to read)
    UnexpectedEof,
    /// Type marker this decoder does not understand
    UnknownMarker(u8),
    /// String bytes were not valid UTF-8
    InvalidUtf8,
    /// Object/array nesting exceeded the limit
    NestingTooDeep,
    /// Reference marker pointed outside the reference table
    InvalidReference(u16),
    /// A typed read found a different value type
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::UnexpectedEof => write!(f, "unexpected end of data"),
            AmfError::UnknownMarker(m) => write!(f, "unknown type marker 0x{:02x}", m),
            AmfError::InvalidUtf8 => write!(f, "invalid UTF-8 string"),
            AmfError::NestingTooDeep => write!(f, "nesting too deep"),
            AmfError::InvalidReference(idx) => write!(f, "invalid reference index {}", idx),
            AmfError::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for AmfError {}

/// Protocol violations; each one closes the connection
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Media or metadata sent by a session that is not publishing
    NotPublisher,
    /// `@setDataFrame` carried something other than `onMetaData`
    MetadataOnly(String),
    /// pause issued before playback started
    NotPlaying,
    /// play issued on a publishing session
    PublisherCannotPlay,
    /// Command message with no leading name
    MissingCommandName,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::NotPublisher => write!(f, "not a rtmp publisher"),
            ProtocolError::MetadataOnly(name) => {
                write!(f, "can only set metadata, got {}", name)
            }
            ProtocolError::NotPlaying => write!(f, "rtmp not started yet"),
            ProtocolError::PublisherCannotPlay => write!(f, "publisher can not play"),
            ProtocolError::MissingCommandName => write!(f, "command message without a name"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: Error = ProtocolError::NotPublisher.into();
        assert_eq!(err.to_string(), "protocol error: not a rtmp publisher");

        let err: Error = AmfError::TypeMismatch {
            expected: "string",
            found: "number",
        }
        .into();
        assert_eq!(err.to_string(), "AMF error: expected string, found number");
    }

    #[test]
    fn test_error_source() {
        use std::error::Error as _;

        let err: Error = AmfError::UnexpectedEof.into();
        assert!(err.source().is_some());
    }
}
