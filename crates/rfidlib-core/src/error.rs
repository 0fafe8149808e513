//! Error types for rfidlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! caller-usage errors are all captured here.

use std::fmt;

/// Category of a device-reported fault code.
///
/// The embedded module reports faults as 16-bit codes; each code falls into
/// one of these buckets, which callers use to decide between retrying,
/// surfacing, or abandoning a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCategory {
    /// The module is in an unrecoverable state (reboot required).
    Fatal,
    /// The host sent something the module could not parse or accept.
    Protocol,
    /// A tag-level failure (no tag, write failed, bad password, ...).
    Tag,
    /// An RF/hardware failure (antenna missing, over-temperature, ...).
    Hardware,
    /// The module's firmware does not implement the requested operation.
    Unsupported,
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultCategory::Fatal => "fatal",
            FaultCategory::Protocol => "protocol",
            FaultCategory::Tag => "tag",
            FaultCategory::Hardware => "hardware",
            FaultCategory::Unsupported => "unsupported",
        };
        write!(f, "{s}")
    }
}

/// A fault reported by the reader device itself.
///
/// The numeric code is preserved exactly as received so callers can match
/// on specific firmware faults (e.g. tag-ID-buffer-full during continuous
/// reads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderCodeError {
    /// The 16-bit fault code from the response frame.
    pub code: u16,
    /// The category the code falls into.
    pub category: FaultCategory,
}

impl fmt::Display for ReaderCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device fault 0x{:04X} ({})", self.code, self.category)
    }
}

/// The error type for all rfidlib operations.
///
/// Variants cover the full range of failure modes encountered when driving
/// an RFID reader: physical transport failures, frame-level corruption,
/// device-reported faults, response-shape surprises, and caller mistakes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// Timed out waiting for bytes from the reader.
    ///
    /// This typically indicates the reader is powered off, the baud rate
    /// is wrong, or the device node points at something else entirely.
    #[error("timeout waiting for response")]
    Timeout,

    /// No connection to the reader has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the reader was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A received frame failed its CRC check.
    #[error("CRC mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    CrcMismatch {
        /// CRC computed over the received opcode and payload.
        expected: u16,
        /// CRC carried in the frame trailer.
        actual: u16,
    },

    /// The byte stream did not contain a well-formed frame.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A response frame decoded cleanly but its payload did not have the
    /// shape the opcode promises.
    #[error("response parse error: {0}")]
    Parse(String),

    /// The device reported a fault code.
    #[error("{0}")]
    Code(ReaderCodeError),

    /// The named parameter does not exist (or failed its capability probe).
    #[error("no parameter named '{0}'")]
    UnknownParameter(String),

    /// An attempt to set a read-only parameter.
    #[error("parameter '{0}' is read-only")]
    ReadOnly(String),

    /// A parameter value of the wrong type was supplied.
    #[error("wrong type {actual} for parameter '{param}' (expected {expected})")]
    TypeMismatch {
        /// The parameter being set.
        param: String,
        /// The type the parameter is declared with.
        expected: String,
        /// The type of the supplied value.
        actual: String,
    },

    /// An argument was rejected before any bytes were transmitted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The reader URI could not be parsed or names an unknown scheme.
    #[error("invalid reader URI: {0}")]
    InvalidUri(String),

    /// The requested operation is not supported by this reader variant.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Cooperative cancellation during background operations.
    ///
    /// Never surfaced to listeners or callers; background workers swallow
    /// it on their way out.
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    /// Returns the device fault code if this is a device-reported fault.
    pub fn fault_code(&self) -> Option<u16> {
        match self {
            Error::Code(c) => Some(c.code),
            _ => None,
        }
    }

    /// Returns `true` if this error marks the connection as unusable.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self, Error::ConnectionLost | Error::Io(_))
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_crc_mismatch() {
        let e = Error::CrcMismatch {
            expected: 0x1D0C,
            actual: 0x1D0D,
        };
        assert_eq!(e.to_string(), "CRC mismatch: expected 0x1D0C, got 0x1D0D");
    }

    #[test]
    fn error_display_code() {
        let e = Error::Code(ReaderCodeError {
            code: 0x0400,
            category: FaultCategory::Tag,
        });
        assert_eq!(e.to_string(), "device fault 0x0400 (tag)");
        assert_eq!(e.fault_code(), Some(0x0400));
    }

    #[test]
    fn error_display_unknown_parameter() {
        let e = Error::UnknownParameter("/reader/nope".into());
        assert_eq!(e.to_string(), "no parameter named '/reader/nope'");
    }

    #[test]
    fn error_display_type_mismatch() {
        let e = Error::TypeMismatch {
            param: "/reader/commandTimeout".into(),
            expected: "Int".into(),
            actual: "String".into(),
        };
        assert_eq!(
            e.to_string(),
            "wrong type String for parameter '/reader/commandTimeout' (expected Int)"
        );
    }

    #[test]
    fn fatal_to_connection() {
        assert!(Error::ConnectionLost.is_fatal_to_connection());
        assert!(!Error::Timeout.is_fatal_to_connection());
        assert!(!Error::NotConnected.is_fatal_to_connection());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
