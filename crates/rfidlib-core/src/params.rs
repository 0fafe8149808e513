//! Parameter names and the tagged parameter value union.
//!
//! Reader configuration is exposed as a registry of named parameters under
//! the `/reader/` namespace. Lookup is case-insensitive; the canonical
//! spelling is preserved for listing. Values are a closed union of the
//! shapes the registry actually stores -- the runtime type check on
//! `param_set` is a variant-tag comparison.

use std::fmt;

use crate::plan::ReadPlan;
use crate::tagop::Gen2Password;
use crate::types::{Region, TagProtocol};

/// Canonical parameter names.
pub mod names {
    /// Milliseconds each background read cycle spends reading.
    pub const READ_ASYNC_ON_TIME: &str = "/reader/read/asyncOnTime";
    /// Milliseconds each background read cycle sleeps after reading.
    pub const READ_ASYNC_OFF_TIME: &str = "/reader/read/asyncOffTime";
    /// The active read plan.
    pub const READ_PLAN: &str = "/reader/read/plan";
    /// Default Gen2 access password for tag operations.
    pub const GEN2_ACCESS_PASSWORD: &str = "/reader/gen2/accessPassword";
    /// The URI the reader was created from.
    pub const URI: &str = "/reader/uri";
    /// Per-transport-read timeout budget, milliseconds.
    pub const TRANSPORT_TIMEOUT: &str = "/reader/transportTimeout";
    /// End-to-end command deadline, milliseconds.
    pub const COMMAND_TIMEOUT: &str = "/reader/commandTimeout";
    /// Regulatory region the reader operates under.
    pub const REGION_ID: &str = "/reader/region/id";
    /// Antenna ports the reader reports as present.
    pub const ANTENNA_PORT_LIST: &str = "/reader/antenna/portList";
    /// Application firmware version.
    pub const VERSION_SOFTWARE: &str = "/reader/version/software";
    /// Hardware model string.
    pub const VERSION_MODEL: &str = "/reader/version/model";
    /// Device serial number (absent on firmware that cannot report one).
    pub const VERSION_SERIAL: &str = "/reader/version/serial";
    /// Read transmit power, centi-dBm.
    pub const RADIO_READ_POWER: &str = "/reader/radio/readPower";
    /// Serial link baud rate.
    pub const BAUD_RATE: &str = "/reader/baudRate";
    /// Antenna used by `execute_tag_op`.
    pub const TAGOP_ANTENNA: &str = "/reader/tagop/antenna";
    /// Protocol used by `execute_tag_op`.
    pub const TAGOP_PROTOCOL: &str = "/reader/tagop/protocol";
}

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Boolean flag.
    Bool,
    /// Signed integer.
    Int,
    /// UTF-8 string.
    String,
    /// Regulatory region.
    Region,
    /// Air protocol.
    Protocol,
    /// Opaque bytes.
    Bytes,
    /// List of small unsigned integers (antenna ports, GPIO ids).
    U8List,
    /// Gen2 password.
    Password,
    /// Read plan.
    ReadPlan,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::Bool => "Bool",
            ParamType::Int => "Int",
            ParamType::String => "String",
            ParamType::Region => "Region",
            ParamType::Protocol => "Protocol",
            ParamType::Bytes => "Bytes",
            ParamType::U8List => "U8List",
            ParamType::Password => "Password",
            ParamType::ReadPlan => "ReadPlan",
        };
        write!(f, "{s}")
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i32),
    /// UTF-8 string.
    String(String),
    /// Regulatory region.
    Region(Region),
    /// Air protocol.
    Protocol(TagProtocol),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// List of small unsigned integers.
    U8List(Vec<u8>),
    /// Gen2 password.
    Password(Gen2Password),
    /// Read plan.
    ReadPlan(ReadPlan),
}

impl ParamValue {
    /// The declared type this value satisfies.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Region(_) => ParamType::Region,
            ParamValue::Protocol(_) => ParamType::Protocol,
            ParamValue::Bytes(_) => ParamType::Bytes,
            ParamValue::U8List(_) => ParamType::U8List,
            ParamValue::Password(_) => ParamType::Password,
            ParamValue::ReadPlan(_) => ParamType::ReadPlan,
        }
    }

    /// The integer payload, if this is an [`ParamValue::Int`].
    pub fn as_int(&self) -> Option<i32> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if this is a [`ParamValue::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The region payload, if this is a [`ParamValue::Region`].
    pub fn as_region(&self) -> Option<Region> {
        match self {
            ParamValue::Region(r) => Some(*r),
            _ => None,
        }
    }

    /// The protocol payload, if this is a [`ParamValue::Protocol`].
    pub fn as_protocol(&self) -> Option<TagProtocol> {
        match self {
            ParamValue::Protocol(p) => Some(*p),
            _ => None,
        }
    }

    /// The password payload, if this is a [`ParamValue::Password`].
    pub fn as_password(&self) -> Option<Gen2Password> {
        match self {
            ParamValue::Password(p) => Some(*p),
            _ => None,
        }
    }

    /// The read plan payload, if this is a [`ParamValue::ReadPlan`].
    pub fn as_read_plan(&self) -> Option<&ReadPlan> {
        match self {
            ParamValue::ReadPlan(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_types_match_variants() {
        assert_eq!(ParamValue::Bool(true).param_type(), ParamType::Bool);
        assert_eq!(ParamValue::Int(5).param_type(), ParamType::Int);
        assert_eq!(
            ParamValue::Region(Region::Na).param_type(),
            ParamType::Region
        );
        assert_eq!(
            ParamValue::ReadPlan(ReadPlan::default()).param_type(),
            ParamType::ReadPlan
        );
    }

    #[test]
    fn accessors() {
        assert_eq!(ParamValue::Int(250).as_int(), Some(250));
        assert_eq!(ParamValue::Int(250).as_str(), None);
        assert_eq!(
            ParamValue::String("eapi:///dev/ttyUSB0".into()).as_str(),
            Some("eapi:///dev/ttyUSB0")
        );
        assert_eq!(
            ParamValue::Password(Gen2Password(7)).as_password(),
            Some(Gen2Password(7))
        );
    }

    #[test]
    fn param_type_display() {
        assert_eq!(ParamType::Int.to_string(), "Int");
        assert_eq!(ParamType::ReadPlan.to_string(), "ReadPlan");
    }
}
