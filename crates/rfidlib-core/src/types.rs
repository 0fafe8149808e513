//! Core types used throughout rfidlib.
//!
//! These types provide a protocol-agnostic abstraction layer over the
//! reader wire protocols (embedded serial, RQL, LLRP).

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// RFID regulatory regions.
///
/// The region controls the frequency hop table, transmit power limits, and
/// listen-before-talk behavior of the reader. Most readers ship with the
/// region unset and refuse RF operations until one is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Region not set.
    Unspec,
    /// North America.
    Na,
    /// European Union.
    Eu,
    /// European Union (revised).
    Eu2,
    /// European Union (revised again).
    Eu3,
    /// Korea.
    Kr,
    /// Korea (revised).
    Kr2,
    /// India.
    In,
    /// Japan.
    Jp,
    /// China.
    Prc,
    /// China (840 MHz).
    Prc2,
    /// Australia.
    Au,
    /// New Zealand.
    Nz,
    /// No-limit region.
    Open,
    /// Unrestricted access to the full hardware range.
    Manufacturing,
}

impl Region {
    /// The wire code for this region, or `None` for regions that have no
    /// on-air encoding (currently only [`Region::Manufacturing`]).
    pub fn code(&self) -> Option<u8> {
        let code = match self {
            Region::Unspec => 0,
            Region::Na => 1,
            Region::Eu => 2,
            Region::Kr => 3,
            Region::In => 4,
            Region::Jp => 5,
            Region::Prc => 6,
            Region::Eu2 => 7,
            Region::Eu3 => 8,
            Region::Kr2 => 9,
            Region::Prc2 => 10,
            Region::Au => 11,
            Region::Nz => 12,
            Region::Open => 255,
            Region::Manufacturing => return None,
        };
        Some(code)
    }

    /// Look up a region by its wire code.
    pub fn from_code(code: u8) -> Option<Region> {
        let region = match code {
            0 => Region::Unspec,
            1 => Region::Na,
            2 => Region::Eu,
            3 => Region::Kr,
            4 => Region::In,
            5 => Region::Jp,
            6 => Region::Prc,
            7 => Region::Eu2,
            8 => Region::Eu3,
            9 => Region::Kr2,
            10 => Region::Prc2,
            11 => Region::Au,
            12 => Region::Nz,
            255 => Region::Open,
            _ => return None,
        };
        Some(region)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Unspec => "UNSPEC",
            Region::Na => "NA",
            Region::Eu => "EU",
            Region::Eu2 => "EU2",
            Region::Eu3 => "EU3",
            Region::Kr => "KR",
            Region::Kr2 => "KR2",
            Region::In => "IN",
            Region::Jp => "JP",
            Region::Prc => "PRC",
            Region::Prc2 => "PRC2",
            Region::Au => "AU",
            Region::Nz => "NZ",
            Region::Open => "OPEN",
            Region::Manufacturing => "MANUFACTURING",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a string cannot be parsed into a [`Region`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRegionError(String);

impl fmt::Display for ParseRegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown region: {}", self.0)
    }
}

impl std::error::Error for ParseRegionError {}

impl FromStr for Region {
    type Err = ParseRegionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UNSPEC" => Ok(Region::Unspec),
            "NA" => Ok(Region::Na),
            "EU" => Ok(Region::Eu),
            "EU2" => Ok(Region::Eu2),
            "EU3" => Ok(Region::Eu3),
            "KR" => Ok(Region::Kr),
            "KR2" => Ok(Region::Kr2),
            "IN" => Ok(Region::In),
            "JP" => Ok(Region::Jp),
            "PRC" => Ok(Region::Prc),
            "PRC2" => Ok(Region::Prc2),
            "AU" => Ok(Region::Au),
            "NZ" => Ok(Region::Nz),
            "OPEN" => Ok(Region::Open),
            "MANUFACTURING" => Ok(Region::Manufacturing),
            _ => Err(ParseRegionError(s.to_string())),
        }
    }
}

/// Air-interface protocol of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagProtocol {
    /// EPCglobal UHF Class-1 Generation-2.
    Gen2,
    /// ISO 18000-6B.
    Iso180006b,
    /// IPX with 64 kbps link rate.
    Ipx64,
    /// IPX with 256 kbps link rate.
    Ipx256,
}

impl TagProtocol {
    /// The wire code used by the embedded serial protocol.
    pub fn code(&self) -> u8 {
        match self {
            TagProtocol::Iso180006b => 0x03,
            TagProtocol::Gen2 => 0x05,
            TagProtocol::Ipx64 => 0x07,
            TagProtocol::Ipx256 => 0x08,
        }
    }

    /// Look up a protocol by its wire code.
    pub fn from_code(code: u8) -> Option<TagProtocol> {
        match code {
            0x03 => Some(TagProtocol::Iso180006b),
            0x05 => Some(TagProtocol::Gen2),
            0x07 => Some(TagProtocol::Ipx64),
            0x08 => Some(TagProtocol::Ipx256),
            _ => None,
        }
    }
}

impl fmt::Display for TagProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TagProtocol::Gen2 => "GEN2",
            TagProtocol::Iso180006b => "ISO18000-6B",
            TagProtocol::Ipx64 => "IPX64",
            TagProtocol::Ipx256 => "IPX256",
        };
        write!(f, "{s}")
    }
}

/// The identity of a tag: its EPC plus the protocol it was singulated under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagData {
    /// EPC memory contents.
    pub epc: Vec<u8>,
    /// Air protocol the tag answered on.
    pub protocol: TagProtocol,
    /// The tag's stored CRC over its EPC, when the reader reported one.
    pub crc: Option<u16>,
}

impl TagData {
    /// Construct a Gen2 tag identity from raw EPC bytes.
    pub fn new(epc: Vec<u8>) -> Self {
        TagData {
            epc,
            protocol: TagProtocol::Gen2,
            crc: None,
        }
    }

    /// The EPC as an uppercase hex string (no separators).
    pub fn epc_hex(&self) -> String {
        let mut s = String::with_capacity(self.epc.len() * 2);
        for b in &self.epc {
            s.push_str(&format!("{b:02X}"));
        }
        s
    }
}

/// One observed tag singulation.
///
/// Produced by [`read`](crate::reader::Reader::read) and delivered to
/// [`ReadListener`](crate::listener::ReadListener)s during background
/// reads. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct TagReadData {
    /// The tag that was read.
    pub tag: TagData,
    /// The antenna port the tag was seen on.
    pub antenna: u8,
    /// Received signal strength, in dBm.
    pub rssi: i32,
    /// How many times the tag was singulated during the read interval.
    pub read_count: u32,
    /// Host-side time at which the read was parsed.
    pub timestamp: SystemTime,
    /// Result bytes of an embedded tag operation, empty when no operation
    /// was embedded in the read.
    pub data: Vec<u8>,
}

/// State of a single GPIO pin.
///
/// Equality is componentwise over all three fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpioPin {
    /// Pin number.
    pub id: u8,
    /// Electrical level: `true` = high.
    pub high: bool,
    /// Direction: `true` = output.
    pub output: bool,
}

impl GpioPin {
    /// An input pin observation.
    pub fn input(id: u8, high: bool) -> Self {
        GpioPin {
            id,
            high,
            output: false,
        }
    }

    /// An output pin assignment.
    pub fn output(id: u8, high: bool) -> Self {
        GpioPin {
            id,
            high,
            output: true,
        }
    }
}

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:2}{}{}",
            self.id,
            if self.high { "H" } else { "L" },
            if self.output { "O" } else { "I" }
        )
    }
}

/// Firmware/hardware identity reported by the version handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Bootloader version, four dotted fields.
    pub bootloader: [u8; 4],
    /// Hardware revision, four dotted fields.
    pub hardware: [u8; 4],
    /// Application firmware version, four dotted fields.
    pub firmware: [u8; 4],
    /// Firmware build date, four packed BCD-ish fields.
    pub firmware_date: [u8; 4],
    /// Bitmask of supported [`TagProtocol`] wire codes.
    pub supported_protocols: u32,
}

impl VersionInfo {
    /// The firmware version as a dotted string, e.g. `"01.0B.00.0E"`.
    pub fn firmware_string(&self) -> String {
        let f = &self.firmware;
        format!("{:02X}.{:02X}.{:02X}.{:02X}", f[0], f[1], f[2], f[3])
    }

    /// The hardware revision as a dotted string.
    pub fn hardware_string(&self) -> String {
        let h = &self.hardware;
        format!("{:02X}.{:02X}.{:02X}.{:02X}", h[0], h[1], h[2], h[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_code_round_trip() {
        for region in [
            Region::Unspec,
            Region::Na,
            Region::Eu,
            Region::Eu2,
            Region::Eu3,
            Region::Kr,
            Region::Kr2,
            Region::In,
            Region::Jp,
            Region::Prc,
            Region::Prc2,
            Region::Au,
            Region::Nz,
            Region::Open,
        ] {
            let code = region.code().unwrap();
            assert_eq!(Region::from_code(code), Some(region));
        }
    }

    #[test]
    fn region_fixed_codes() {
        assert_eq!(Region::Unspec.code(), Some(0));
        assert_eq!(Region::Na.code(), Some(1));
        assert_eq!(Region::Eu.code(), Some(2));
        assert_eq!(Region::Kr.code(), Some(3));
        assert_eq!(Region::In.code(), Some(4));
        assert_eq!(Region::Jp.code(), Some(5));
        assert_eq!(Region::Prc.code(), Some(6));
        assert_eq!(Region::Eu2.code(), Some(7));
        assert_eq!(Region::Eu3.code(), Some(8));
        assert_eq!(Region::Kr2.code(), Some(9));
        assert_eq!(Region::Prc2.code(), Some(10));
        assert_eq!(Region::Au.code(), Some(11));
        assert_eq!(Region::Nz.code(), Some(12));
        assert_eq!(Region::Open.code(), Some(255));
    }

    #[test]
    fn manufacturing_has_no_code() {
        assert_eq!(Region::Manufacturing.code(), None);
    }

    #[test]
    fn region_from_unknown_code() {
        assert_eq!(Region::from_code(100), None);
    }

    #[test]
    fn region_parse() {
        assert_eq!("na".parse::<Region>(), Ok(Region::Na));
        assert_eq!("EU3".parse::<Region>(), Ok(Region::Eu3));
        assert!("atlantis".parse::<Region>().is_err());
    }

    #[test]
    fn protocol_code_round_trip() {
        for proto in [
            TagProtocol::Gen2,
            TagProtocol::Iso180006b,
            TagProtocol::Ipx64,
            TagProtocol::Ipx256,
        ] {
            assert_eq!(TagProtocol::from_code(proto.code()), Some(proto));
        }
        assert_eq!(TagProtocol::from_code(0x42), None);
    }

    #[test]
    fn epc_hex_formatting() {
        let tag = TagData::new(vec![0xE2, 0x00, 0x68, 0x94]);
        assert_eq!(tag.epc_hex(), "E2006894");
    }

    #[test]
    fn gpio_pin_equality_is_componentwise() {
        assert_eq!(GpioPin::input(1, true), GpioPin::input(1, true));
        assert_ne!(GpioPin::input(1, true), GpioPin::input(1, false));
        assert_ne!(GpioPin::input(1, true), GpioPin::output(1, true));
        assert_ne!(GpioPin::input(1, true), GpioPin::input(2, true));
    }

    #[test]
    fn gpio_pin_display() {
        assert_eq!(GpioPin::input(2, true).to_string(), " 2HI");
        assert_eq!(GpioPin::output(11, false).to_string(), "11LO");
    }

    #[test]
    fn version_strings() {
        let v = VersionInfo {
            bootloader: [0x01, 0x00, 0x00, 0x00],
            hardware: [0x00, 0x00, 0x00, 0x10],
            firmware: [0x01, 0x0B, 0x00, 0x0E],
            firmware_date: [0x20, 0x19, 0x06, 0x12],
            supported_protocols: 0x30,
        };
        assert_eq!(v.firmware_string(), "01.0B.00.0E");
        assert_eq!(v.hardware_string(), "00.00.00.10");
    }
}
