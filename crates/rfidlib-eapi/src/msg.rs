//! Opcode catalog, fault codes, and response status handling.
//!
//! Every response payload opens with a status byte; zero means success
//! and anything else is followed by a 16-bit fault code. This module owns
//! the opcode constants, the fault table with its category mapping, and
//! [`strip_status`], which callers use to get at the response data.

use rfidlib_core::error::{Error, FaultCategory, ReaderCodeError, Result};

/// Command opcodes.
pub mod opcode {
    /// Firmware/bootloader/hardware version handshake.
    pub const GET_VERSION: u8 = 0x03;
    /// Change the module's serial baud rate.
    pub const SET_BAUD_RATE: u8 = 0x06;
    /// Hardware revision and serial number.
    pub const GET_HARDWARE_VERSION: u8 = 0x10;
    /// Timed inventory; also the opcode of streamed tag reports.
    pub const READ_TAG_ID_MULTIPLE: u8 = 0x22;
    /// Write a new EPC.
    pub const WRITE_TAG_ID: u8 = 0x23;
    /// Write words to tag memory.
    pub const WRITE_TAG_DATA: u8 = 0x24;
    /// Lock/unlock tag memory.
    pub const LOCK_TAG: u8 = 0x25;
    /// Kill a tag.
    pub const KILL_TAG: u8 = 0x26;
    /// Read words from tag memory.
    pub const READ_TAG_DATA: u8 = 0x28;
    /// Drain the module's internal tag buffer.
    pub const GET_TAG_BUFFER: u8 = 0x29;
    /// Clear the module's internal tag buffer.
    pub const CLEAR_TAG_BUFFER: u8 = 0x2A;
    /// Write then read back in one singulation.
    pub const READ_AFTER_WRITE: u8 = 0x2B;
    /// Gen2 BlockPermaLock.
    pub const GEN2_BLOCK_PERMALOCK: u8 = 0x2C;
    /// Gen2 BlockWrite.
    pub const GEN2_BLOCK_WRITE: u8 = 0x2D;
    /// Gen2 BlockErase.
    pub const GEN2_BLOCK_ERASE: u8 = 0x2E;
    /// Start/stop continuous inventory streaming.
    pub const MULTI_PROTOCOL_TAG_OP: u8 = 0x2F;
    /// Query configured antenna ports.
    pub const GET_ANTENNA_PORT: u8 = 0x61;
    /// Query read transmit power.
    pub const GET_READ_TX_POWER: u8 = 0x62;
    /// Query active tag protocol.
    pub const GET_TAG_PROTOCOL: u8 = 0x63;
    /// Read GPIO input pins.
    pub const GET_USER_GPIO_INPUTS: u8 = 0x66;
    /// Query regulatory region.
    pub const GET_REGION: u8 = 0x67;
    /// Select the active antenna port.
    pub const SET_ANTENNA_PORT: u8 = 0x91;
    /// Set read transmit power.
    pub const SET_READ_TX_POWER: u8 = 0x92;
    /// Select the active tag protocol.
    pub const SET_TAG_PROTOCOL: u8 = 0x93;
    /// Drive GPIO output pins.
    pub const SET_USER_GPIO_OUTPUTS: u8 = 0x96;
    /// Set the regulatory region.
    pub const SET_REGION: u8 = 0x97;
}

/// Device fault codes.
pub mod fault {
    /// Command payload length disagreed with the opcode's layout.
    pub const MSG_WRONG_NUMBER_OF_DATA: u16 = 0x0100;
    /// Unknown opcode.
    pub const INVALID_OPCODE: u16 = 0x0101;
    /// Opcode recognized but not implemented by this firmware.
    pub const UNIMPLEMENTED_OPCODE: u16 = 0x0102;
    /// A command parameter was out of range.
    pub const INVALID_PARAMETER_VALUE: u16 = 0x0105;
    /// The internal tag buffer filled during continuous inventory.
    pub const TAG_ID_BUFFER_FULL: u16 = 0x0400;
    /// Inventory completed without singulating any tag.
    pub const NO_TAGS_FOUND: u16 = 0x0401;
    /// A tag operation was issued with no protocol configured.
    pub const NO_PROTOCOL_DEFINED: u16 = 0x0402;
    /// The tag stopped answering mid-read.
    pub const PROTOCOL_NO_DATA_READ: u16 = 0x0404;
    /// The tag rejected or failed a write.
    pub const PROTOCOL_WRITE_FAILED: u16 = 0x0406;
    /// Unspecified tag-level failure.
    pub const GENERAL_TAG_ERROR: u16 = 0x040A;
    /// The supplied kill password was wrong.
    pub const INVALID_KILL_PASSWORD: u16 = 0x040C;
    /// No antenna detected on the active port ("No Antenna").
    pub const ANTENNA_NOT_CONNECTED: u16 = 0x0503;
    /// The module shut the transmitter down to cool off.
    pub const TEMPERATURE_EXCEEDED: u16 = 0x0504;
    /// The firmware hit an internal error.
    pub const SYSTEM_UNKNOWN_ERROR: u16 = 0x7F00;
}

/// Map a fault code onto its category.
///
/// Codes absent from the table are bucketed by their high byte, matching
/// how the firmware allocates ranges.
pub fn fault_category(code: u16) -> FaultCategory {
    match code {
        fault::UNIMPLEMENTED_OPCODE => FaultCategory::Unsupported,
        fault::MSG_WRONG_NUMBER_OF_DATA
        | fault::INVALID_OPCODE
        | fault::INVALID_PARAMETER_VALUE
        | fault::NO_PROTOCOL_DEFINED => FaultCategory::Protocol,
        fault::TAG_ID_BUFFER_FULL
        | fault::NO_TAGS_FOUND
        | fault::PROTOCOL_NO_DATA_READ
        | fault::PROTOCOL_WRITE_FAILED
        | fault::GENERAL_TAG_ERROR
        | fault::INVALID_KILL_PASSWORD => FaultCategory::Tag,
        fault::ANTENNA_NOT_CONNECTED | fault::TEMPERATURE_EXCEEDED => FaultCategory::Hardware,
        fault::SYSTEM_UNKNOWN_ERROR => FaultCategory::Fatal,
        _ => match code >> 8 {
            0x01 => FaultCategory::Protocol,
            0x04 => FaultCategory::Tag,
            0x05 => FaultCategory::Hardware,
            _ => FaultCategory::Fatal,
        },
    }
}

/// Build the error for a device fault code.
pub fn code_error(code: u16) -> Error {
    Error::Code(ReaderCodeError {
        code,
        category: fault_category(code),
    })
}

/// Split a response payload into its status and data.
///
/// Returns the data slice on success status; on a non-zero status,
/// extracts the 16-bit fault code and returns the mapped
/// [`Error::Code`](rfidlib_core::error::Error::Code).
pub fn strip_status(payload: &[u8]) -> Result<&[u8]> {
    let (&status, rest) = payload
        .split_first()
        .ok_or_else(|| Error::Parse("empty response payload".into()))?;
    if status == 0 {
        return Ok(rest);
    }
    if rest.len() < 2 {
        return Err(Error::Parse(format!(
            "status 0x{status:02X} with truncated fault code"
        )));
    }
    Err(code_error(u16::from_be_bytes([rest[0], rest[1]])))
}
