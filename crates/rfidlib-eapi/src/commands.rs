//! Command payload builders and response parsers.
//!
//! Each public operation maps to a `(opcode, payload)` pair built here and
//! a parser for the response data (already status-stripped by
//! [`strip_status`](crate::msg::strip_status)). Builders are pure
//! functions of their arguments; nothing here touches the transport.
//!
//! Layouts follow the embedded module's wire documentation: multi-byte
//! integers are big-endian, tag-singulating commands open with a timeout
//! and a select prefix, and tag records share one shape across timed
//! reads, buffer drains, and streamed reports.

use std::time::SystemTime;

use bytes::{BufMut, BytesMut};

use rfidlib_core::error::{Error, Result};
use rfidlib_core::listener::StatusReport;
use rfidlib_core::tagop::{Gen2Password, TagFilter, TagOp};
use rfidlib_core::types::{GpioPin, Region, TagData, TagProtocol, TagReadData, VersionInfo};

use crate::frame::{RawFrame, MAX_PAYLOAD};
use crate::msg::{opcode, strip_status};

/// Flag on READ_TAG_ID_MULTIPLE: an embedded op follows the select prefix.
const READ_FLAG_EMBEDDED_OP: u16 = 0x0004;

/// Continuous-inventory sub-option: start streaming.
const CONTINUOUS_START: u8 = 0x01;
/// Continuous-inventory sub-option: stop streaming.
const CONTINUOUS_STOP: u8 = 0x02;

/// Streamed-report flag: payload carries a tag record.
const STREAM_TAG: u8 = 0x00;
/// Streamed-report flag: payload carries a status report.
const STREAM_STATUS: u8 = 0x01;

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Bounds-checked reader over a response data slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(Error::Parse(format!(
                "response truncated: wanted {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.data.len()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    fn take_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn take_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

// ---------------------------------------------------------------------------
// Version, region, power, protocol, antenna
// ---------------------------------------------------------------------------

/// GET_VERSION handshake.
pub fn get_version() -> (u8, Vec<u8>) {
    (opcode::GET_VERSION, Vec::new())
}

/// Parse the GET_VERSION response.
pub fn parse_version(data: &[u8]) -> Result<VersionInfo> {
    let mut c = Cursor::new(data);
    let mut field = |c: &mut Cursor| -> Result<[u8; 4]> {
        let b = c.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    };
    let bootloader = field(&mut c)?;
    let hardware = field(&mut c)?;
    let firmware = field(&mut c)?;
    let firmware_date = field(&mut c)?;
    let supported_protocols = c.take_u32()?;
    Ok(VersionInfo {
        bootloader,
        hardware,
        firmware,
        firmware_date,
        supported_protocols,
    })
}

/// GET_HARDWARE_VERSION: hardware revision plus serial number.
pub fn get_hardware_version() -> (u8, Vec<u8>) {
    (opcode::GET_HARDWARE_VERSION, Vec::new())
}

/// Parse the GET_HARDWARE_VERSION response into `(revision, serial)`.
pub fn parse_hardware_version(data: &[u8]) -> Result<(u8, String)> {
    let mut c = Cursor::new(data);
    let revision = c.take_u8()?;
    let len = c.take_u8()? as usize;
    let serial = c.take(len)?;
    let serial = std::str::from_utf8(serial)
        .map_err(|_| Error::Parse("serial number is not valid UTF-8".into()))?;
    Ok((revision, serial.to_string()))
}

/// SET_BAUD_RATE.
pub fn set_baud_rate(baud: u32) -> (u8, Vec<u8>) {
    (opcode::SET_BAUD_RATE, baud.to_be_bytes().to_vec())
}

/// GET_REGION.
pub fn get_region() -> (u8, Vec<u8>) {
    (opcode::GET_REGION, Vec::new())
}

/// Parse the GET_REGION response.
pub fn parse_region(data: &[u8]) -> Result<Region> {
    let mut c = Cursor::new(data);
    let code = c.take_u8()?;
    Region::from_code(code)
        .ok_or_else(|| Error::Parse(format!("unknown region code 0x{code:02X}")))
}

/// SET_REGION. Fails for regions with no wire code.
pub fn set_region(region: Region) -> Result<(u8, Vec<u8>)> {
    let code = region.code().ok_or_else(|| {
        Error::InvalidArgument(format!("region {region} has no wire code"))
    })?;
    Ok((opcode::SET_REGION, vec![code]))
}

/// GET_READ_TX_POWER.
pub fn get_read_power() -> (u8, Vec<u8>) {
    (opcode::GET_READ_TX_POWER, Vec::new())
}

/// Parse the GET_READ_TX_POWER response (centi-dBm).
pub fn parse_read_power(data: &[u8]) -> Result<i32> {
    let mut c = Cursor::new(data);
    Ok(i32::from(c.take_u16()?))
}

/// SET_READ_TX_POWER (centi-dBm).
pub fn set_read_power(power_cdbm: u16) -> (u8, Vec<u8>) {
    (opcode::SET_READ_TX_POWER, power_cdbm.to_be_bytes().to_vec())
}

/// SET_TAG_PROTOCOL.
pub fn set_tag_protocol(protocol: TagProtocol) -> (u8, Vec<u8>) {
    (opcode::SET_TAG_PROTOCOL, vec![protocol.code()])
}

/// GET_TAG_PROTOCOL.
pub fn get_tag_protocol() -> (u8, Vec<u8>) {
    (opcode::GET_TAG_PROTOCOL, Vec::new())
}

/// Parse the GET_TAG_PROTOCOL response.
pub fn parse_tag_protocol(data: &[u8]) -> Result<TagProtocol> {
    let mut c = Cursor::new(data);
    let code = c.take_u8()?;
    TagProtocol::from_code(code)
        .ok_or_else(|| Error::Parse(format!("unknown protocol code 0x{code:02X}")))
}

/// SET_ANTENNA_PORT.
pub fn set_antenna_port(antenna: u8) -> (u8, Vec<u8>) {
    (opcode::SET_ANTENNA_PORT, vec![antenna])
}

/// GET_ANTENNA_PORT.
pub fn get_antenna_ports() -> (u8, Vec<u8>) {
    (opcode::GET_ANTENNA_PORT, Vec::new())
}

/// Parse the GET_ANTENNA_PORT response into the list of port ids.
pub fn parse_antenna_ports(data: &[u8]) -> Result<Vec<u8>> {
    let mut c = Cursor::new(data);
    let count = c.take_u8()? as usize;
    let mut ports = Vec::with_capacity(count);
    for _ in 0..count {
        let id = c.take_u8()?;
        let _detected = c.take_u8()?;
        ports.push(id);
    }
    Ok(ports)
}

// ---------------------------------------------------------------------------
// GPIO
// ---------------------------------------------------------------------------

/// GET_USER_GPIO_INPUTS.
pub fn gpio_get() -> (u8, Vec<u8>) {
    (opcode::GET_USER_GPIO_INPUTS, Vec::new())
}

/// Parse the GPIO input response.
pub fn parse_gpio_inputs(data: &[u8]) -> Result<Vec<GpioPin>> {
    let mut c = Cursor::new(data);
    let count = c.take_u8()? as usize;
    let mut pins = Vec::with_capacity(count);
    for _ in 0..count {
        let id = c.take_u8()?;
        let high = c.take_u8()? != 0;
        let output = c.take_u8()? != 0;
        pins.push(GpioPin { id, high, output });
    }
    Ok(pins)
}

/// SET_USER_GPIO_OUTPUTS.
pub fn gpio_set(pins: &[GpioPin]) -> Result<(u8, Vec<u8>)> {
    if pins.len() > u8::MAX as usize {
        return Err(Error::InvalidArgument(format!(
            "{} pins exceed the wire limit",
            pins.len()
        )));
    }
    let mut buf = BytesMut::with_capacity(1 + pins.len() * 2);
    buf.put_u8(pins.len() as u8);
    for pin in pins {
        buf.put_u8(pin.id);
        buf.put_u8(u8::from(pin.high));
    }
    Ok((opcode::SET_USER_GPIO_OUTPUTS, buf.to_vec()))
}

// ---------------------------------------------------------------------------
// Select prefix
// ---------------------------------------------------------------------------

/// Append the select prefix for `filter` to `buf`.
fn put_select(buf: &mut BytesMut, filter: Option<&TagFilter>) -> Result<()> {
    match filter {
        None => buf.put_u8(0x00),
        Some(TagFilter::Epc(tag)) => {
            if tag.epc.len() > u8::MAX as usize {
                return Err(Error::InvalidArgument(format!(
                    "EPC filter of {} bytes exceeds the wire limit",
                    tag.epc.len()
                )));
            }
            buf.put_u8(0x01);
            buf.put_u8(tag.epc.len() as u8);
            buf.put_slice(&tag.epc);
        }
        Some(TagFilter::Gen2Select(select)) => {
            let mask_len = (usize::from(select.bit_length) + 7) / 8;
            if select.mask.len() < mask_len {
                return Err(Error::InvalidArgument(format!(
                    "select mask of {} bytes cannot cover {} bits",
                    select.mask.len(),
                    select.bit_length
                )));
            }
            let ctl = (u8::from(select.invert) << 7) | select.bank.code();
            buf.put_u8(0x04);
            buf.put_u8(ctl);
            buf.put_u32(select.bit_pointer);
            buf.put_u8(select.bit_length);
            buf.put_slice(&select.mask[..mask_len]);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inventory and the tag buffer
// ---------------------------------------------------------------------------

/// READ_TAG_ID_MULTIPLE: timed inventory, optionally with an embedded op
/// executed against every singulated tag.
pub fn read_tag_id_multiple(
    duration_ms: u16,
    filter: Option<&TagFilter>,
    embedded: Option<(&TagOp, Gen2Password)>,
) -> Result<(u8, Vec<u8>)> {
    let mut flags = 0u16;
    if embedded.is_some() {
        flags |= READ_FLAG_EMBEDDED_OP;
    }
    let mut buf = BytesMut::new();
    buf.put_u16(flags);
    buf.put_u16(duration_ms);
    put_select(&mut buf, filter)?;
    if let Some((op, password)) = embedded {
        let (op_code, tail) = op_tail(op, password)?;
        if tail.len() > u8::MAX as usize {
            return Err(Error::InvalidArgument(
                "embedded op too large for the wire".into(),
            ));
        }
        buf.put_u8(op_code);
        buf.put_u8(tail.len() as u8);
        buf.put_slice(&tail);
    }
    check_payload_len(buf.len())?;
    Ok((opcode::READ_TAG_ID_MULTIPLE, buf.to_vec()))
}

/// Reject a command that cannot fit one frame before anything touches
/// the wire.
fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD {
        return Err(Error::InvalidArgument(format!(
            "command payload of {len} bytes exceeds the {MAX_PAYLOAD}-byte frame limit"
        )));
    }
    Ok(())
}

/// GET_TAG_BUFFER.
pub fn get_tag_buffer() -> (u8, Vec<u8>) {
    (opcode::GET_TAG_BUFFER, Vec::new())
}

/// CLEAR_TAG_BUFFER.
pub fn clear_tag_buffer() -> (u8, Vec<u8>) {
    (opcode::CLEAR_TAG_BUFFER, Vec::new())
}

/// Parse one tag record at the cursor.
fn parse_tag_record(c: &mut Cursor<'_>, protocol: TagProtocol) -> Result<TagReadData> {
    let rssi = c.take_i8()?;
    let antenna = c.take_u8()?;
    let read_count = c.take_u8()?;
    let epc_len = c.take_u8()? as usize;
    let epc = c.take(epc_len)?.to_vec();
    let epc_crc = c.take_u16()?;
    let data_len = c.take_u16()? as usize;
    let data = c.take(data_len)?.to_vec();
    Ok(TagReadData {
        tag: TagData {
            epc,
            protocol,
            crc: Some(epc_crc),
        },
        antenna,
        rssi: i32::from(rssi),
        read_count: u32::from(read_count),
        timestamp: SystemTime::now(),
        data,
    })
}

/// Parse a `count`-prefixed run of tag records (READ_TAG_ID_MULTIPLE and
/// GET_TAG_BUFFER responses).
pub fn parse_tag_records(data: &[u8], protocol: TagProtocol) -> Result<Vec<TagReadData>> {
    let mut c = Cursor::new(data);
    let count = c.take_u8()? as usize;
    let mut tags = Vec::with_capacity(count);
    for _ in 0..count {
        tags.push(parse_tag_record(&mut c, protocol)?);
    }
    if c.remaining() != 0 {
        return Err(Error::Parse(format!(
            "{} trailing bytes after {} tag records",
            c.remaining(),
            count
        )));
    }
    Ok(tags)
}

// ---------------------------------------------------------------------------
// Continuous streaming
// ---------------------------------------------------------------------------

/// MULTI_PROTOCOL_TAG_OP start: begin unsolicited tag-report streaming.
pub fn continuous_start(on_time_ms: u16) -> (u8, Vec<u8>) {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(CONTINUOUS_START);
    buf.put_u16(0);
    buf.put_u16(on_time_ms);
    (opcode::MULTI_PROTOCOL_TAG_OP, buf.to_vec())
}

/// MULTI_PROTOCOL_TAG_OP stop: quiesce the stream.
pub fn continuous_stop() -> (u8, Vec<u8>) {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(CONTINUOUS_STOP);
    buf.put_u16(0);
    buf.put_u16(0);
    (opcode::MULTI_PROTOCOL_TAG_OP, buf.to_vec())
}

/// One unsolicited report from a continuous-read stream.
#[derive(Debug, Clone)]
pub enum StreamReport {
    /// A tag was singulated.
    Tag(TagReadData),
    /// A reader status report.
    Status(StatusReport),
}

/// Parse one streamed report frame.
///
/// Device faults carried in the stream (buffer full, no antenna) surface
/// as [`Error::Code`](rfidlib_core::error::Error::Code) for the engine's
/// recovery matrix.
pub fn parse_stream_report(frame: &RawFrame, protocol: TagProtocol) -> Result<StreamReport> {
    if frame.opcode != opcode::READ_TAG_ID_MULTIPLE {
        return Err(Error::Parse(format!(
            "unexpected streamed opcode 0x{:02X}",
            frame.opcode
        )));
    }
    let data = strip_status(&frame.payload)?;
    let mut c = Cursor::new(data);
    match c.take_u8()? {
        STREAM_TAG => Ok(StreamReport::Tag(parse_tag_record(&mut c, protocol)?)),
        STREAM_STATUS => {
            let temperature = c.take_i8()?;
            let antenna = c.take_u8()?;
            let frequency_khz = c.take_u32()?;
            Ok(StreamReport::Status(StatusReport {
                temperature: Some(temperature),
                antenna: Some(antenna),
                frequency_khz: Some(frequency_khz),
            }))
        }
        other => Err(Error::Parse(format!(
            "unknown stream report flag 0x{other:02X}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tag operations
// ---------------------------------------------------------------------------

/// Render a tag operation: `timeout | select | op tail`.
///
/// `default_password` is the registry's `/reader/gen2/accessPassword`;
/// ops carrying their own password override it.
pub fn tag_op(
    op: &TagOp,
    filter: Option<&TagFilter>,
    timeout_ms: u16,
    default_password: Gen2Password,
) -> Result<(u8, Vec<u8>)> {
    let (op_code, tail) = op_tail(op, default_password)?;
    let mut buf = BytesMut::new();
    buf.put_u16(timeout_ms);
    put_select(&mut buf, filter)?;
    buf.put_slice(&tail);
    check_payload_len(buf.len())?;
    Ok((op_code, buf.to_vec()))
}

/// The op-specific byte tail (everything after timeout and select), plus
/// the opcode it is sent under.
fn op_tail(op: &TagOp, default_password: Gen2Password) -> Result<(u8, Vec<u8>)> {
    let mut buf = BytesMut::new();
    let code = match op {
        TagOp::Gen2ReadData {
            bank,
            word_address,
            word_count,
        } => {
            buf.put_u32(default_password.0);
            buf.put_u8(bank.code());
            buf.put_u32(*word_address);
            buf.put_u8(*word_count);
            opcode::READ_TAG_DATA
        }
        TagOp::Gen2WriteData {
            bank,
            word_address,
            data,
        } => {
            buf.put_u32(default_password.0);
            buf.put_u8(bank.code());
            buf.put_u32(*word_address);
            for word in data {
                buf.put_u16(*word);
            }
            opcode::WRITE_TAG_DATA
        }
        TagOp::Gen2WriteTag { epc } => {
            buf.put_slice(&epc.epc);
            opcode::WRITE_TAG_ID
        }
        TagOp::Gen2Lock {
            action,
            access_password,
        } => {
            buf.put_u32(access_password.unwrap_or(default_password).0);
            buf.put_u16(action.mask);
            buf.put_u16(action.action);
            opcode::LOCK_TAG
        }
        TagOp::Gen2Kill { kill_password } => {
            buf.put_u32(kill_password.0);
            opcode::KILL_TAG
        }
        TagOp::Gen2BlockWrite {
            bank,
            word_pointer,
            data,
        } => {
            buf.put_u32(default_password.0);
            buf.put_u8(bank.code());
            buf.put_u32(*word_pointer);
            buf.put_u8(data.len() as u8);
            for word in data {
                buf.put_u16(*word);
            }
            opcode::GEN2_BLOCK_WRITE
        }
        TagOp::Gen2BlockPermaLock {
            read_lock,
            bank,
            block_pointer,
            block_range,
            mask,
        } => {
            buf.put_u32(default_password.0);
            buf.put_u8(u8::from(*read_lock));
            buf.put_u8(bank.code());
            buf.put_u32(*block_pointer);
            buf.put_u8(*block_range);
            for word in mask {
                buf.put_u16(*word);
            }
            opcode::GEN2_BLOCK_PERMALOCK
        }
        TagOp::Gen2BlockErase {
            bank,
            word_pointer,
            word_count,
        } => {
            buf.put_u32(default_password.0);
            buf.put_u8(bank.code());
            buf.put_u32(*word_pointer);
            buf.put_u8(*word_count);
            opcode::GEN2_BLOCK_ERASE
        }
        TagOp::Gen2ReadAfterWrite {
            write_bank,
            write_address,
            write_data,
            read_bank,
            read_address,
            read_word_count,
        } => {
            buf.put_u32(default_password.0);
            buf.put_u8(write_bank.code());
            buf.put_u32(*write_address);
            buf.put_u8(write_data.len() as u8);
            for word in write_data {
                buf.put_u16(*word);
            }
            buf.put_u8(read_bank.code());
            buf.put_u32(*read_address);
            buf.put_u8(*read_word_count);
            opcode::READ_AFTER_WRITE
        }
        TagOp::Iso6bRead { byte_address, len } => {
            buf.put_u8(*byte_address);
            buf.put_u8(*len);
            opcode::READ_TAG_DATA
        }
        TagOp::Iso6bWrite { byte_address, data } => {
            buf.put_u8(*byte_address);
            buf.put_slice(data);
            opcode::WRITE_TAG_DATA
        }
        TagOp::Iso6bLock { byte_address } => {
            buf.put_u8(*byte_address);
            opcode::LOCK_TAG
        }
    };
    Ok((code, buf.to_vec()))
}
