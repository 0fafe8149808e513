//! Command frame encoder/decoder.
//!
//! The embedded module speaks a length-prefixed, CRC-checked binary frame
//! over its serial link. This module handles the pure byte-level encoding
//! and decoding; command payloads are built and parsed in
//! [`commands`](crate::commands).
//!
//! # Frame format
//!
//! ```text
//! 0xFF <len> <opcode> <payload[len]> <crc:u16be>
//! ```
//!
//! - SOH: a single `0xFF` byte
//! - `len`: payload length in bytes (0-255); excludes header and CRC
//! - `opcode`: command byte
//! - `payload`: variable-length command data
//! - `crc`: CCITT CRC-16 (poly 0x1021, seed 0xFFFF) over opcode and
//!   payload, big-endian
//!
//! The framer is stateless between frames; [`read_frame`] layers it over
//! a [`Transport`] with a single end-to-end deadline.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::time::Instant;

use rfidlib_core::error::{Error, Result};
use rfidlib_core::transport::Transport;

/// Start-of-header byte opening every frame.
pub const SOH: u8 = 0xFF;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD: usize = 255;

/// Bytes of inter-frame noise tolerated while scanning for SOH.
///
/// A healthy link has none; a window this size survives line glitches
/// without letting a desynchronized stream stall decode forever.
const SOH_LOOKAHEAD: usize = 64;

/// Frame overhead: SOH, length, opcode, and the two CRC bytes.
const OVERHEAD: usize = 5;

/// Receive chunk size used by [`read_frame`].
const READ_CHUNK: usize = 256;

/// Compute the CCITT CRC-16 (seed 0xFFFF) of `data`.
///
/// # Example
///
/// ```
/// // CRC of a bare GET_VERSION opcode
/// assert_eq!(rfidlib_eapi::frame::crc16(&[0x03]), 0xD193);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// A decoded frame: opcode plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Command/response opcode.
    pub opcode: u8,
    /// Payload bytes (response payloads start with the status byte).
    pub payload: Vec<u8>,
}

/// Encode a command frame ready for transmission.
///
/// Fails with [`Error::InvalidArgument`] when the payload exceeds
/// [`MAX_PAYLOAD`]; nothing is written in that case.
///
/// # Example
///
/// ```
/// use rfidlib_eapi::frame::encode_frame;
///
/// let bytes = encode_frame(0x03, &[]).unwrap();
/// assert_eq!(bytes, vec![0xFF, 0x00, 0x03, 0xD1, 0x93]);
/// ```
pub fn encode_frame(opcode: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::InvalidArgument(format!(
            "payload of {} bytes exceeds the {}-byte frame limit",
            payload.len(),
            MAX_PAYLOAD
        )));
    }
    let mut buf = BytesMut::with_capacity(OVERHEAD + payload.len());
    buf.put_u8(SOH);
    buf.put_u8(payload.len() as u8);
    buf.put_u8(opcode);
    buf.put_slice(payload);
    let mut crc_input = Vec::with_capacity(1 + payload.len());
    crc_input.push(opcode);
    crc_input.extend_from_slice(payload);
    buf.put_u16(crc16(&crc_input));
    Ok(buf.to_vec())
}

/// Result of attempting to decode a frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete frame was decoded; the `usize` is the number of bytes
    /// consumed from the input (including any skipped pre-SOH noise).
    Frame(RawFrame, usize),
    /// The buffer does not yet contain a complete frame.
    Incomplete,
}

/// Attempt to decode one frame from a byte buffer.
///
/// Bytes before the first SOH are skipped as line noise, up to a bounded
/// lookahead; beyond that the stream is considered desynchronized and
/// decode fails with [`Error::Malformed`]. A frame whose trailer CRC does
/// not match the received opcode and payload fails with
/// [`Error::CrcMismatch`].
pub fn decode_frame(buf: &[u8]) -> Result<DecodeResult> {
    let soh_pos = match buf.iter().take(SOH_LOOKAHEAD).position(|&b| b == SOH) {
        Some(pos) => pos,
        None if buf.len() >= SOH_LOOKAHEAD => {
            return Err(Error::Malformed(format!(
                "no SOH within {SOH_LOOKAHEAD} bytes"
            )));
        }
        None => return Ok(DecodeResult::Incomplete),
    };

    let frame = &buf[soh_pos..];
    if frame.len() < 3 {
        return Ok(DecodeResult::Incomplete);
    }

    let len = frame[1] as usize;
    let opcode = frame[2];
    let total = OVERHEAD + len;
    if frame.len() < total {
        return Ok(DecodeResult::Incomplete);
    }

    let payload = &frame[3..3 + len];
    let actual = u16::from_be_bytes([frame[3 + len], frame[4 + len]]);
    let mut crc_input = Vec::with_capacity(1 + len);
    crc_input.push(opcode);
    crc_input.extend_from_slice(payload);
    let expected = crc16(&crc_input);
    if expected != actual {
        return Err(Error::CrcMismatch { expected, actual });
    }

    Ok(DecodeResult::Frame(
        RawFrame {
            opcode,
            payload: payload.to_vec(),
        },
        soh_pos + total,
    ))
}

/// Read one complete frame from a transport under a single deadline.
///
/// `rx` is the connection's receive buffer: bytes read past the end of
/// one frame stay buffered for the next call, which is what keeps
/// back-to-back streamed reports from being dropped. On success the
/// frame's bytes are drained from `rx`; on a decode failure (CRC
/// mismatch, desynchronized stream) `rx` is cleared so the link can
/// resynchronize on the next SOH.
pub async fn read_frame(
    transport: &mut dyn Transport,
    rx: &mut Vec<u8>,
    timeout: Duration,
) -> Result<RawFrame> {
    let deadline = Instant::now() + timeout;
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        match decode_frame(rx) {
            Ok(DecodeResult::Frame(frame, consumed)) => {
                rx.drain(..consumed);
                return Ok(frame);
            }
            Ok(DecodeResult::Incomplete) => {}
            Err(e) => {
                rx.clear();
                return Err(e);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::Timeout);
        }
        let n = transport.receive(&mut chunk, deadline - now).await?;
        rx.extend_from_slice(&chunk[..n]);
    }
}
