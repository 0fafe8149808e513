//! rfidlib-eapi: the embedded-module serial protocol engine.
//!
//! Drives readers speaking the length-prefixed, CRC-checked binary frame
//! protocol of embedded UHF modules, whether attached over a local
//! serial port or a serial device server. The public entry point is
//! [`EapiReader`], which implements the
//! [`Reader`](rfidlib_core::Reader) trait; most applications construct
//! it through the facade crate's URI factory rather than directly.
//!
//! Internals:
//!
//! - [`frame`] -- SOH/length/opcode/payload/CRC framing
//! - [`commands`] -- payload builders and response parsers
//! - [`msg`] -- opcode catalog, fault codes, status handling
//! - a parameter registry with lazy capability probing
//! - a background read engine (polled and continuous modes)

pub mod commands;
pub mod frame;
pub mod msg;

mod engine;
mod reader;
mod registry;

pub use reader::EapiReader;
