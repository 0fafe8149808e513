//! rfidlib-core: Core traits, types, and error definitions for rfidlib.
//!
//! This crate defines the protocol-agnostic abstractions that all rfidlib
//! backends implement. Applications depend on these types without pulling
//! in any specific reader driver.
//!
//! # Key types
//!
//! - [`Reader`] -- the unified trait for controlling any RFID reader
//! - [`Transport`] -- byte-level communication channel
//! - [`TagReadData`] / [`TagOp`] -- observed tags and tag operations
//! - [`ListenerRegistry`] -- event delivery for background reads
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod listener;
pub mod params;
pub mod plan;
pub mod reader;
pub mod tagop;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use rfidlib_core::*`.
pub use error::{Error, FaultCategory, ReaderCodeError, Result};
pub use listener::{
    ListenerRegistry, ReadExceptionListener, ReadListener, StatusListener, StatusReport,
    TransportEvent, TransportListener,
};
pub use params::{ParamType, ParamValue};
pub use plan::{MultiReadPlan, ReadPlan, SimpleReadPlan};
pub use reader::Reader;
pub use tagop::{
    Gen2LockAction, Gen2MemBank, Gen2Password, Gen2Select, TagFilter, TagOp,
};
pub use transport::Transport;
pub use types::*;
