//! rfidlib-transport: Serial and TCP transport implementations.
//!
//! This crate provides concrete [`Transport`](rfidlib_core::Transport)
//! implementations for the physical links readers attach over:
//!
//! - [`SerialTransport`] -- USB virtual COM ports and RS-232 (embedded
//!   modules, USB-attached readers)
//! - [`TcpTransport`] -- network-attached readers (RQL, LLRP, serial
//!   device servers)
//!
//! Protocol engines consume the [`Transport`](rfidlib_core::Transport)
//! trait and never see these types directly, which keeps them testable
//! against the mock transport in `rfidlib-test-harness`.

mod serial;
mod tcp;

pub use serial::{SerialTransport, DEFAULT_BAUD_RATE};
pub use tcp::TcpTransport;
