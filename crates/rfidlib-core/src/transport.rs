//! Transport trait for reader communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a reader:
//! a serial device node, a TCP socket, or a mock transport for testing.
//! Protocol engines (e.g. the embedded-module codec in `rfidlib-eapi`)
//! operate on a `Transport` rather than directly on a port, enabling both
//! real hardware control and deterministic unit testing.
//!
//! A transport is a plain duplex byte channel: no framing awareness, no
//! retry policy. `send` flushes before returning; every `receive` carries
//! its own timeout.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};

/// Asynchronous byte-level transport to a reader.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the reader, flushing before return.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the reader into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout`
    /// for data to arrive and returns [`Error::Timeout`] if none does.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport.
    ///
    /// Subsequent `send()` and `receive()` calls return
    /// [`Error::NotConnected`].
    async fn close(&mut self) -> Result<()>;

    /// Whether the transport is currently open.
    fn is_connected(&self) -> bool;

    /// Change the link baud rate.
    ///
    /// Only meaningful for serial links; the default returns
    /// [`Error::Unsupported`].
    async fn set_baud_rate(&mut self, _baud: u32) -> Result<()> {
        Err(Error::Unsupported(
            "baud rate selection not supported by this transport".into(),
        ))
    }
}
