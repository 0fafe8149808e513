//! The `Reader` trait -- unified interface for all reader backends.
//!
//! This trait is the primary API surface of rfidlib. Applications program
//! against `dyn Reader` without needing to know which wire protocol
//! (embedded serial, RQL, LLRP) is in use.
//!
//! Reads can be done on demand with [`read`](Reader::read), or
//! continuously in the background with [`start_reading`](Reader::start_reading);
//! background reads deliver tags and errors to registered listeners.
//!
//! Before [`connect`](Reader::connect) succeeds, only the bootstrap
//! parameters (timeouts, async duty cycle, access password, URI) and
//! [`add_transport_listener`](Reader::add_transport_listener) are usable;
//! everything else fails with [`Error::NotConnected`](crate::error::Error::NotConnected).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::listener::{
    ReadExceptionListener, ReadListener, StatusListener, TransportListener,
};
use crate::params::ParamValue;
use crate::tagop::{Gen2LockAction, Gen2MemBank, Gen2Password, TagFilter, TagOp};
use crate::types::{GpioPin, TagData, TagReadData};

/// Unified asynchronous interface for controlling an RFID reader.
///
/// Synchronous operations may be issued concurrently with a background
/// read; all command traffic is serialized internally, so no two commands
/// are ever in flight on the wire at once.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Open the communication channel and initialize the session.
    ///
    /// Performs the version handshake, installs the device-backed
    /// parameters, and reads the regulatory region (falling back to NA
    /// when the device reports it unset). On failure the handle remains
    /// disconnected.
    async fn connect(&self) -> Result<()>;

    /// Shut down the connection. Infallible and idempotent: interrupts
    /// background workers, drains listener queues within a bounded grace
    /// period, and releases the transport.
    async fn destroy(&self);

    /// Whether the handle is currently connected.
    fn is_connected(&self) -> bool;

    /// Read tags for a fixed duration and return everything seen.
    ///
    /// Tags are returned in the order the device reported them.
    async fn read(&self, duration_ms: u32) -> Result<Vec<TagReadData>>;

    /// Execute a tag operation against the first tag matching `filter`
    /// (or the first tag to singulate when `filter` is `None`).
    ///
    /// The effective antenna and protocol come from `/reader/tagop/antenna`
    /// and `/reader/tagop/protocol`. Returns the operation's result bytes;
    /// void operations return an empty vector.
    async fn execute_tag_op(&self, op: &TagOp, filter: Option<&TagFilter>) -> Result<Vec<u8>>;

    /// Start reading tags in the background.
    ///
    /// Tags go to registered read listeners and errors to registered
    /// exception listeners; when none are registered, defaults that log
    /// one line per event are used. Reading continues until
    /// [`stop_reading`](Reader::stop_reading).
    async fn start_reading(&self) -> Result<()>;

    /// Stop background reading.
    ///
    /// Never fails. On return, both delivery queues have drained and no
    /// further listener callbacks will occur.
    async fn stop_reading(&self);

    /// Get the state of the reader's GPIO input pins.
    async fn gpi_get(&self) -> Result<Vec<GpioPin>>;

    /// Drive the reader's GPIO output pins.
    async fn gpo_set(&self, pins: &[GpioPin]) -> Result<()>;

    /// Get the value of a reader parameter.
    async fn param_get(&self, name: &str) -> Result<ParamValue>;

    /// Set the value of a reader parameter.
    async fn param_set(&self, name: &str, value: ParamValue) -> Result<()>;

    /// List the names of the available parameters.
    ///
    /// Lazily-probed parameters are confirmed or permanently removed as a
    /// side effect.
    async fn param_list(&self) -> Vec<String>;

    /// Install a new firmware image on the device.
    ///
    /// Not every backend supports host-driven firmware loads; the default
    /// reports [`Error::Unsupported`].
    async fn firmware_load(&self, _image: &[u8]) -> Result<()> {
        Err(Error::Unsupported(
            "firmware load not supported by this reader".into(),
        ))
    }

    /// Register a listener for background tag reads.
    fn add_read_listener(&self, listener: Arc<dyn ReadListener>);

    /// Remove a previously registered read listener.
    fn remove_read_listener(&self, listener: &Arc<dyn ReadListener>) -> bool;

    /// Register a listener for background read errors.
    fn add_read_exception_listener(&self, listener: Arc<dyn ReadExceptionListener>);

    /// Remove a previously registered exception listener.
    fn remove_read_exception_listener(&self, listener: &Arc<dyn ReadExceptionListener>) -> bool;

    /// Register a listener for reader status reports.
    fn add_status_listener(&self, listener: Arc<dyn StatusListener>);

    /// Remove a previously registered status listener.
    fn remove_status_listener(&self, listener: &Arc<dyn StatusListener>) -> bool;

    /// Register a listener for framed transport traffic.
    ///
    /// Usable before `connect`, so the connect handshake itself can be
    /// traced.
    fn add_transport_listener(&self, listener: Arc<dyn TransportListener>);

    /// Remove a previously registered transport listener.
    fn remove_transport_listener(&self, listener: &Arc<dyn TransportListener>) -> bool;

    /// Read bytes from a tag memory bank.
    ///
    /// Byte-level convenience over word-addressed
    /// [`Gen2ReadData`](TagOp::Gen2ReadData): odd addresses and lengths
    /// are handled by over-reading and slicing.
    async fn read_tag_mem_bytes(
        &self,
        target: Option<&TagFilter>,
        bank: Gen2MemBank,
        byte_address: u32,
        count: u32,
    ) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let start_word = byte_address / 2;
        let end_word = (byte_address + count).div_ceil(2);
        let word_count = end_word - start_word;
        if word_count > 255 {
            return Err(Error::InvalidArgument(format!(
                "read of {count} bytes at {byte_address} spans {word_count} words (max 255)"
            )));
        }
        let op = TagOp::Gen2ReadData {
            bank,
            word_address: start_word,
            word_count: word_count as u8,
        };
        let bytes = self.execute_tag_op(&op, target).await?;
        let offset = (byte_address % 2) as usize;
        if bytes.len() < offset + count as usize {
            return Err(Error::Parse(format!(
                "device returned {} bytes for a {}-byte read",
                bytes.len(),
                count
            )));
        }
        Ok(bytes[offset..offset + count as usize].to_vec())
    }

    /// Write bytes to a tag memory bank.
    ///
    /// The address and length must be word-aligned; tags cannot write
    /// half a word.
    async fn write_tag_mem_bytes(
        &self,
        target: Option<&TagFilter>,
        bank: Gen2MemBank,
        byte_address: u32,
        data: &[u8],
    ) -> Result<()> {
        if byte_address % 2 != 0 || data.len() % 2 != 0 {
            return Err(Error::InvalidArgument(
                "byte-level writes must be word-aligned".into(),
            ));
        }
        let words: Vec<u16> = data
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        let op = TagOp::Gen2WriteData {
            bank,
            word_address: byte_address / 2,
            data: words,
        };
        self.execute_tag_op(&op, target).await.map(|_| ())
    }

    /// Write a new EPC to a tag.
    async fn write_tag(&self, target: Option<&TagFilter>, new_id: TagData) -> Result<()> {
        let op = TagOp::Gen2WriteTag { epc: new_id };
        self.execute_tag_op(&op, target).await.map(|_| ())
    }

    /// Perform a lock or unlock operation on a tag.
    ///
    /// A tag without an access password set may not accept a lock
    /// operation or remain locked.
    async fn lock_tag(&self, target: Option<&TagFilter>, action: Gen2LockAction) -> Result<()> {
        let op = TagOp::Gen2Lock {
            action,
            access_password: None,
        };
        self.execute_tag_op(&op, target).await.map(|_| ())
    }

    /// Kill a tag using its kill password.
    async fn kill_tag(&self, target: Option<&TagFilter>, password: Gen2Password) -> Result<()> {
        let op = TagOp::Gen2Kill {
            kill_password: password,
        };
        self.execute_tag_op(&op, target).await.map(|_| ())
    }
}
