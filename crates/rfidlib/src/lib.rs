//! # rfidlib -- Host-side RFID Reader Control
//!
//! `rfidlib` is an asynchronous Rust library for driving UHF Gen2 (and
//! related) RFID readers: on-demand and background tag reads, tag memory
//! operations (read, write, lock, kill, block-permalock), GPIO, and a
//! `/reader/...` parameter registry, over serial-attached embedded
//! modules or networked readers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rfidlib::{Reader, TagReadData};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> rfidlib::Result<()> {
//!     let reader = rfidlib::create("eapi:///dev/ttyUSB0").await?;
//!     reader.connect().await?;
//!
//!     let tags: Vec<TagReadData> = reader.read(500).await?;
//!     for tag in &tags {
//!         println!("{} (ant {}, {} dBm)", tag.tag.epc_hex(), tag.antenna, tag.rssi);
//!     }
//!
//!     reader.destroy().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                        |
//! |------------------------|------------------------------------------------|
//! | `rfidlib-core`         | Traits ([`Reader`], [`Transport`]), types, errors |
//! | `rfidlib-transport`    | Serial and TCP transport implementations       |
//! | `rfidlib-eapi`         | Embedded-module binary frame protocol driver   |
//! | `rfidlib-test-harness` | Mock transport for protocol-level testing      |
//! | **`rfidlib`**          | This facade crate -- URI factory, re-exports   |
//!
//! All protocol drivers implement the [`Reader`] trait, so application
//! code can work with `dyn Reader` and remain protocol-agnostic.
//!
//! ## Reader URIs
//!
//! [`create`] selects the protocol driver from a URI:
//!
//! - `eapi:///dev/ttyUSB0` -- embedded serial protocol on a local device
//! - `tmr:///dev/ttyUSB0` -- alias for `eapi`
//! - `tmr://host` -- guess: probe LLRP, fall back to RQL
//! - `rql://host[:port]` -- RQL text protocol
//! - `llrp://host[:port]` -- LLRP binary protocol
//!
//! The RQL and LLRP engines live in their own driver crates; with only
//! the embedded-module driver linked, URIs resolving to them report
//! [`Error::Unsupported`].
//!
//! ## Background reads
//!
//! Register listeners, then bracket the stream with
//! [`start_reading`](Reader::start_reading) /
//! [`stop_reading`](Reader::stop_reading):
//!
//! ```no_run
//! use std::sync::Arc;
//! use rfidlib::{ReadListener, Reader, TagReadData};
//!
//! struct Printer;
//! impl ReadListener for Printer {
//!     fn tag_read(&self, tag: &TagReadData) {
//!         println!("{}", tag.tag.epc_hex());
//!     }
//! }
//!
//! # async fn example(reader: &dyn Reader) -> rfidlib::Result<()> {
//! reader.add_read_listener(Arc::new(Printer));
//! reader.start_reading().await?;
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! reader.stop_reading().await;
//! # Ok(())
//! # }
//! ```

pub use rfidlib_core::*;

pub mod uri;

/// Embedded-module serial protocol backend.
pub mod eapi {
    pub use rfidlib_eapi::*;
}

use uri::{ReaderKind, ReaderUri};

/// Create a reader for the device a URI names.
///
/// The communication channel is not established until
/// [`connect`](Reader::connect) is called. Scheme resolution (including
/// the `tmr://host` LLRP-probe-then-RQL guess) happens here; see the
/// [`uri`] module for the grammar.
///
/// # Errors
///
/// [`Error::InvalidUri`] for unparseable URIs or unknown schemes;
/// [`Error::Unsupported`] when the URI resolves to a protocol whose
/// driver crate is not linked into this build.
pub async fn create(uri_string: &str) -> Result<Box<dyn Reader>> {
    let parsed = ReaderUri::parse(uri_string)?;
    match uri::resolve(&parsed).await? {
        ReaderKind::Eapi { device } => {
            Ok(Box::new(rfidlib_eapi::EapiReader::new(&device, uri_string)))
        }
        ReaderKind::Rql { endpoint } => Err(Error::Unsupported(format!(
            "'{uri_string}' resolves to the RQL protocol ({endpoint}); the RQL driver is not linked into this build"
        ))),
        ReaderKind::Llrp { endpoint } => Err(Error::Unsupported(format!(
            "'{uri_string}' resolves to the LLRP protocol ({endpoint}); the LLRP driver is not linked into this build"
        ))),
    }
}
