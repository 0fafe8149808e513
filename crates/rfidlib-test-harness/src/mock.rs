//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. This lets you test frame encoding, command
//! generation, and response parsing without real hardware.
//!
//! The transport itself is usually moved into a reader at construction,
//! so scripting happens through the [`MockScript`] handle obtained from
//! [`MockTransport::script`], which shares state with the transport:
//!
//! ```
//! use rfidlib_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! let script = mock.script();
//! // When the engine sends this request, deliver this response.
//! script.expect(&[0xFF, 0x00, 0x03, 0xD1, 0x93],
//!               &[0xFF, 0x01, 0x03, 0x00, 0x48, 0x5C]);
//! ```
//!
//! Responses may contain any number of frames; continuous-read streams
//! are scripted by pushing unsolicited bytes with
//! [`MockScript::push_rx`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use rfidlib_core::error::{Error, Result};
use rfidlib_core::transport::Transport;

/// How often a blocked `receive` re-checks the byte queue.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A pre-loaded request/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes queued for delivery when the matching request arrives.
    response: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes pending delivery to `receive()`.
    rx_queue: VecDeque<u8>,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
    /// Requested baud rates, in order.
    baud_log: Vec<u32>,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; the paired
/// response bytes are appended to the receive queue. `receive()` drains
/// the queue, waiting up to its timeout for bytes to appear (so streamed
/// frames pushed from a test task are picked up).
#[derive(Debug)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

/// Scripting handle sharing state with a [`MockTransport`].
///
/// Cheap to clone; lives happily on the test side while the transport is
/// owned by the reader under test.
#[derive(Debug, Clone)]
pub struct MockScript {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(Inner {
                connected: true,
                ..Inner::default()
            })),
        }
    }

    /// Obtain a scripting handle for this transport.
    pub fn script(&self) -> MockScript {
        MockScript {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScript {
    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, `response`
    /// is queued for delivery through `receive()`.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.inner
            .lock()
            .expect("mock transport poisoned")
            .expectations
            .push_back(Expectation {
                request: request.to_vec(),
                response: response.to_vec(),
            });
    }

    /// Queue unsolicited bytes for delivery (streamed continuous-read
    /// frames).
    pub fn push_rx(&self, data: &[u8]) {
        self.inner
            .lock()
            .expect("mock transport poisoned")
            .rx_queue
            .extend(data.iter().copied());
    }

    /// All data sent through the transport so far, one entry per `send()`.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .expect("mock transport poisoned")
            .sent_log
            .clone()
    }

    /// The number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.inner
            .lock()
            .expect("mock transport poisoned")
            .expectations
            .len()
    }

    /// Baud rates requested via `set_baud_rate`, in order.
    pub fn baud_changes(&self) -> Vec<u32> {
        self.inner
            .lock()
            .expect("mock transport poisoned")
            .baud_log
            .clone()
    }

    /// Force the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.inner
            .lock()
            .expect("mock transport poisoned")
            .connected = connected;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().expect("mock transport poisoned");
        if !inner.connected {
            return Err(Error::NotConnected);
        }

        inner.sent_log.push(data.to_vec());

        match inner.expectations.pop_front() {
            Some(expectation) => {
                if data != expectation.request.as_slice() {
                    return Err(Error::Transport(format!(
                        "unexpected send data: expected {:02X?}, got {:02X?}",
                        expectation.request, data
                    )));
                }
                inner.rx_queue.extend(expectation.response.iter().copied());
                Ok(())
            }
            None => Err(Error::Transport(
                "no more expectations in mock transport".into(),
            )),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.lock().expect("mock transport poisoned");
                if !inner.connected {
                    return Err(Error::NotConnected);
                }
                if !inner.rx_queue.is_empty() {
                    let n = buf.len().min(inner.rx_queue.len());
                    for slot in buf.iter_mut().take(n) {
                        *slot = inner.rx_queue.pop_front().unwrap_or_default();
                    }
                    return Ok(n);
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut inner = self.inner.lock().expect("mock transport poisoned");
        inner.connected = false;
        inner.rx_queue.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .expect("mock transport poisoned")
            .connected
    }

    async fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        let mut inner = self.inner.lock().expect("mock transport poisoned");
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        inner.baud_log.push(baud);
        Ok(())
    }
}
