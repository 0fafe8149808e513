//! The background read engine.
//!
//! Three workers cooperate per background-read session: one reader task
//! (polled or continuous), one tag notifier, and one exception notifier.
//! The reader task owns all transport traffic; notifiers drain the two
//! bounded queues into the listener registries and never touch the wire.
//!
//! Worker lifecycle follows Idle -> Arming -> Running -> Draining ->
//! Idle. Stop is cooperative: a cancellation token interrupts the reader
//! task between frames, the queue senders drop with it, and the
//! notifiers exit once their queues drain -- so when
//! [`Engine::stop`] returns, both queues are empty and no further
//! listener callbacks can occur.
//!
//! Mode selection happens at arm time: a zero `/reader/read/asyncOffTime`
//! selects the continuous engine (one streaming inventory command, the
//! device pushes reports until stopped); a positive off time selects the
//! polled engine (timed read, enqueue, sleep, repeat).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rfidlib_core::error::Error;
use rfidlib_core::error::Result;
use rfidlib_core::types::{TagProtocol, TagReadData};

use crate::commands::{self, StreamReport};
use crate::frame::read_frame;
use crate::msg::fault;
use crate::reader::{Link, ReaderInner};

/// Capacity of the tag delivery queue.
const TAG_QUEUE_CAPACITY: usize = 1024;
/// Capacity of the exception delivery queue.
const EXCEPTION_QUEUE_CAPACITY: usize = 64;

/// Engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Arming,
    Running,
    Draining,
}

/// Handles to one armed session's workers.
struct Workers {
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    tag_notifier: JoinHandle<()>,
    exception_notifier: JoinHandle<()>,
}

struct EngineState {
    phase: Phase,
    workers: Option<Workers>,
}

/// The background read engine. One per reader handle.
pub(crate) struct Engine {
    state: AsyncMutex<EngineState>,
}

impl Engine {
    pub(crate) fn new() -> Self {
        Engine {
            state: AsyncMutex::new(EngineState {
                phase: Phase::Idle,
                workers: None,
            }),
        }
    }

    /// Arm the engine and start its workers. A no-op when already
    /// running.
    pub(crate) async fn start(&self, inner: Arc<ReaderInner>) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Idle {
            debug!("background read already armed");
            return Ok(());
        }
        state.phase = Phase::Arming;

        // Default listeners are resolved at each arm: a custom listener
        // registered since the last session disables the default.
        let default_read = inner.read_listeners.is_empty();
        let default_exception = inner.exception_listeners.is_empty();

        let (tag_tx, mut tag_rx) = mpsc::channel::<TagReadData>(TAG_QUEUE_CAPACITY);
        let (exc_tx, mut exc_rx) = mpsc::channel::<Error>(EXCEPTION_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();

        let tag_notifier = {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                while let Some(tag) = tag_rx.recv().await {
                    inner.notify_read(&tag, default_read);
                }
            })
        };
        let exception_notifier = {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                while let Some(error) = exc_rx.recv().await {
                    inner.notify_exception(&error, default_exception);
                }
            })
        };

        let continuous = inner.async_off_time_ms() == 0;
        let reader = {
            let inner = Arc::clone(&inner);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if continuous {
                    continuous_loop(inner, cancel, tag_tx, exc_tx).await;
                } else {
                    polled_loop(inner, cancel, tag_tx, exc_tx).await;
                }
            })
        };

        debug!(continuous, "background read armed");
        state.workers = Some(Workers {
            cancel,
            reader,
            tag_notifier,
            exception_notifier,
        });
        state.phase = Phase::Running;
        Ok(())
    }

    /// Stop the engine and wait for both queues to drain. Never fails;
    /// a no-op when idle.
    pub(crate) async fn stop(&self) {
        let mut state = self.state.lock().await;
        let Some(workers) = state.workers.take() else {
            state.phase = Phase::Idle;
            return;
        };
        state.phase = Phase::Draining;

        workers.cancel.cancel();
        // The reader task notices the token between frames and exits,
        // dropping the queue senders; each notifier then drains whatever
        // is left and sees its channel close.
        if workers.reader.await.is_err() {
            warn!("background reader worker panicked");
        }
        let _ = workers.tag_notifier.await;
        let _ = workers.exception_notifier.await;

        state.phase = Phase::Idle;
        debug!("background read stopped; queues drained");
    }

    /// Tear the engine down without waiting for in-flight reads
    /// (`destroy` path). Queued events still drain.
    pub(crate) async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let Some(workers) = state.workers.take() else {
            state.phase = Phase::Idle;
            return;
        };
        state.phase = Phase::Draining;

        workers.cancel.cancel();
        workers.reader.abort();
        let _ = workers.reader.await;
        let _ = workers.tag_notifier.await;
        let _ = workers.exception_notifier.await;

        state.phase = Phase::Idle;
    }
}

/// The polled worker: read for `asyncOnTime`, enqueue, sleep
/// `asyncOffTime`, repeat. Any read error is pushed to the exception
/// queue and parks the loop until stopped.
async fn polled_loop(
    inner: Arc<ReaderInner>,
    cancel: CancellationToken,
    tag_tx: mpsc::Sender<TagReadData>,
    exc_tx: mpsc::Sender<Error>,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let on_time = inner.async_on_time_ms();
        let off_time = inner.async_off_time_ms();

        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            res = inner.sync_read(on_time) => res,
        };

        match result {
            Ok(tags) => {
                for tag in tags {
                    let stopped = tokio::select! {
                        _ = cancel.cancelled() => true,
                        sent = tag_tx.send(tag) => sent.is_err(),
                    };
                    if stopped {
                        return;
                    }
                }
                if off_time > 0 {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(Duration::from_millis(u64::from(off_time))) => {}
                    }
                }
            }
            Err(error) => {
                let _ = exc_tx.send(error).await;
                // Park until stopped; a persistent failure must not spin.
                cancel.cancelled().await;
                return;
            }
        }
    }
}

/// The continuous worker: send one streaming inventory command, then
/// parse unsolicited reports until stopped.
///
/// Holds the command mutex for the whole stream -- callers cannot issue
/// commands until the engine is stopped. Recovery:
/// buffer-full drains and re-arms; a missing antenna is reported but
/// streaming continues; timeouts and anything else end the stream.
async fn continuous_loop(
    inner: Arc<ReaderInner>,
    cancel: CancellationToken,
    tag_tx: mpsc::Sender<TagReadData>,
    exc_tx: mpsc::Sender<Error>,
) {
    let mut guard = tokio::select! {
        _ = cancel.cancelled() => return,
        guard = Arc::clone(&inner.transport).lock_owned() => guard,
    };

    let protocol = inner.plan_protocol();
    let on_time = inner.async_on_time_ms().min(u32::from(u16::MAX)) as u16;

    let Some(link) = guard.as_mut() else {
        let _ = exc_tx.send(Error::NotConnected).await;
        return;
    };

    // Arm the stream.
    if let Err(e) = inner.ensure_protocol_on(link, protocol).await {
        let _ = exc_tx.send(e).await;
        return;
    }
    let (opcode, payload) = commands::continuous_start(on_time);
    if let Err(e) = inner.exchange(link, opcode, &payload, 0).await {
        let _ = exc_tx.send(e).await;
        return;
    }

    // The device reports at least once per on-time while streaming.
    let stream_timeout =
        Duration::from_millis(inner.transport_timeout_ms() + u64::from(on_time));

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => None,
            res = read_frame(link.transport.as_mut(), &mut link.rx, stream_timeout) => Some(res),
        };
        let Some(frame) = frame else {
            // Cooperative stop: quiesce the device before releasing the
            // command mutex.
            let (opcode, payload) = commands::continuous_stop();
            let _ = inner.exchange(link, opcode, &payload, 0).await;
            return;
        };

        match frame {
            Ok(frame) => match commands::parse_stream_report(&frame, protocol) {
                Ok(StreamReport::Tag(tag)) => {
                    let stopped = tokio::select! {
                        _ = cancel.cancelled() => true,
                        sent = tag_tx.send(tag) => sent.is_err(),
                    };
                    if stopped {
                        let (opcode, payload) = commands::continuous_stop();
                        let _ = inner.exchange(link, opcode, &payload, 0).await;
                        return;
                    }
                }
                Ok(StreamReport::Status(status)) => inner.notify_status(&status),
                Err(error) => match error.fault_code() {
                    Some(fault::TAG_ID_BUFFER_FULL) => {
                        let _ = exc_tx.send(error).await;
                        if let Err(rearm_err) =
                            rearm(&inner, link, &tag_tx, protocol, on_time).await
                        {
                            let _ = exc_tx.send(rearm_err).await;
                            return;
                        }
                    }
                    Some(fault::ANTENNA_NOT_CONNECTED) => {
                        // "No Antenna" is worth reporting but not fatal to
                        // the stream.
                        let _ = exc_tx.send(error).await;
                    }
                    _ => {
                        let _ = exc_tx.send(error).await;
                        return;
                    }
                },
            },
            Err(error) => {
                // Timeout, CRC trouble, or a dead link: report once and
                // end the stream.
                let _ = exc_tx.send(error).await;
                return;
            }
        }
    }
}

/// Buffer-full recovery: drain the module's tag buffer into the queue,
/// clear it, and restart the stream.
async fn rearm(
    inner: &Arc<ReaderInner>,
    link: &mut Link,
    tag_tx: &mpsc::Sender<TagReadData>,
    protocol: TagProtocol,
    on_time: u16,
) -> Result<()> {
    debug!("tag buffer full; draining and re-arming");

    let (opcode, payload) = commands::get_tag_buffer();
    let data = inner.exchange(link, opcode, &payload, 0).await?;
    for tag in commands::parse_tag_records(&data, protocol)? {
        if tag_tx.send(tag).await.is_err() {
            return Ok(());
        }
    }

    let (opcode, payload) = commands::clear_tag_buffer();
    inner.exchange(link, opcode, &payload, 0).await?;

    let (opcode, payload) = commands::continuous_start(on_time);
    inner.exchange(link, opcode, &payload, 0).await?;
    Ok(())
}
