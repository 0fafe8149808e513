//! EapiReader -- the [`Reader`] trait implementation for embedded serial
//! modules.
//!
//! This module ties the frame codec ([`frame`](crate::frame),
//! [`commands`](crate::commands)) to a [`Transport`] to produce a working
//! serial backend. All wire traffic funnels through a single command
//! mutex guarding the transport, so caller commands and the background
//! engine never interleave frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use rfidlib_core::error::{Error, Result};
use rfidlib_core::listener::{
    ListenerRegistry, ReadExceptionListener, ReadListener, StatusListener, StatusReport,
    TransportEvent, TransportListener,
};
use rfidlib_core::params::{names, ParamValue};
use rfidlib_core::plan::ReadPlan;
use rfidlib_core::reader::Reader;
use rfidlib_core::tagop::{Gen2Password, TagFilter, TagOp};
use rfidlib_core::transport::Transport;
use rfidlib_core::types::{GpioPin, Region, TagProtocol, TagReadData, VersionInfo};
use rfidlib_transport::{SerialTransport, DEFAULT_BAUD_RATE};

use crate::commands;
use crate::engine::Engine;
use crate::frame::{encode_frame, read_frame};
use crate::msg::{fault, strip_status};
use crate::registry::{ParamHook, ParamRegistry};

/// Default transport timeout, milliseconds.
const DEFAULT_TRANSPORT_TIMEOUT_MS: i32 = 5000;
/// Default command timeout, milliseconds.
const DEFAULT_COMMAND_TIMEOUT_MS: i32 = 1000;
/// Default background read-cycle on time, milliseconds.
const DEFAULT_ASYNC_ON_TIME_MS: i32 = 250;

/// A connected embedded-module reader driven over the serial frame
/// protocol.
///
/// Constructed by the facade crate's `create()` from an `eapi:///...` or
/// `tmr:///...` URI, or directly with an injected transport for tests.
pub struct EapiReader {
    inner: Arc<ReaderInner>,
}

/// The open link: the transport plus its receive buffer.
///
/// Bytes read past the end of one frame (streamed reports arrive in
/// bursts) stay in `rx` for the next read. Both travel together behind
/// the command mutex.
pub(crate) struct Link {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) rx: Vec<u8>,
}

impl Link {
    fn new(transport: Box<dyn Transport>) -> Self {
        Link {
            transport,
            rx: Vec::new(),
        }
    }
}

/// Shared state behind the public handle; background workers hold their
/// own `Arc` to it.
pub(crate) struct ReaderInner {
    uri: String,
    /// Serial device node; `None` when the transport was injected.
    device: Option<String>,
    /// The command mutex. Exactly one frame exchange runs at a time; the
    /// continuous engine holds this for the lifetime of a stream.
    pub(crate) transport: Arc<AsyncMutex<Option<Link>>>,
    connected: AtomicBool,
    params: Mutex<ParamRegistry>,
    version: Mutex<Option<VersionInfo>>,
    /// Protocol most recently configured on the module.
    current_protocol: Mutex<Option<TagProtocol>>,
    /// Antenna most recently configured on the module.
    current_antenna: Mutex<Option<u8>>,
    pub(crate) read_listeners: ListenerRegistry<dyn ReadListener>,
    pub(crate) exception_listeners: ListenerRegistry<dyn ReadExceptionListener>,
    pub(crate) status_listeners: ListenerRegistry<dyn StatusListener>,
    transport_listeners: ListenerRegistry<dyn TransportListener>,
    pub(crate) engine: Engine,
}

impl EapiReader {
    /// Create a reader for a serial device node. The port is not opened
    /// until [`connect`](Reader::connect).
    pub fn new(device: &str, uri: &str) -> Self {
        Self::build(Some(device.to_string()), None, uri)
    }

    /// Create a reader over an already-open transport.
    ///
    /// Used by tests (mock transports) and by callers that manage the
    /// physical link themselves. `connect` still performs the handshake.
    pub fn with_transport(transport: Box<dyn Transport>, uri: &str) -> Self {
        Self::build(None, Some(transport), uri)
    }

    fn build(device: Option<String>, transport: Option<Box<dyn Transport>>, uri: &str) -> Self {
        let mut params = ParamRegistry::new();
        params.add(
            names::READ_ASYNC_ON_TIME,
            ParamValue::Int(DEFAULT_ASYNC_ON_TIME_MS),
            true,
            ParamHook::AsyncTime,
        );
        params.add(
            names::READ_ASYNC_OFF_TIME,
            ParamValue::Int(0),
            true,
            ParamHook::AsyncTime,
        );
        params.add(
            names::GEN2_ACCESS_PASSWORD,
            ParamValue::Password(Gen2Password::default()),
            true,
            ParamHook::None,
        );
        params.add(
            names::URI,
            ParamValue::String(uri.to_string()),
            false,
            ParamHook::Uri,
        );
        params.add(
            names::TRANSPORT_TIMEOUT,
            ParamValue::Int(DEFAULT_TRANSPORT_TIMEOUT_MS),
            true,
            ParamHook::TransportTimeout,
        );
        params.add(
            names::COMMAND_TIMEOUT,
            ParamValue::Int(DEFAULT_COMMAND_TIMEOUT_MS),
            true,
            ParamHook::CommandTimeout,
        );

        EapiReader {
            inner: Arc::new(ReaderInner {
                uri: uri.to_string(),
                device,
                transport: Arc::new(AsyncMutex::new(transport.map(Link::new))),
                connected: AtomicBool::new(false),
                params: Mutex::new(params),
                version: Mutex::new(None),
                current_protocol: Mutex::new(None),
                current_antenna: Mutex::new(None),
                read_listeners: ListenerRegistry::new(),
                exception_listeners: ListenerRegistry::new(),
                status_listeners: ListenerRegistry::new(),
                transport_listeners: ListenerRegistry::new(),
                engine: Engine::new(),
            }),
        }
    }

    /// The version info captured during the connect handshake.
    pub fn version_info(&self) -> Option<VersionInfo> {
        self.inner
            .version
            .lock()
            .expect("version lock poisoned")
            .clone()
    }
}

impl ReaderInner {
    pub(crate) fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    // -- cached parameter access -------------------------------------------

    fn cached_value(&self, name: &str) -> Option<ParamValue> {
        self.params
            .lock()
            .expect("param registry poisoned")
            .lookup(name)
            .map(|(_, s)| s.value)
    }

    fn cached_int(&self, name: &str, default: i32) -> i32 {
        self.cached_value(name)
            .and_then(|v| v.as_int())
            .unwrap_or(default)
    }

    pub(crate) fn transport_timeout_ms(&self) -> u64 {
        self.cached_int(names::TRANSPORT_TIMEOUT, DEFAULT_TRANSPORT_TIMEOUT_MS) as u64
    }

    pub(crate) fn command_timeout_ms(&self) -> u64 {
        self.cached_int(names::COMMAND_TIMEOUT, DEFAULT_COMMAND_TIMEOUT_MS) as u64
    }

    pub(crate) fn async_on_time_ms(&self) -> u32 {
        self.cached_int(names::READ_ASYNC_ON_TIME, DEFAULT_ASYNC_ON_TIME_MS).max(0) as u32
    }

    pub(crate) fn async_off_time_ms(&self) -> u32 {
        self.cached_int(names::READ_ASYNC_OFF_TIME, 0).max(0) as u32
    }

    fn cached_password(&self) -> Gen2Password {
        self.cached_value(names::GEN2_ACCESS_PASSWORD)
            .and_then(|v| v.as_password())
            .unwrap_or_default()
    }

    fn cached_read_plan(&self) -> ReadPlan {
        self.cached_value(names::READ_PLAN)
            .and_then(|v| v.as_read_plan().cloned())
            .unwrap_or_default()
    }

    fn cached_tagop_protocol(&self) -> TagProtocol {
        self.cached_value(names::TAGOP_PROTOCOL)
            .and_then(|v| v.as_protocol())
            .unwrap_or(TagProtocol::Gen2)
    }

    pub(crate) fn plan_protocol(&self) -> TagProtocol {
        match self.cached_read_plan() {
            ReadPlan::Simple(p) => p.protocol,
            ReadPlan::Multi(m) => m
                .plans
                .first()
                .map(|p| p.protocol)
                .unwrap_or(TagProtocol::Gen2),
        }
    }

    // -- wire traffic --------------------------------------------------------

    fn notify_transport(&self, tx: bool, data: &[u8], timeout: Duration) {
        if self.transport_listeners.is_empty() {
            return;
        }
        let event = TransportEvent {
            tx,
            data: data.to_vec(),
            timeout,
        };
        self.transport_listeners.notify_all(|l| l.message(&event));
    }

    /// One framed command/response exchange on an already-locked link.
    /// `extra_ms` stretches the deadline for operations with their own
    /// duration (timed reads).
    ///
    /// Responses are correlated by opcode: frames for other opcodes
    /// (residual streamed reports, mostly) are discarded until the
    /// matching response arrives or the deadline passes.
    pub(crate) async fn exchange(
        &self,
        link: &mut Link,
        opcode: u8,
        payload: &[u8],
        extra_ms: u64,
    ) -> Result<Vec<u8>> {
        let frame_bytes = encode_frame(opcode, payload)?;
        let timeout = Duration::from_millis(
            self.transport_timeout_ms() + self.command_timeout_ms() + extra_ms,
        );

        link.transport.send(&frame_bytes).await?;
        self.notify_transport(true, &frame_bytes, timeout);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let raw = read_frame(link.transport.as_mut(), &mut link.rx, deadline - now).await?;
            if let Ok(bytes) = encode_frame(raw.opcode, &raw.payload) {
                self.notify_transport(false, &bytes, timeout);
            }
            if raw.opcode == opcode {
                return strip_status(&raw.payload).map(|data| data.to_vec());
            }
            tracing::trace!(
                got = raw.opcode,
                expected = opcode,
                "discarding out-of-band frame"
            );
        }
    }

    /// Acquire the command mutex, run one exchange, and account for
    /// connection-fatal failures.
    pub(crate) async fn command(&self, opcode: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let mut guard = self.transport.lock().await;
        let link = guard.as_mut().ok_or(Error::NotConnected)?;
        let result = self.exchange(link, opcode, payload, 0).await;
        if let Err(e) = &result {
            if e.is_fatal_to_connection() {
                self.drop_link(&mut guard);
            }
        }
        result
    }

    fn drop_link(&self, guard: &mut Option<Link>) {
        *guard = None;
        self.connected.store(false, Ordering::SeqCst);
        tracing::warn!(uri = %self.uri, "connection lost; handle marked disconnected");
    }

    /// Configure the module's active protocol if it differs from what was
    /// last set. Must run under the command mutex held by the caller.
    pub(crate) async fn ensure_protocol_on(
        &self,
        link: &mut Link,
        protocol: TagProtocol,
    ) -> Result<()> {
        let already = {
            *self
                .current_protocol
                .lock()
                .expect("protocol cache poisoned")
                == Some(protocol)
        };
        if already {
            return Ok(());
        }
        let (opcode, payload) = commands::set_tag_protocol(protocol);
        self.exchange(link, opcode, &payload, 0).await?;
        *self
            .current_protocol
            .lock()
            .expect("protocol cache poisoned") = Some(protocol);
        Ok(())
    }

    /// Configure the module's active antenna if it differs from what was
    /// last set. Must run under the command mutex held by the caller.
    async fn ensure_antenna_on(&self, link: &mut Link, antenna: u8) -> Result<()> {
        let already = {
            *self.current_antenna.lock().expect("antenna cache poisoned") == Some(antenna)
        };
        if already {
            return Ok(());
        }
        let (opcode, payload) = commands::set_antenna_port(antenna);
        self.exchange(link, opcode, &payload, 0).await?;
        *self.current_antenna.lock().expect("antenna cache poisoned") = Some(antenna);
        Ok(())
    }

    // -- connect / destroy ----------------------------------------------------

    async fn connect_inner(&self) -> Result<()> {
        if self.connected() {
            return Ok(());
        }

        let mut guard = self.transport.lock().await;
        if guard.is_none() {
            let device = self.device.as_deref().ok_or(Error::NotConnected)?;
            let transport = SerialTransport::open(device, DEFAULT_BAUD_RATE).await?;
            *guard = Some(Link::new(Box::new(transport)));
        }

        match self.bootstrap(&mut guard).await {
            Ok(()) => {
                self.connected.store(true, Ordering::SeqCst);
                info!(uri = %self.uri, "reader connected");
                Ok(())
            }
            Err(e) => {
                // A failed connect leaves the handle disconnected.
                *guard = None;
                Err(e)
            }
        }
    }

    async fn bootstrap(&self, guard: &mut Option<Link>) -> Result<()> {
        let link = guard.as_mut().ok_or(Error::NotConnected)?;

        // Version handshake.
        let (opcode, payload) = commands::get_version();
        let data = self.exchange(link, opcode, &payload, 0).await?;
        let version = commands::parse_version(&data)?;
        debug!(
            firmware = %version.firmware_string(),
            hardware = %version.hardware_string(),
            "version handshake complete"
        );

        // Install the post-connect parameter set.
        {
            let mut params = self.params.lock().expect("param registry poisoned");
            params.add(
                names::REGION_ID,
                ParamValue::Region(Region::Unspec),
                true,
                ParamHook::RegionId,
            );
            params.add(
                names::READ_PLAN,
                ParamValue::ReadPlan(ReadPlan::default()),
                true,
                ParamHook::None,
            );
            params.add(
                names::ANTENNA_PORT_LIST,
                ParamValue::U8List(Vec::new()),
                false,
                ParamHook::PortList,
            );
            params.add(
                names::VERSION_SOFTWARE,
                ParamValue::String(version.firmware_string()),
                false,
                ParamHook::None,
            );
            params.add(
                names::VERSION_MODEL,
                ParamValue::String(version.hardware_string()),
                false,
                ParamHook::None,
            );
            params.add_unconfirmed(
                names::VERSION_SERIAL,
                ParamValue::String(String::new()),
                false,
                ParamHook::SerialNumber,
            );
            params.add(
                names::RADIO_READ_POWER,
                ParamValue::Int(0),
                true,
                ParamHook::ReadPower,
            );
            params.add(
                names::BAUD_RATE,
                ParamValue::Int(DEFAULT_BAUD_RATE as i32),
                true,
                ParamHook::BaudRate,
            );
            params.add(
                names::TAGOP_ANTENNA,
                ParamValue::Int(1),
                true,
                ParamHook::TagopAntenna,
            );
            params.add(
                names::TAGOP_PROTOCOL,
                ParamValue::Protocol(TagProtocol::Gen2),
                true,
                ParamHook::None,
            );
        }
        *self.version.lock().expect("version lock poisoned") = Some(version);

        // Read the region, applying the NA fallback for cold devices.
        let (opcode, payload) = commands::get_region();
        let data = self.exchange(link, opcode, &payload, 0).await?;
        let mut region = commands::parse_region(&data)?;
        if region == Region::Unspec {
            let (opcode, payload) = commands::set_region(Region::Na)?;
            self.exchange(link, opcode, &payload, 0).await?;
            region = Region::Na;
            info!("device reported region UNSPEC; defaulting to NA");
        }
        self.params
            .lock()
            .expect("param registry poisoned")
            .set_value(&names::REGION_ID.to_lowercase(), ParamValue::Region(region));

        Ok(())
    }

    async fn destroy_inner(&self) {
        self.engine.shutdown().await;
        let mut guard = self.transport.lock().await;
        if let Some(mut link) = guard.take() {
            let _ = link.transport.close().await;
        }
        self.connected.store(false, Ordering::SeqCst);
        debug!(uri = %self.uri, "reader destroyed");
    }

    // -- reading ----------------------------------------------------------------

    /// One synchronous read of the active plan. Shared by the public
    /// `read()` and the polled background worker.
    pub(crate) async fn sync_read(&self, duration_ms: u32) -> Result<Vec<TagReadData>> {
        self.check_connected()?;
        let plan = self.cached_read_plan();
        let password = self.cached_password();
        let mut tags = Vec::new();

        for (simple, slice_ms) in plan.schedule(duration_ms) {
            let duration = slice_ms.min(u32::from(u16::MAX)) as u16;
            let mut guard = self.transport.lock().await;
            let link = guard.as_mut().ok_or(Error::NotConnected)?;

            self.ensure_protocol_on(link, simple.protocol).await?;
            if let [antenna] = simple.antennas.as_slice() {
                self.ensure_antenna_on(link, *antenna).await?;
            }

            let embedded = simple.op.as_ref().map(|op| (op, password));
            let (opcode, payload) =
                commands::read_tag_id_multiple(duration, simple.filter.as_ref(), embedded)?;
            let result = self
                .exchange(link, opcode, &payload, u64::from(slice_ms))
                .await;
            match result {
                Ok(data) => tags.extend(commands::parse_tag_records(&data, simple.protocol)?),
                // An empty field is not an error for a timed read.
                Err(e) if e.fault_code() == Some(fault::NO_TAGS_FOUND) => {}
                Err(e) => {
                    if e.is_fatal_to_connection() {
                        self.drop_link(&mut guard);
                    }
                    return Err(e);
                }
            }
        }
        Ok(tags)
    }

    async fn execute_tag_op_inner(
        &self,
        op: &TagOp,
        filter: Option<&TagFilter>,
    ) -> Result<Vec<u8>> {
        self.check_connected()?;
        op.validate()?;

        let protocol = match op.protocol() {
            TagProtocol::Iso180006b => TagProtocol::Iso180006b,
            _ => self.cached_tagop_protocol(),
        };
        let antenna = self.cached_int(names::TAGOP_ANTENNA, 1).clamp(1, 16) as u8;
        let password = self.cached_password();
        let timeout = self.command_timeout_ms().min(u64::from(u16::MAX)) as u16;

        let (opcode, payload) = commands::tag_op(op, filter, timeout, password)?;

        let mut guard = self.transport.lock().await;
        let link = guard.as_mut().ok_or(Error::NotConnected)?;
        self.ensure_antenna_on(link, antenna).await?;
        self.ensure_protocol_on(link, protocol).await?;
        let result = self.exchange(link, opcode, &payload, 0).await;
        if let Err(e) = &result {
            if e.is_fatal_to_connection() {
                self.drop_link(&mut guard);
            }
        }
        result
    }

    // -- parameter orchestration ---------------------------------------------

    async fn run_get_hook(&self, hook: ParamHook, cached: ParamValue) -> Result<ParamValue> {
        match hook {
            ParamHook::None
            | ParamHook::AsyncTime
            | ParamHook::TransportTimeout
            | ParamHook::CommandTimeout
            | ParamHook::RegionId
            | ParamHook::BaudRate
            | ParamHook::TagopAntenna => Ok(cached),
            ParamHook::Uri => Ok(ParamValue::String(self.uri.clone())),
            ParamHook::PortList => {
                let (opcode, payload) = commands::get_antenna_ports();
                let data = self.command(opcode, &payload).await?;
                Ok(ParamValue::U8List(commands::parse_antenna_ports(&data)?))
            }
            ParamHook::SerialNumber => {
                let (opcode, payload) = commands::get_hardware_version();
                let data = self.command(opcode, &payload).await?;
                let (_revision, serial) = commands::parse_hardware_version(&data)?;
                Ok(ParamValue::String(serial))
            }
            ParamHook::ReadPower => {
                let (opcode, payload) = commands::get_read_power();
                let data = self.command(opcode, &payload).await?;
                Ok(ParamValue::Int(commands::parse_read_power(&data)?))
            }
        }
    }

    async fn run_set_hook(
        &self,
        hook: ParamHook,
        name: &str,
        value: ParamValue,
    ) -> Result<ParamValue> {
        match hook {
            ParamHook::None => Ok(value),
            ParamHook::AsyncTime | ParamHook::TransportTimeout | ParamHook::CommandTimeout => {
                check_u16_range(name, &value)?;
                Ok(value)
            }
            ParamHook::TagopAntenna => {
                let antenna = value.as_int().unwrap_or(0);
                if !(1..=16).contains(&antenna) {
                    return Err(Error::InvalidArgument(format!(
                        "antenna {antenna} out of range [1, 16] for '{name}'"
                    )));
                }
                Ok(value)
            }
            ParamHook::RegionId => {
                let region = value
                    .as_region()
                    .ok_or_else(|| Error::InvalidArgument(format!("'{name}' takes a region")))?;
                let (opcode, payload) = commands::set_region(region)?;
                self.command(opcode, &payload).await?;
                Ok(value)
            }
            ParamHook::ReadPower => {
                check_u16_range(name, &value)?;
                let power = value.as_int().unwrap_or(0) as u16;
                let (opcode, payload) = commands::set_read_power(power);
                self.command(opcode, &payload).await?;
                Ok(value)
            }
            ParamHook::BaudRate => {
                let baud = value.as_int().unwrap_or(0);
                if baud <= 0 {
                    return Err(Error::InvalidArgument(format!(
                        "baud rate {baud} is not positive for '{name}'"
                    )));
                }
                // The rate switch must happen in the same critical section
                // as the command, or an interleaved exchange would run at
                // the wrong speed.
                let mut guard = self.transport.lock().await;
                let link = guard.as_mut().ok_or(Error::NotConnected)?;
                let (opcode, payload) = commands::set_baud_rate(baud as u32);
                self.exchange(link, opcode, &payload, 0).await?;
                link.transport.set_baud_rate(baud as u32).await?;
                Ok(value)
            }
            ParamHook::Uri | ParamHook::PortList | ParamHook::SerialNumber => {
                Err(Error::ReadOnly(name.to_string()))
            }
        }
    }

    pub(crate) async fn param_get(&self, name: &str) -> Result<ParamValue> {
        let looked = {
            self.params
                .lock()
                .expect("param registry poisoned")
                .lookup(name)
        };
        let (key, setting) = looked.ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
        if !self.connected() && !setting.hook.preconnect() {
            return Err(Error::NotConnected);
        }

        if !setting.confirmed {
            return match self.run_get_hook(setting.hook, setting.value.clone()).await {
                Ok(value) => {
                    self.params
                        .lock()
                        .expect("param registry poisoned")
                        .confirm(&key, value.clone());
                    Ok(value)
                }
                Err(probe_err) => {
                    debug!(
                        param = %setting.original_name,
                        error = %probe_err,
                        "capability probe failed; removing parameter"
                    );
                    self.params
                        .lock()
                        .expect("param registry poisoned")
                        .remove(&key);
                    Err(Error::UnknownParameter(name.to_string()))
                }
            };
        }

        let value = self.run_get_hook(setting.hook, setting.value).await?;
        self.params
            .lock()
            .expect("param registry poisoned")
            .set_value(&key, value.clone());
        Ok(value)
    }

    pub(crate) async fn param_set(&self, name: &str, value: ParamValue) -> Result<()> {
        let looked = {
            self.params
                .lock()
                .expect("param registry poisoned")
                .lookup(name)
        };
        let (key, setting) = looked.ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
        if !self.connected() && !setting.hook.preconnect() {
            return Err(Error::NotConnected);
        }

        if !setting.confirmed {
            match self.run_get_hook(setting.hook, setting.value.clone()).await {
                Ok(probed) => {
                    self.params
                        .lock()
                        .expect("param registry poisoned")
                        .confirm(&key, probed);
                }
                Err(_) => {
                    self.params
                        .lock()
                        .expect("param registry poisoned")
                        .remove(&key);
                    return Err(Error::UnknownParameter(name.to_string()));
                }
            }
        }

        if !setting.writable {
            return Err(Error::ReadOnly(setting.original_name));
        }
        if value.param_type() != setting.ptype {
            return Err(Error::TypeMismatch {
                param: setting.original_name,
                expected: setting.ptype.to_string(),
                actual: value.param_type().to_string(),
            });
        }

        let value = self
            .run_set_hook(setting.hook, &setting.original_name, value)
            .await?;
        self.params
            .lock()
            .expect("param registry poisoned")
            .set_value(&key, value);
        Ok(())
    }

    pub(crate) async fn param_list(&self) -> Vec<String> {
        let keys = {
            self.params
                .lock()
                .expect("param registry poisoned")
                .keys_sorted()
        };
        let mut listed = Vec::with_capacity(keys.len());
        for key in keys {
            let looked = {
                self.params
                    .lock()
                    .expect("param registry poisoned")
                    .lookup(&key)
            };
            let Some((_, setting)) = looked else { continue };
            if !setting.confirmed {
                match self.run_get_hook(setting.hook, setting.value.clone()).await {
                    Ok(value) => {
                        self.params
                            .lock()
                            .expect("param registry poisoned")
                            .confirm(&key, value);
                    }
                    Err(_) => {
                        self.params
                            .lock()
                            .expect("param registry poisoned")
                            .remove(&key);
                        continue;
                    }
                }
            }
            listed.push(setting.original_name);
        }
        listed
    }

    // -- listener delivery -----------------------------------------------------

    pub(crate) fn notify_read(&self, tag: &TagReadData, use_default: bool) {
        if !self.read_listeners.is_empty() {
            self.read_listeners.notify_all(|l| l.tag_read(tag));
        } else if use_default {
            info!(
                uri = %self.uri,
                antenna = tag.antenna,
                protocol = %tag.tag.protocol,
                epc = %tag.tag.epc_hex(),
                rssi = tag.rssi,
                "tag read"
            );
        }
    }

    pub(crate) fn notify_exception(&self, error: &Error, use_default: bool) {
        if !self.exception_listeners.is_empty() {
            self.exception_listeners
                .notify_all(|l| l.tag_read_exception(error));
        } else if use_default {
            tracing::warn!(uri = %self.uri, error = %error, "background read exception");
        }
    }

    pub(crate) fn notify_status(&self, status: &StatusReport) {
        self.status_listeners.notify_all(|l| l.status_message(status));
    }
}

#[async_trait]
impl Reader for EapiReader {
    async fn connect(&self) -> Result<()> {
        self.inner.connect_inner().await
    }

    async fn destroy(&self) {
        self.inner.destroy_inner().await;
    }

    fn is_connected(&self) -> bool {
        self.inner.connected()
    }

    async fn read(&self, duration_ms: u32) -> Result<Vec<TagReadData>> {
        self.inner.sync_read(duration_ms).await
    }

    async fn execute_tag_op(&self, op: &TagOp, filter: Option<&TagFilter>) -> Result<Vec<u8>> {
        self.inner.execute_tag_op_inner(op, filter).await
    }

    async fn start_reading(&self) -> Result<()> {
        self.inner.check_connected()?;
        self.inner.engine.start(Arc::clone(&self.inner)).await
    }

    async fn stop_reading(&self) {
        self.inner.engine.stop().await;
    }

    async fn gpi_get(&self) -> Result<Vec<GpioPin>> {
        self.inner.check_connected()?;
        let (opcode, payload) = commands::gpio_get();
        let data = self.inner.command(opcode, &payload).await?;
        commands::parse_gpio_inputs(&data)
    }

    async fn gpo_set(&self, pins: &[GpioPin]) -> Result<()> {
        self.inner.check_connected()?;
        let (opcode, payload) = commands::gpio_set(pins)?;
        self.inner.command(opcode, &payload).await.map(|_| ())
    }

    async fn param_get(&self, name: &str) -> Result<ParamValue> {
        self.inner.param_get(name).await
    }

    async fn param_set(&self, name: &str, value: ParamValue) -> Result<()> {
        self.inner.param_set(name, value).await
    }

    async fn param_list(&self) -> Vec<String> {
        self.inner.param_list().await
    }

    fn add_read_listener(&self, listener: Arc<dyn ReadListener>) {
        self.inner.read_listeners.add(listener);
    }

    fn remove_read_listener(&self, listener: &Arc<dyn ReadListener>) -> bool {
        self.inner.read_listeners.remove(listener)
    }

    fn add_read_exception_listener(&self, listener: Arc<dyn ReadExceptionListener>) {
        self.inner.exception_listeners.add(listener);
    }

    fn remove_read_exception_listener(&self, listener: &Arc<dyn ReadExceptionListener>) -> bool {
        self.inner.exception_listeners.remove(listener)
    }

    fn add_status_listener(&self, listener: Arc<dyn StatusListener>) {
        self.inner.status_listeners.add(listener);
    }

    fn remove_status_listener(&self, listener: &Arc<dyn StatusListener>) -> bool {
        self.inner.status_listeners.remove(listener)
    }

    fn add_transport_listener(&self, listener: Arc<dyn TransportListener>) {
        self.inner.transport_listeners.add(listener);
    }

    fn remove_transport_listener(&self, listener: &Arc<dyn TransportListener>) -> bool {
        self.inner.transport_listeners.remove(listener)
    }
}

/// Reject integer parameter values outside [0, 65535].
fn check_u16_range(name: &str, value: &ParamValue) -> Result<()> {
    let v = value.as_int().unwrap_or(-1);
    if !(0..=i32::from(u16::MAX)).contains(&v) {
        return Err(Error::InvalidArgument(format!(
            "value {v} out of range [0, 65535] for '{name}'"
        )));
    }
    Ok(())
}
