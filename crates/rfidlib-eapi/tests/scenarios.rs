//! End-to-end scenarios against a scripted mock transport.
//!
//! Each test scripts the exact frames the engine is expected to emit and
//! the responses (or streamed reports) the device would answer with,
//! then drives the public `Reader` surface and asserts on what comes
//! back.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rfidlib_core::error::Error;
use rfidlib_core::listener::{ReadExceptionListener, ReadListener};
use rfidlib_core::params::{names, ParamValue};
use rfidlib_core::reader::Reader;
use rfidlib_core::tagop::{Gen2MemBank, TagOp};
use rfidlib_core::types::{GpioPin, Region, TagReadData};
use rfidlib_eapi::frame::encode_frame;
use rfidlib_eapi::msg::{fault, opcode};
use rfidlib_eapi::EapiReader;
use rfidlib_test_harness::{MockScript, MockTransport};

const EPC_A: [u8; 8] = [0xE2, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0A];
const EPC_B: [u8; 8] = [0xE2, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0B];
const EPC_C: [u8; 8] = [0xE2, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0C];

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

fn cmd(op: u8, payload: &[u8]) -> Vec<u8> {
    encode_frame(op, payload).unwrap()
}

fn ok_reply(op: u8, data: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x00];
    payload.extend_from_slice(data);
    encode_frame(op, &payload).unwrap()
}

fn fault_reply(op: u8, code: u16) -> Vec<u8> {
    let mut payload = vec![0x01];
    payload.extend_from_slice(&code.to_be_bytes());
    encode_frame(op, &payload).unwrap()
}

fn version_data() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]); // bootloader
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x10]); // hardware
    data.extend_from_slice(&[0x01, 0x0B, 0x00, 0x0E]); // firmware
    data.extend_from_slice(&[0x20, 0x19, 0x06, 0x12]); // build date
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x30]); // protocols
    data
}

fn record(rssi: i8, antenna: u8, read_count: u8, epc: &[u8], data: &[u8]) -> Vec<u8> {
    let mut r = vec![rssi as u8, antenna, read_count, epc.len() as u8];
    r.extend_from_slice(epc);
    r.extend_from_slice(&0x1234u16.to_be_bytes());
    r.extend_from_slice(&(data.len() as u16).to_be_bytes());
    r.extend_from_slice(data);
    r
}

/// A streamed continuous-mode tag report frame.
fn stream_tag_frame(rssi: i8, antenna: u8, epc: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x00, 0x00];
    payload.extend(record(rssi, antenna, 1, epc, &[]));
    encode_frame(opcode::READ_TAG_ID_MULTIPLE, &payload).unwrap()
}

fn script_handshake(script: &MockScript, region_code: u8) {
    script.expect(
        &cmd(opcode::GET_VERSION, &[]),
        &ok_reply(opcode::GET_VERSION, &version_data()),
    );
    script.expect(
        &cmd(opcode::GET_REGION, &[]),
        &ok_reply(opcode::GET_REGION, &[region_code]),
    );
}

async fn connected_reader() -> (EapiReader, MockScript) {
    let mock = MockTransport::new();
    let script = mock.script();
    let reader = EapiReader::with_transport(Box::new(mock), "eapi:///dev/mock");
    script_handshake(&script, 1);
    reader.connect().await.unwrap();
    assert_eq!(script.remaining_expectations(), 0);
    (reader, script)
}

/// Expectations for arming the continuous engine on the default plan.
fn script_continuous_arm(script: &MockScript, on_time: u16) {
    script.expect(
        &cmd(opcode::SET_TAG_PROTOCOL, &[0x05]),
        &ok_reply(opcode::SET_TAG_PROTOCOL, &[]),
    );
    let mut start = vec![0x01, 0x00, 0x00];
    start.extend_from_slice(&on_time.to_be_bytes());
    script.expect(
        &cmd(opcode::MULTI_PROTOCOL_TAG_OP, &start),
        &ok_reply(opcode::MULTI_PROTOCOL_TAG_OP, &[]),
    );
}

fn script_continuous_stop(script: &MockScript) {
    script.expect(
        &cmd(opcode::MULTI_PROTOCOL_TAG_OP, &[0x02, 0x00, 0x00, 0x00, 0x00]),
        &ok_reply(opcode::MULTI_PROTOCOL_TAG_OP, &[]),
    );
}

async fn wait_expectations_drained(script: &MockScript) {
    for _ in 0..200 {
        if script.remaining_expectations() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("mock expectations not consumed in time");
}

// ---------------------------------------------------------------------------
// Listener doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TagCollector {
    tags: Mutex<Vec<TagReadData>>,
}

impl TagCollector {
    fn epcs(&self) -> Vec<String> {
        self.tags
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.tag.epc_hex())
            .collect()
    }

    fn len(&self) -> usize {
        self.tags.lock().unwrap().len()
    }
}

impl ReadListener for TagCollector {
    fn tag_read(&self, tag: &TagReadData) {
        self.tags.lock().unwrap().push(tag.clone());
    }
}

#[derive(Default)]
struct ExceptionCollector {
    seen: Mutex<Vec<(Option<u16>, String)>>,
}

impl ExceptionCollector {
    fn codes(&self) -> Vec<Option<u16>> {
        self.seen.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl ReadExceptionListener for ExceptionCollector {
    fn tag_read_exception(&self, error: &Error) {
        self.seen
            .lock()
            .unwrap()
            .push((error.fault_code(), error.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s1_synchronous_read_returns_reported_tags_in_order() {
    let (reader, script) = connected_reader().await;

    script.expect(
        &cmd(opcode::SET_TAG_PROTOCOL, &[0x05]),
        &ok_reply(opcode::SET_TAG_PROTOCOL, &[]),
    );
    script.expect(
        &cmd(opcode::SET_ANTENNA_PORT, &[0x01]),
        &ok_reply(opcode::SET_ANTENNA_PORT, &[]),
    );
    let mut data = vec![0x02];
    data.extend(record(-45, 1, 1, &EPC_A, &[]));
    data.extend(record(-50, 1, 1, &EPC_B, &[]));
    script.expect(
        &cmd(opcode::READ_TAG_ID_MULTIPLE, &[0x00, 0x00, 0x01, 0xF4, 0x00]),
        &ok_reply(opcode::READ_TAG_ID_MULTIPLE, &data),
    );

    let tags = reader.read(500).await.unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].tag.epc, EPC_A.to_vec());
    assert_eq!(tags[0].antenna, 1);
    assert_eq!(tags[0].rssi, -45);
    assert_eq!(tags[1].tag.epc, EPC_B.to_vec());
    assert_eq!(tags[1].rssi, -50);
    assert_eq!(script.remaining_expectations(), 0);
}

#[tokio::test]
async fn s2_block_permalock_returns_result_bytes() {
    let (reader, script) = connected_reader().await;

    script.expect(
        &cmd(opcode::SET_ANTENNA_PORT, &[0x01]),
        &ok_reply(opcode::SET_ANTENNA_PORT, &[]),
    );
    script.expect(
        &cmd(opcode::SET_TAG_PROTOCOL, &[0x05]),
        &ok_reply(opcode::SET_TAG_PROTOCOL, &[]),
    );
    let op_payload = [
        0x03, 0xE8, // command timeout
        0x00, // no select
        0x00, 0x00, 0x00, 0x00, // access password
        0x00, // read form
        0x03, // user bank
        0x00, 0x00, 0x00, 0x00, // block pointer
        0x01, // block range
    ];
    script.expect(
        &cmd(opcode::GEN2_BLOCK_PERMALOCK, &op_payload),
        &ok_reply(opcode::GEN2_BLOCK_PERMALOCK, &[0x00, 0x01, 0x02, 0x03]),
    );

    let op = TagOp::Gen2BlockPermaLock {
        read_lock: false,
        bank: Gen2MemBank::User,
        block_pointer: 0,
        block_range: 1,
        mask: vec![],
    };
    let result = reader.execute_tag_op(&op, None).await.unwrap();
    assert_eq!(result, vec![0x00, 0x01, 0x02, 0x03]);
}

#[tokio::test]
async fn s3_background_start_stop_delivers_in_order_and_drains() {
    let (reader, script) = connected_reader().await;

    let tags = Arc::new(TagCollector::default());
    let exceptions = Arc::new(ExceptionCollector::default());
    reader.add_read_listener(tags.clone());
    reader.add_read_exception_listener(exceptions.clone());

    script_continuous_arm(&script, 250);
    reader.start_reading().await.unwrap();
    wait_expectations_drained(&script).await;

    // One cycle of three tag reports in a single burst.
    let mut burst = stream_tag_frame(-40, 1, &EPC_A);
    burst.extend(stream_tag_frame(-41, 1, &EPC_B));
    burst.extend(stream_tag_frame(-42, 1, &EPC_C));
    script.push_rx(&burst);

    tokio::time::sleep(Duration::from_millis(250)).await;

    script_continuous_stop(&script);
    reader.stop_reading().await;

    // Stop barrier: everything was delivered before stop returned.
    assert_eq!(
        tags.epcs(),
        vec![
            "E20000000000000A".to_string(),
            "E20000000000000B".to_string(),
            "E20000000000000C".to_string(),
        ]
    );
    assert_eq!(exceptions.len(), 0);

    // No further callbacks after stop.
    let frozen = tags.len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(tags.len(), frozen);
}

#[tokio::test]
async fn s4_crc_corruption_fails_once_then_recovers() {
    let (reader, script) = connected_reader().await;

    let good = ok_reply(opcode::GET_READ_TX_POWER, &[0x0B, 0xB8]);
    let mut corrupted = good.clone();
    corrupted[4] ^= 0x01; // flip a payload byte

    script.expect(&cmd(opcode::GET_READ_TX_POWER, &[]), &corrupted);
    let err = reader
        .param_get(names::RADIO_READ_POWER)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CrcMismatch { .. }), "got {err:?}");

    // The link stays usable; the next exchange succeeds.
    script.expect(&cmd(opcode::GET_READ_TX_POWER, &[]), &good);
    assert_eq!(
        reader.param_get(names::RADIO_READ_POWER).await.unwrap(),
        ParamValue::Int(3000)
    );
}

#[tokio::test]
async fn s5_unspec_region_falls_back_to_na_at_connect() {
    let mock = MockTransport::new();
    let script = mock.script();
    let reader = EapiReader::with_transport(Box::new(mock), "eapi:///dev/mock");

    script.expect(
        &cmd(opcode::GET_VERSION, &[]),
        &ok_reply(opcode::GET_VERSION, &version_data()),
    );
    script.expect(
        &cmd(opcode::GET_REGION, &[]),
        &ok_reply(opcode::GET_REGION, &[0x00]), // UNSPEC
    );
    script.expect(
        &cmd(opcode::SET_REGION, &[0x01]),
        &ok_reply(opcode::SET_REGION, &[]),
    );

    reader.connect().await.unwrap();
    assert_eq!(
        reader.param_get(names::REGION_ID).await.unwrap(),
        ParamValue::Region(Region::Na)
    );
}

#[tokio::test]
async fn s6_buffer_full_rearms_and_keeps_streaming() {
    let (reader, script) = connected_reader().await;

    let tags = Arc::new(TagCollector::default());
    let exceptions = Arc::new(ExceptionCollector::default());
    reader.add_read_listener(tags.clone());
    reader.add_read_exception_listener(exceptions.clone());

    script_continuous_arm(&script, 250);
    reader.start_reading().await.unwrap();
    wait_expectations_drained(&script).await;

    // Script the recovery sequence, then inject the buffer-full fault.
    let mut buffered = vec![0x01];
    buffered.extend(record(-47, 1, 1, &EPC_A, &[]));
    script.expect(
        &cmd(opcode::GET_TAG_BUFFER, &[]),
        &ok_reply(opcode::GET_TAG_BUFFER, &buffered),
    );
    script.expect(
        &cmd(opcode::CLEAR_TAG_BUFFER, &[]),
        &ok_reply(opcode::CLEAR_TAG_BUFFER, &[]),
    );
    script.expect(
        &cmd(opcode::MULTI_PROTOCOL_TAG_OP, &[0x01, 0x00, 0x00, 0x00, 0xFA]),
        &ok_reply(opcode::MULTI_PROTOCOL_TAG_OP, &[]),
    );
    script.push_rx(&fault_reply(
        opcode::READ_TAG_ID_MULTIPLE,
        fault::TAG_ID_BUFFER_FULL,
    ));
    wait_expectations_drained(&script).await;

    // The engine is still alive: a later report is delivered normally.
    script.push_rx(&stream_tag_frame(-48, 1, &EPC_B));
    tokio::time::sleep(Duration::from_millis(100)).await;

    script_continuous_stop(&script);
    reader.stop_reading().await;

    assert_eq!(
        tags.epcs(),
        vec![
            "E20000000000000A".to_string(),
            "E20000000000000B".to_string(),
        ]
    );
    assert!(exceptions
        .codes()
        .contains(&Some(fault::TAG_ID_BUFFER_FULL)));
}

#[tokio::test]
async fn no_antenna_is_reported_but_does_not_stop_the_stream() {
    let (reader, script) = connected_reader().await;

    let tags = Arc::new(TagCollector::default());
    let exceptions = Arc::new(ExceptionCollector::default());
    reader.add_read_listener(tags.clone());
    reader.add_read_exception_listener(exceptions.clone());

    script_continuous_arm(&script, 250);
    reader.start_reading().await.unwrap();
    wait_expectations_drained(&script).await;

    let mut burst = fault_reply(opcode::READ_TAG_ID_MULTIPLE, fault::ANTENNA_NOT_CONNECTED);
    burst.extend(stream_tag_frame(-44, 1, &EPC_C));
    script.push_rx(&burst);
    tokio::time::sleep(Duration::from_millis(100)).await;

    script_continuous_stop(&script);
    reader.stop_reading().await;

    assert_eq!(tags.epcs(), vec!["E20000000000000C".to_string()]);
    assert_eq!(exceptions.codes(), vec![Some(fault::ANTENNA_NOT_CONNECTED)]);
}

#[tokio::test]
async fn status_reports_reach_status_listeners() {
    use rfidlib_core::listener::{StatusListener, StatusReport};

    #[derive(Default)]
    struct StatusCollector {
        reports: Mutex<Vec<StatusReport>>,
    }
    impl StatusListener for StatusCollector {
        fn status_message(&self, status: &StatusReport) {
            self.reports.lock().unwrap().push(*status);
        }
    }

    let (reader, script) = connected_reader().await;

    let tags = Arc::new(TagCollector::default());
    let status = Arc::new(StatusCollector::default());
    reader.add_read_listener(tags.clone());
    reader.add_status_listener(status.clone());

    script_continuous_arm(&script, 250);
    reader.start_reading().await.unwrap();
    wait_expectations_drained(&script).await;

    // A status report frame: flag 0x01, temp 40C, antenna 1, 902922 kHz.
    let mut payload = vec![0x00, 0x01];
    payload.extend_from_slice(&[0x28, 0x01, 0x00, 0x0D, 0xC3, 0x0A]);
    let mut burst = encode_frame(opcode::READ_TAG_ID_MULTIPLE, &payload).unwrap();
    burst.extend(stream_tag_frame(-43, 1, &EPC_A));
    script.push_rx(&burst);

    tokio::time::sleep(Duration::from_millis(100)).await;
    script_continuous_stop(&script);
    reader.stop_reading().await;

    let reports = status.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].temperature, Some(40));
    assert_eq!(reports[0].frequency_khz, Some(902_922));
    drop(reports);
    assert_eq!(tags.epcs(), vec!["E20000000000000A".to_string()]);
}

#[tokio::test]
async fn stream_timeout_stops_the_engine_with_one_exception() {
    let (reader, script) = connected_reader().await;

    reader
        .param_set(names::TRANSPORT_TIMEOUT, ParamValue::Int(40))
        .await
        .unwrap();
    reader
        .param_set(names::READ_ASYNC_ON_TIME, ParamValue::Int(20))
        .await
        .unwrap();

    let exceptions = Arc::new(ExceptionCollector::default());
    reader.add_read_exception_listener(exceptions.clone());

    script_continuous_arm(&script, 20);
    reader.start_reading().await.unwrap();
    wait_expectations_drained(&script).await;

    // No reports arrive; the stream read deadline (40 + 20 ms) passes.
    tokio::time::sleep(Duration::from_millis(250)).await;
    reader.stop_reading().await;

    let seen = exceptions.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1, "timeout must be delivered exactly once");
    assert!(seen[0].1.contains("timeout"), "got {:?}", seen[0]);
}

#[tokio::test]
async fn polled_mode_delivers_tags_and_stops_cleanly() {
    let (reader, script) = connected_reader().await;

    reader
        .param_set(names::READ_ASYNC_ON_TIME, ParamValue::Int(20))
        .await
        .unwrap();
    reader
        .param_set(names::READ_ASYNC_OFF_TIME, ParamValue::Int(30))
        .await
        .unwrap();

    let tags = Arc::new(TagCollector::default());
    reader.add_read_listener(tags.clone());

    script.expect(
        &cmd(opcode::SET_TAG_PROTOCOL, &[0x05]),
        &ok_reply(opcode::SET_TAG_PROTOCOL, &[]),
    );
    script.expect(
        &cmd(opcode::SET_ANTENNA_PORT, &[0x01]),
        &ok_reply(opcode::SET_ANTENNA_PORT, &[]),
    );
    let read_cmd = cmd(opcode::READ_TAG_ID_MULTIPLE, &[0x00, 0x00, 0x00, 0x14, 0x00]);
    let mut first_cycle = vec![0x01];
    first_cycle.extend(record(-45, 1, 1, &EPC_A, &[]));
    script.expect(
        &read_cmd,
        &ok_reply(opcode::READ_TAG_ID_MULTIPLE, &first_cycle),
    );
    // Later cycles see an empty field.
    for _ in 0..12 {
        script.expect(
            &read_cmd,
            &fault_reply(opcode::READ_TAG_ID_MULTIPLE, fault::NO_TAGS_FOUND),
        );
    }

    reader.start_reading().await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    reader.stop_reading().await;

    let delivered = tags.len();
    assert!(delivered >= 1, "first cycle's tag must be delivered");
    assert_eq!(tags.epcs()[0], "E20000000000000A");

    // No further callbacks after stop returned.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(tags.len(), delivered);
}

// ---------------------------------------------------------------------------
// Parameter laws
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parameter_laws() {
    let (reader, _script) = connected_reader().await;

    // Set-then-get idempotence.
    reader
        .param_set(names::READ_ASYNC_ON_TIME, ParamValue::Int(300))
        .await
        .unwrap();
    assert_eq!(
        reader.param_get(names::READ_ASYNC_ON_TIME).await.unwrap(),
        ParamValue::Int(300)
    );

    // Case-insensitive lookup.
    assert_eq!(
        reader.param_get("/READER/READ/ASYNCONTIME").await.unwrap(),
        ParamValue::Int(300)
    );

    // Unknown parameters fail symmetrically.
    assert!(matches!(
        reader.param_get("/reader/no/such").await,
        Err(Error::UnknownParameter(_))
    ));
    assert!(matches!(
        reader.param_set("/reader/no/such", ParamValue::Int(1)).await,
        Err(Error::UnknownParameter(_))
    ));

    // Read-only parameters reject set.
    assert!(matches!(
        reader
            .param_set(names::URI, ParamValue::String("x".into()))
            .await,
        Err(Error::ReadOnly(_))
    ));
    assert!(matches!(
        reader
            .param_set(names::VERSION_SOFTWARE, ParamValue::String("x".into()))
            .await,
        Err(Error::ReadOnly(_))
    ));

    // Declared types are enforced.
    assert!(matches!(
        reader
            .param_set(names::COMMAND_TIMEOUT, ParamValue::String("5".into()))
            .await,
        Err(Error::TypeMismatch { .. })
    ));

    // Timeout range [0, 65535].
    assert!(matches!(
        reader
            .param_set(names::COMMAND_TIMEOUT, ParamValue::Int(-1))
            .await,
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        reader
            .param_set(names::COMMAND_TIMEOUT, ParamValue::Int(70_000))
            .await,
        Err(Error::InvalidArgument(_))
    ));
    reader
        .param_set(names::COMMAND_TIMEOUT, ParamValue::Int(65_535))
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_capability_probe_removes_parameter_permanently() {
    let (reader, script) = connected_reader().await;

    script.expect(
        &cmd(opcode::GET_HARDWARE_VERSION, &[]),
        &fault_reply(opcode::GET_HARDWARE_VERSION, fault::UNIMPLEMENTED_OPCODE),
    );
    assert!(matches!(
        reader.param_get(names::VERSION_SERIAL).await,
        Err(Error::UnknownParameter(_))
    ));

    // No further device traffic: the entry is gone for good.
    assert!(matches!(
        reader.param_get(names::VERSION_SERIAL).await,
        Err(Error::UnknownParameter(_))
    ));
    let listed = reader.param_list().await;
    assert!(!listed.contains(&names::VERSION_SERIAL.to_string()));
    assert!(listed.contains(&names::REGION_ID.to_string()));
    assert_eq!(script.remaining_expectations(), 0);
}

#[tokio::test]
async fn successful_capability_probe_promotes_parameter() {
    let (reader, script) = connected_reader().await;

    script.expect(
        &cmd(opcode::GET_HARDWARE_VERSION, &[]),
        &ok_reply(
            opcode::GET_HARDWARE_VERSION,
            &[0x12, 0x05, b'M', b'6', b'-', b'4', b'2'],
        ),
    );
    assert_eq!(
        reader.param_get(names::VERSION_SERIAL).await.unwrap(),
        ParamValue::String("M6-42".into())
    );

    // Now confirmed: listing needs no probe.
    let listed = reader.param_list().await;
    assert!(listed.contains(&names::VERSION_SERIAL.to_string()));
    assert_eq!(script.remaining_expectations(), 0);
}

// ---------------------------------------------------------------------------
// Other surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_command_writes_nothing() {
    let (reader, script) = connected_reader().await;
    let sent_before = script.sent_data().len();

    let op = TagOp::Gen2WriteData {
        bank: Gen2MemBank::User,
        word_address: 0,
        data: vec![0xAAAA; 130],
    };
    assert!(matches!(
        reader.execute_tag_op(&op, None).await,
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(script.sent_data().len(), sent_before);
}

#[tokio::test]
async fn gpio_round_trip() {
    let (reader, script) = connected_reader().await;

    script.expect(
        &cmd(opcode::GET_USER_GPIO_INPUTS, &[]),
        &ok_reply(
            opcode::GET_USER_GPIO_INPUTS,
            &[0x02, 0x01, 0x01, 0x00, 0x02, 0x00, 0x00],
        ),
    );
    let pins = reader.gpi_get().await.unwrap();
    assert_eq!(pins, vec![GpioPin::input(1, true), GpioPin::input(2, false)]);

    script.expect(
        &cmd(opcode::SET_USER_GPIO_OUTPUTS, &[0x01, 0x03, 0x01]),
        &ok_reply(opcode::SET_USER_GPIO_OUTPUTS, &[]),
    );
    reader.gpo_set(&[GpioPin::output(3, true)]).await.unwrap();
}

#[tokio::test]
async fn byte_level_memory_read_slices_odd_ranges() {
    let (reader, script) = connected_reader().await;

    script.expect(
        &cmd(opcode::SET_ANTENNA_PORT, &[0x01]),
        &ok_reply(opcode::SET_ANTENNA_PORT, &[]),
    );
    script.expect(
        &cmd(opcode::SET_TAG_PROTOCOL, &[0x05]),
        &ok_reply(opcode::SET_TAG_PROTOCOL, &[]),
    );
    let op_payload = [
        0x03, 0xE8, // timeout
        0x00, // no select
        0x00, 0x00, 0x00, 0x00, // access password
        0x02, // TID bank
        0x00, 0x00, 0x00, 0x00, // word address
        0x02, // word count
    ];
    script.expect(
        &cmd(opcode::READ_TAG_DATA, &op_payload),
        &ok_reply(opcode::READ_TAG_DATA, &[0xAA, 0xBB, 0xCC, 0xDD]),
    );

    let bytes = reader
        .read_tag_mem_bytes(None, Gen2MemBank::Tid, 1, 2)
        .await
        .unwrap();
    assert_eq!(bytes, vec![0xBB, 0xCC]);
}

#[tokio::test]
async fn destroy_is_infallible_and_idempotent() {
    let (reader, _script) = connected_reader().await;

    reader.destroy().await;
    assert!(!reader.is_connected());
    assert!(matches!(reader.read(100).await, Err(Error::NotConnected)));

    reader.destroy().await;
    assert!(!reader.is_connected());
}

#[tokio::test]
async fn transport_listener_traces_the_handshake() {
    use rfidlib_core::listener::{TransportEvent, TransportListener};

    #[derive(Default)]
    struct Trace {
        events: Mutex<Vec<TransportEvent>>,
    }
    impl TransportListener for Trace {
        fn message(&self, event: &TransportEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    let mock = MockTransport::new();
    let script = mock.script();
    let reader = EapiReader::with_transport(Box::new(mock), "eapi:///dev/mock");

    let trace = Arc::new(Trace::default());
    // Registering before connect is allowed, so the handshake is traced.
    reader.add_transport_listener(trace.clone());

    script_handshake(&script, 1);
    reader.connect().await.unwrap();

    let events = trace.events.lock().unwrap();
    assert_eq!(events.len(), 4); // two commands, two responses
    assert!(events[0].tx);
    assert_eq!(events[0].data, cmd(opcode::GET_VERSION, &[]));
    assert!(!events[1].tx);
}
