//! End-to-end transactions against the simulated slave
//!
//! Covers parameter reads and writes, request dispatch, outcome mapping into
//! `TransactionInfo`, and the engine lifecycle.

#![allow(clippy::disallowed_methods)]

mod common;

use std::sync::Arc;

use common::*;
use mbc_master::function_code::*;
use mbc_master::{
    ErrorClass, ErrorKind, Fault, LayoutTag, MasterInterface, ModbusMaster, ParameterRequest, PortMode,
    SimulatedSlave, SimulatedTransport, TransactionState,
};

// ============================================================================
// Parameter reads
// ============================================================================

#[tokio::test]
async fn test_read_float_cdab_parameter() {
    let master = started_master().await;

    let mut value = [0u8; 4];
    let tag = master.get_parameter(7, "temperature", &mut value).await.unwrap();

    assert_eq!(tag, LayoutTag::FloatCdab);
    assert_eq!(f32::from_ne_bytes(value), 1.0);

    let info = master.get_transaction_info().unwrap();
    assert_eq!(info.dest_addr, 1);
    assert_eq!(info.function_code, READ_HOLDING_REGISTERS);
    assert_eq!(info.error_class, ErrorClass::Ok);
    assert_eq!(info.exception_code, 0);
    assert_eq!(master.transaction_state(), TransactionState::Completed);

    let frames = master.transport().sent_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].request, ParameterRequest::new(1, READ_HOLDING_REGISTERS, 100, 2));
    assert_eq!(frames[0].transaction_id, info.transaction_id);
}

#[tokio::test]
async fn test_read_float_abcd_register_order() {
    // Registers [0x3F80, 0x0000] carry 1.0 in ABCD order
    let master = started_master().await;
    let mut value = [0u8; 4];
    let tag = master.get_parameter(12, "ratio", &mut value).await.unwrap();
    assert_eq!(tag, LayoutTag::FloatAbcd);
    assert_eq!(f32::from_ne_bytes(value), 1.0);
}

#[tokio::test]
async fn test_read_input_and_coils() {
    let master = started_master().await;

    let mut serial = [0u8; 4];
    master.get_parameter(9, "serial", &mut serial).await.unwrap();
    assert_eq!(u32::from_ne_bytes(serial), 0x1122_3344);

    let mut relays = [0u8; 1];
    master.get_parameter(10, "relays", &mut relays).await.unwrap();
    assert_eq!(relays[0], 0b0000_1101);
    assert_eq!(master.get_transaction_info().unwrap().function_code, READ_COILS);
}

#[tokio::test]
async fn test_lookup_failures() {
    let master = started_master().await;
    let mut value = [0u8; 4];

    let err = master.get_parameter(7, "Temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = master.get_parameter(99, "temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut short = [0u8; 2];
    let err = master.get_parameter(7, "temperature", &mut short).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArg);
    assert!(master.transport().sent_frames().is_empty());
}

// ============================================================================
// Parameter writes
// ============================================================================

#[tokio::test]
async fn test_write_then_read_back() {
    let master = started_master().await;

    let tag = master
        .set_parameter(7, "temperature", &21.5f32.to_ne_bytes())
        .await
        .unwrap();
    assert_eq!(tag, LayoutTag::FloatCdab);
    assert_eq!(master.get_transaction_info().unwrap().function_code, WRITE_MULTIPLE_REGISTERS);

    // 21.5 = 0x41AC0000, low word first
    let sim = master.transport();
    assert_eq!(sim.holding_register(1, 100), Some(0x0000));
    assert_eq!(sim.holding_register(1, 101), Some(0x41AC));

    let mut value = [0u8; 4];
    master.get_parameter(7, "temperature", &mut value).await.unwrap();
    assert_eq!(f32::from_ne_bytes(value), 21.5);
}

#[tokio::test]
async fn test_write_coils() {
    let master = started_master().await;
    master.set_parameter(10, "relays", &[0b1_0010]).await.unwrap();

    let sim = master.transport();
    assert_eq!(sim.coil(1, 3), Some(false));
    assert_eq!(sim.coil(1, 4), Some(true));
    assert_eq!(sim.coil(1, 5), Some(false));
    assert_eq!(sim.coil(1, 6), Some(false));
    assert_eq!(sim.coil(1, 7), Some(true));
    assert_eq!(master.get_transaction_info().unwrap().function_code, WRITE_MULTIPLE_COILS);
}

#[tokio::test]
async fn test_write_requires_permission() {
    let master = started_master().await;
    let before = master.get_transaction_info().unwrap();

    // serial is READ only
    let err = master.set_parameter(9, "serial", &7u32.to_ne_bytes()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArg);

    // firmware is writable on paper but lives in input registers
    let err = master.set_parameter(11, "firmware", &1u16.to_ne_bytes()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);

    assert!(master.transport().sent_frames().is_empty());
    assert_eq!(master.get_transaction_info().unwrap(), before);
}

#[tokio::test]
async fn test_limits_enforced() {
    let master = started_master().await;

    let mut value = [0u8; 2];
    master.get_parameter(8, "setpoint", &mut value).await.unwrap();
    assert_eq!(u16::from_ne_bytes(value), 42);

    let err = master.set_parameter(8, "setpoint", &150u16.to_ne_bytes()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArg);
    assert_eq!(master.transport().sent_frames().len(), 1);

    master.set_parameter(8, "setpoint", &55u16.to_ne_bytes()).await.unwrap();
    assert_eq!(master.transport().holding_register(1, 200), Some(55));

    // out-of-range reading is reported but still stored
    master.transport().add_slave(slave().with_holding(200, &[250]));
    let err = master.get_parameter(8, "setpoint", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert_eq!(u16::from_ne_bytes(value), 250);
}

// ============================================================================
// Raw requests
// ============================================================================

#[tokio::test]
async fn test_send_request_single_register() {
    let master = started_master().await;

    let mut data = 0xBEEFu16.to_be_bytes();
    let request = ParameterRequest::new(1, WRITE_SINGLE_REGISTER, 50, 1);
    master.send_request(&request, &mut data).await.unwrap();
    assert_eq!(master.transport().holding_register(1, 50), Some(0xBEEF));

    let mut image = [0u8; 4];
    let read = ParameterRequest::new(1, READ_HOLDING_REGISTERS, 49, 2);
    master.send_request(&read, &mut image).await.unwrap();
    assert_eq!(image, [0x00, 0x00, 0xBE, 0xEF]);
}

#[tokio::test]
async fn test_broadcast_write() {
    let sim = SimulatedTransport::new(PortMode::Tcp)
        .with_slave(SimulatedSlave::new(1))
        .with_slave(SimulatedSlave::new(2));
    let master = ModbusMaster::new(sim);
    master.setup(tcp_comm()).await.unwrap();
    master.start().await.unwrap();

    let mut data = [0x12, 0x34];
    let request = ParameterRequest::new(0, WRITE_SINGLE_REGISTER, 10, 1);
    master.send_request(&request, &mut data).await.unwrap();

    assert_eq!(master.transport().holding_register(1, 10), Some(0x1234));
    assert_eq!(master.transport().holding_register(2, 10), Some(0x1234));

    let mut image = [0u8; 2];
    let read = ParameterRequest::new(0, READ_HOLDING_REGISTERS, 10, 1);
    let err = master.send_request(&read, &mut image).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArg);
}

#[tokio::test]
async fn test_report_slave_id_uses_common_window() {
    let master = started_master().await;

    let mut data = [0u8; 8];
    let request = ParameterRequest::new(1, REPORT_SLAVE_ID, 0, 4);
    master.send_request(&request, &mut data).await.unwrap();
    assert_eq!(&data[..4], b"MBC\xFF");
    assert_eq!(&data[4..], &[0, 0, 0, 0]);

    let options = master.options().unwrap();
    assert_eq!(options.mode, PortMode::Tcp);
    assert_eq!(options.reg_buffer_type, None);
}

#[tokio::test]
async fn test_request_validation() {
    let master = started_master().await;
    let mut data = [0u8; 256];

    let too_many = ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 126);
    assert_eq!(
        master.send_request(&too_many, &mut data).await.unwrap_err().kind(),
        ErrorKind::InvalidArg
    );

    let unknown = ParameterRequest::new(1, 0x2B, 0, 1);
    assert_eq!(
        master.send_request(&unknown, &mut data).await.unwrap_err().kind(),
        ErrorKind::NotSupported
    );

    let mut small = [0u8; 3];
    let read = ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 2);
    assert_eq!(
        master.send_request(&read, &mut small).await.unwrap_err().kind(),
        ErrorKind::InvalidArg
    );
    assert!(master.transport().sent_frames().is_empty());
}

// ============================================================================
// Outcome mapping
// ============================================================================

#[tokio::test]
async fn test_slave_exception() {
    let master = started_master().await;
    master.transport().inject(Fault::Exception(0x02));

    let mut value = [0u8; 4];
    let err = master.get_parameter(7, "temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fail);
    assert_eq!(err.exception_code(), Some(0x02));

    let info = master.get_transaction_info().unwrap();
    assert_eq!(info.exception_code, 0x02);
    assert_eq!(info.error_class, ErrorClass::ExecuteFunction);
    assert_eq!(master.transaction_state(), TransactionState::Exception);
}

#[tokio::test]
async fn test_illegal_address_from_slave() {
    let sim = SimulatedTransport::new(PortMode::Tcp).with_slave(SimulatedSlave::new(1).with_bank_size(50));
    let master = ModbusMaster::new(sim);
    master.setup(tcp_comm()).await.unwrap();
    master.start().await.unwrap();

    let mut data = [0u8; 4];
    let request = ParameterRequest::new(1, READ_INPUT_REGISTERS, 49, 2);
    let err = master.send_request(&request, &mut data).await.unwrap_err();
    assert_eq!(err.exception_code(), Some(0x02));
    assert_eq!(master.get_transaction_info().unwrap().function_code, READ_INPUT_REGISTERS);
}

#[tokio::test]
async fn test_transport_timeout() {
    let master = started_master().await;
    master.transport().inject(Fault::Timeout);

    let mut value = [0u8; 4];
    let err = master.get_parameter(7, "temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let info = master.get_transaction_info().unwrap();
    assert_eq!(info.error_class, ErrorClass::RespondTimeout);
    assert_eq!(info.exception_code, 0);
    assert_eq!(master.transaction_state(), TransactionState::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_engine_timeout_on_hung_transport() {
    let master = started_master().await;
    master.transport().inject(Fault::Hang);

    let mut value = [0u8; 4];
    let err = master.get_parameter(7, "temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(master.get_transaction_info().unwrap().error_class, ErrorClass::RespondTimeout);

    // the engine recovers for the next transaction
    master.get_parameter(7, "temperature", &mut value).await.unwrap();
    assert_eq!(f32::from_ne_bytes(value), 1.0);
}

#[tokio::test]
async fn test_missing_slave_times_out() {
    let master = started_master().await;
    let mut data = [0u8; 2];
    let request = ParameterRequest::new(9, READ_HOLDING_REGISTERS, 0, 1);
    let err = master.send_request(&request, &mut data).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(master.get_transaction_info().unwrap().dest_addr, 9);
}

#[tokio::test]
async fn test_invalid_and_empty_responses() {
    let master = started_master().await;
    let mut value = [0u8; 4];

    master.transport().inject(Fault::InvalidFrame);
    let err = master.get_parameter(7, "temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert_eq!(master.get_transaction_info().unwrap().error_class, ErrorClass::ReceiveData);

    master.transport().inject(Fault::Silent);
    let err = master.get_parameter(7, "temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert_eq!(master.transaction_state(), TransactionState::Invalid);

    // a silent write is a successful write
    master.transport().inject(Fault::Silent);
    master.set_parameter(7, "temperature", &2.0f32.to_ne_bytes()).await.unwrap();
}

#[tokio::test]
async fn test_refused_window() {
    let master = started_master().await;
    master.transport().inject(Fault::RefuseWindow);

    let mut value = [0u8; 4];
    let err = master.get_parameter(7, "temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);

    let info = master.get_transaction_info().unwrap();
    assert_eq!(info.error_class, ErrorClass::ExecuteFunction);
    assert_eq!(info.exception_code, 0x02);
    assert_eq!(value, [0u8; 4]);
}

// ============================================================================
// Transaction ids
// ============================================================================

#[tokio::test]
async fn test_transaction_ids_strictly_increase() {
    let master = started_master().await;
    let mut value = [0u8; 4];
    let mut ids = Vec::new();

    master.get_parameter(7, "temperature", &mut value).await.unwrap();
    ids.push(master.get_transaction_info().unwrap().transaction_id);

    master.transport().inject(Fault::Exception(0x04));
    let _ = master.get_parameter(7, "temperature", &mut value).await;
    ids.push(master.get_transaction_info().unwrap().transaction_id);

    master.set_parameter(7, "temperature", &3.0f32.to_ne_bytes()).await.unwrap();
    ids.push(master.get_transaction_info().unwrap().transaction_id);

    let mut data = [0u8; 2];
    master
        .send_request(&ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 1), &mut data)
        .await
        .unwrap();
    ids.push(master.get_transaction_info().unwrap().transaction_id);

    assert!(ids[0] >= 1);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids not increasing: {ids:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_serialised() {
    let master = started_master().await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let master = Arc::clone(&master);
        handles.push(tokio::spawn(async move {
            let mut value = [0u8; 4];
            master.get_parameter(7, "temperature", &mut value).await.unwrap();
            f32::from_ne_bytes(value)
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 1.0);
    }

    let frames = master.transport().sent_frames();
    assert_eq!(frames.len(), 16);
    assert!(frames.windows(2).all(|w| w[0].transaction_id < w[1].transaction_id));
    assert_eq!(
        master.get_transaction_info().unwrap().transaction_id,
        frames[15].transaction_id
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_lifecycle_rules() {
    let master = ModbusMaster::new(SimulatedTransport::new(PortMode::Tcp).with_slave(slave()));
    let mut data = [0u8; 2];
    let request = ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 1);

    assert_eq!(master.start().await.unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(
        master.send_request(&request, &mut data).await.unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(master.get_transaction_info().unwrap_err().kind(), ErrorKind::InvalidState);

    let rtu = mbc_master::CommInfo::serial(PortMode::Rtu, "/dev/ttyUSB0", 9600);
    assert_eq!(master.setup(rtu).await.unwrap_err().kind(), ErrorKind::NotSupported);

    master.setup(tcp_comm()).await.unwrap();
    master.start().await.unwrap();
    assert!(master.transport().is_open());
    assert_eq!(master.start().await.unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(master.setup(tcp_comm()).await.unwrap_err().kind(), ErrorKind::InvalidState);

    master.set_descriptor(descriptor_table()).unwrap();
    master.send_request(&request, &mut data).await.unwrap();

    master.destroy().await.unwrap();
    assert!(!master.transport().is_open());
    assert_eq!(master.get_cid_info(7).unwrap_err().kind(), ErrorKind::InvalidArg);
    assert_eq!(master.get_transaction_info().unwrap_err().kind(), ErrorKind::InvalidState);

    // a destroyed master can be set up again
    master.setup(tcp_comm()).await.unwrap();
    master.start().await.unwrap();
    master.send_request(&request, &mut data).await.unwrap();
}

#[tokio::test]
async fn test_descriptor_swap_keeps_captured_entry() {
    let master = started_master().await;
    let captured = master.get_cid_info(7).unwrap();

    let replacement = vec![mbc_master::ParameterDescriptor::new(7, "outlet", LayoutTag::FloatAbcd)];
    master.set_descriptor(Arc::from(replacement)).unwrap();

    assert_eq!(captured.name, "temperature");
    assert_eq!(captured.type_tag, LayoutTag::FloatCdab);
    assert_eq!(master.get_cid_info(7).unwrap().name, "outlet");

    let mut value = [0u8; 4];
    let err = master.get_parameter(7, "temperature", &mut value).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_oversized_descriptor_is_refused() {
    let sim = SimulatedTransport::new(PortMode::Tcp)
        .with_slave(SimulatedSlave::new(1).with_holding(100, &[0x3F80, 0x0000, 0x4000, 0x0000]));
    let master = ModbusMaster::new(sim);
    master.setup(tcp_comm()).await.unwrap();
    master.start().await.unwrap();

    // two FLOAT_ABCD elements in a two-register window
    let pair = mbc_master::ParameterDescriptor::new(20, "pair", LayoutTag::FloatAbcd)
        .with_byte_size(8)
        .with_registers(mbc_master::RegisterType::Holding, 100, 2)
        .with_perms(mbc_master::Permissions::READ_WRITE);
    let err = master.set_descriptor(Arc::from(vec![pair.clone()])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArg);
    assert_eq!(master.get_cid_info(20).unwrap_err().kind(), ErrorKind::InvalidArg);

    let fitted = pair.with_registers(mbc_master::RegisterType::Holding, 100, 4);
    master.set_descriptor(Arc::from(vec![fitted])).unwrap();
    let mut value = [0u8; 8];
    master.get_parameter(20, "pair", &mut value).await.unwrap();
    assert_eq!(f32::from_ne_bytes(value[..4].try_into().unwrap()), 1.0);
    assert_eq!(f32::from_ne_bytes(value[4..].try_into().unwrap()), 2.0);

    let native: Vec<u8> = [5.0f32, 7.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
    master.set_parameter(20, "pair", &native).await.unwrap();
    assert_eq!(master.transport().holding_register(1, 102), Some(0x40E0));
    assert_eq!(master.transport().holding_register(1, 103), Some(0x0000));
}
