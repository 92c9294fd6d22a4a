//! Façade behaviour: interface binding, slot guarding, argument validation
//! and callback forwarding.

#![allow(clippy::disallowed_methods)]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use mbc_master::function_code::*;
use mbc_master::{
    CommInfo, ErrorKind, Fault, LayoutTag, MasterController, MasterInterface, ModbusMaster, ParameterRequest,
    PortMode, RegisterError, RegisterMode, Result, SimulatedTransport,
};

async fn bound_controller() -> (MasterController, Arc<SimMaster>) {
    let master = Arc::new(ModbusMaster::new(SimulatedTransport::new(PortMode::Tcp).with_slave(slave())));
    let ctl = MasterController::new();
    ctl.init_iface(master.clone()).unwrap();
    ctl.setup(tcp_comm()).await.unwrap();
    ctl.start().await.unwrap();
    ctl.set_descriptor(descriptor_table()).unwrap();
    (ctl, master)
}

/// Backend providing only lifecycle slots
struct LifecycleOnly;

#[async_trait]
impl MasterInterface for LifecycleOnly {
    fn name(&self) -> &str {
        "lifecycle_only"
    }

    async fn setup(&self, _comm: CommInfo) -> Result<()> {
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_full_flow_through_controller() {
    let (ctl, master) = bound_controller().await;

    let desc = ctl.get_cid_info(7).unwrap();
    assert_eq!(desc.name, "temperature");
    assert_eq!(desc.reg_start, 100);

    let mut value = [0u8; 4];
    let tag = ctl.get_parameter(7, "temperature", &mut value).await.unwrap();
    assert_eq!(tag, LayoutTag::FloatCdab);
    assert_eq!(f32::from_ne_bytes(value), 1.0);

    ctl.set_parameter(7, "temperature", &(-12.25f32).to_ne_bytes()).await.unwrap();
    ctl.get_parameter(7, "temperature", &mut value).await.unwrap();
    assert_eq!(f32::from_ne_bytes(value), -12.25);

    let info = ctl.get_transaction_info().unwrap();
    assert_eq!(info, master.get_transaction_info().unwrap());
    assert_eq!(master.transport().sent_frames().len(), 3);
}

#[tokio::test]
async fn test_init_iface_only_once() {
    let (ctl, _master) = bound_controller().await;
    let err = ctl.init_iface(Arc::new(LifecycleOnly)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    // destroy unbinds, after which a new interface may be bound
    ctl.destroy().await.unwrap();
    assert!(!ctl.is_bound());
    assert_eq!(ctl.get_cid_info(7).unwrap_err().kind(), ErrorKind::InvalidState);
    ctl.init_iface(Arc::new(LifecycleOnly)).unwrap();
}

#[tokio::test]
async fn test_missing_slots_are_invalid_state() {
    let ctl = MasterController::new();
    ctl.init_iface(Arc::new(LifecycleOnly)).unwrap();
    ctl.setup(tcp_comm()).await.unwrap();
    ctl.start().await.unwrap();

    let mut value = [0u8; 4];
    assert_eq!(
        ctl.get_parameter(7, "temperature", &mut value).await.unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        ctl.set_parameter(7, "temperature", &value).await.unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        ctl.set_descriptor(descriptor_table()).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(ctl.get_transaction_info().unwrap_err().kind(), ErrorKind::InvalidState);
    let request = ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 2);
    assert_eq!(
        ctl.send_request(&request, &mut value).await.unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert!(ctl.options().is_none());
    assert_eq!(ctl.reg_cb_holding(&mut value, 0, 2, RegisterMode::Read), Err(RegisterError::IllState));
}

#[tokio::test]
async fn test_argument_validation() {
    let (ctl, master) = bound_controller().await;
    let mut value = [0u8; 4];

    assert_eq!(
        ctl.get_parameter(7, "", &mut value).await.unwrap_err().kind(),
        ErrorKind::InvalidArg
    );
    assert_eq!(
        ctl.get_parameter(7, "temperature", &mut []).await.unwrap_err().kind(),
        ErrorKind::InvalidArg
    );
    assert_eq!(
        ctl.set_parameter(7, "temperature", &[]).await.unwrap_err().kind(),
        ErrorKind::InvalidArg
    );
    let request = ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 1);
    assert_eq!(
        ctl.send_request(&request, &mut []).await.unwrap_err().kind(),
        ErrorKind::InvalidArg
    );
    assert_eq!(
        ctl.set_descriptor(Vec::<mbc_master::ParameterDescriptor>::new()).unwrap_err().kind(),
        ErrorKind::InvalidArg
    );
    assert!(master.transport().sent_frames().is_empty());
}

#[tokio::test]
async fn test_real_status_is_returned() {
    let (ctl, master) = bound_controller().await;

    master.transport().inject(Fault::Exception(0x03));
    let err = ctl
        .set_parameter(7, "temperature", &1.5f32.to_ne_bytes())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fail);
    assert_eq!(err.exception_code(), Some(0x03));

    // setup after start is refused and the refusal reaches the caller
    assert_eq!(ctl.setup(tcp_comm()).await.unwrap_err().kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_callbacks_without_transaction() {
    let (ctl, _master) = bound_controller().await;
    let data = [0u8; 4];
    assert_eq!(ctl.reg_cb_common(&data, 0, 2), Err(RegisterError::IllState));
    assert_eq!(ctl.reg_cb_discrete(&data, 0, 2), Err(RegisterError::IllState));

    let options = ctl.options().unwrap();
    assert_eq!(options.reg_buffer_size, 0);
    assert_eq!(options.reg_buffer_type, None);
}

#[test]
fn test_set_param_data_scenarios() {
    let ctl = MasterController::new();

    let mut dst = [0u8; 4];
    ctl.set_param_data(&mut dst, &0x1122_3344u32.to_ne_bytes(), LayoutTag::U32Cdab, 4)
        .unwrap();
    assert_eq!(dst, [0x33, 0x44, 0x11, 0x22]);

    ctl.set_param_data(&mut dst, &1.0f32.to_ne_bytes(), LayoutTag::FloatAbcd, 4)
        .unwrap();
    assert_eq!(dst, [0x3F, 0x80, 0x00, 0x00]);

    let mut word = [0u8; 2];
    ctl.set_param_data(&mut word, &(-2i16).to_ne_bytes(), LayoutTag::I8B, 2)
        .unwrap();
    assert_eq!(word, [0x00, 0xFE]);

    let src: Vec<u8> = [0x0102u16, 0x0304, 0x0506, 0x0708]
        .iter()
        .flat_map(|w| w.to_ne_bytes())
        .collect();
    let mut image = [0u8; 8];
    ctl.set_param_data(&mut image, &src, LayoutTag::U16Ab, 8).unwrap();
    assert_eq!(image, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);

    let err = ctl.set_param_data(&mut [], &src, LayoutTag::U16Ab, 8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}
