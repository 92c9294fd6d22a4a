//! Master interface
//!
//! [`MasterInterface`] is the slot table the façade dispatches through. Every
//! slot has a default that reports the slot as missing, so a partial backend
//! only overrides what it provides. [`ModbusMaster`] is the complete backend
//! built from a transport and a [`TransactionEngine`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use errors::{MbcError, RegisterError, RegisterResult, Result};
use mbc_codec::LayoutTag;

use crate::comm::CommInfo;
use crate::descriptor::ParameterDescriptor;
use crate::engine::{TransactionEngine, TransactionInfo, TransactionState};
use crate::ingress::{MasterOptions, RegisterMode};
use crate::registry::DescriptorRef;
use crate::request::ParameterRequest;
use crate::transport::MasterTransport;

fn missing(slot: &str) -> MbcError {
    MbcError::invalid_state(format!("slot '{slot}' not provided"))
}

/// Slot table of a master backend
#[async_trait]
pub trait MasterInterface: Send + Sync {
    /// Backend name used in diagnostics
    fn name(&self) -> &str;

    async fn setup(&self, _comm: CommInfo) -> Result<()> {
        Err(missing("setup"))
    }

    async fn start(&self) -> Result<()> {
        Err(missing("start"))
    }

    async fn destroy(&self) -> Result<()> {
        Err(missing("destroy"))
    }

    fn set_descriptor(&self, _table: Arc<[ParameterDescriptor]>) -> Result<()> {
        Err(missing("set_descriptor"))
    }

    fn get_cid_info(&self, _cid: u16) -> Result<DescriptorRef> {
        Err(missing("get_cid_info"))
    }

    async fn get_parameter(&self, _cid: u16, _name: &str, _value: &mut [u8]) -> Result<LayoutTag> {
        Err(missing("get_parameter"))
    }

    async fn set_parameter(&self, _cid: u16, _name: &str, _value: &[u8]) -> Result<LayoutTag> {
        Err(missing("set_parameter"))
    }

    async fn send_request(&self, _request: &ParameterRequest, _data: &mut [u8]) -> Result<()> {
        Err(missing("send_request"))
    }

    fn get_transaction_info(&self) -> Result<TransactionInfo> {
        Err(missing("get_transaction_info"))
    }

    /// Caller-visible register buffer description
    fn options(&self) -> Option<MasterOptions> {
        None
    }

    // Register-direction callbacks; a backend without ingress has no window

    fn reg_cb_holding(&self, _buf: &mut [u8], _address: u16, _n_regs: u16, _mode: RegisterMode) -> RegisterResult {
        Err(RegisterError::IllState)
    }

    fn reg_cb_input(&self, _buf: &[u8], _address: u16, _n_regs: u16) -> RegisterResult {
        Err(RegisterError::IllState)
    }

    fn reg_cb_coils(&self, _buf: &mut [u8], _address: u16, _n_coils: u16, _mode: RegisterMode) -> RegisterResult {
        Err(RegisterError::IllState)
    }

    fn reg_cb_discrete(&self, _buf: &[u8], _address: u16, _n_discrete: u16) -> RegisterResult {
        Err(RegisterError::IllState)
    }

    fn reg_cb_common(&self, _buf: &[u8], _address: u16, _n_bytes: u16) -> RegisterResult {
        Err(RegisterError::IllState)
    }
}

/// Modbus master backed by a transport
pub struct ModbusMaster<T: MasterTransport + 'static> {
    transport: Arc<T>,
    engine: TransactionEngine,
}

impl<T: MasterTransport + 'static> ModbusMaster<T> {
    pub fn new(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    pub fn from_arc(transport: Arc<T>) -> Self {
        let engine = TransactionEngine::new(transport.clone());
        Self { transport, engine }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    /// Phase of the last transaction
    pub fn transaction_state(&self) -> TransactionState {
        self.engine.transaction_state()
    }
}

impl<T: MasterTransport + 'static> fmt::Debug for ModbusMaster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusMaster").field("engine", &self.engine).finish()
    }
}

#[async_trait]
impl<T: MasterTransport + 'static> MasterInterface for ModbusMaster<T> {
    fn name(&self) -> &str {
        "modbus_master"
    }

    async fn setup(&self, comm: CommInfo) -> Result<()> {
        self.engine.setup(comm)
    }

    async fn start(&self) -> Result<()> {
        self.engine.start().await
    }

    async fn destroy(&self) -> Result<()> {
        self.engine.destroy().await
    }

    fn set_descriptor(&self, table: Arc<[ParameterDescriptor]>) -> Result<()> {
        self.engine.registry().set_descriptor(table)
    }

    fn get_cid_info(&self, cid: u16) -> Result<DescriptorRef> {
        self.engine.registry().get_cid_info(cid)
    }

    async fn get_parameter(&self, cid: u16, name: &str, value: &mut [u8]) -> Result<LayoutTag> {
        self.engine.get_parameter(cid, name, value).await
    }

    async fn set_parameter(&self, cid: u16, name: &str, value: &[u8]) -> Result<LayoutTag> {
        self.engine.set_parameter(cid, name, value).await
    }

    async fn send_request(&self, request: &ParameterRequest, data: &mut [u8]) -> Result<()> {
        self.engine.send_request(request, data).await
    }

    fn get_transaction_info(&self) -> Result<TransactionInfo> {
        self.engine.get_transaction_info()
    }

    fn options(&self) -> Option<MasterOptions> {
        Some(self.engine.ingress().options())
    }

    fn reg_cb_holding(&self, buf: &mut [u8], address: u16, n_regs: u16, mode: RegisterMode) -> RegisterResult {
        self.engine.ingress().reg_cb_holding(buf, address, n_regs, mode)
    }

    fn reg_cb_input(&self, buf: &[u8], address: u16, n_regs: u16) -> RegisterResult {
        self.engine.ingress().reg_cb_input(buf, address, n_regs)
    }

    fn reg_cb_coils(&self, buf: &mut [u8], address: u16, n_coils: u16, mode: RegisterMode) -> RegisterResult {
        self.engine.ingress().reg_cb_coils(buf, address, n_coils, mode)
    }

    fn reg_cb_discrete(&self, buf: &[u8], address: u16, n_discrete: u16) -> RegisterResult {
        self.engine.ingress().reg_cb_discrete(buf, address, n_discrete)
    }

    fn reg_cb_common(&self, buf: &[u8], address: u16, n_bytes: u16) -> RegisterResult {
        self.engine.ingress().reg_cb_common(buf, address, n_bytes)
    }
}
