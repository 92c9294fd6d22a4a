//! Public API façade
//!
//! [`MasterController`] validates arguments, checks that an interface is bound
//! and dispatches to it. Failures are logged with the operation name and
//! error kind, then returned unchanged.

use std::sync::{Arc, OnceLock};

use errors::{MbcError, RegisterError, RegisterResult, Result};
use mbc_codec::LayoutTag;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::comm::CommInfo;
use crate::descriptor::ParameterDescriptor;
use crate::engine::TransactionInfo;
use crate::iface::MasterInterface;
use crate::ingress::{MasterOptions, RegisterMode};
use crate::registry::DescriptorRef;
use crate::request::ParameterRequest;

fn report<T>(op: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        error!("{} failed [{}]: {}", op, err.kind(), err);
    }
    result
}

#[derive(Default)]
pub struct MasterController {
    iface: RwLock<Option<Arc<dyn MasterInterface>>>,
}

impl std::fmt::Debug for MasterController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterController")
            .field("iface", &self.iface.read().as_ref().map(|i| i.name().to_string()))
            .finish()
    }
}

impl MasterController {
    pub fn new() -> Self {
        Self::default()
    }

    fn iface(&self, op: &str) -> Result<Arc<dyn MasterInterface>> {
        self.iface.read().clone().ok_or_else(|| {
            let err = MbcError::invalid_state("master interface is not initialised");
            error!("{} failed [{}]: {}", op, err.kind(), err);
            err
        })
    }

    pub fn is_bound(&self) -> bool {
        self.iface.read().is_some()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bind a master interface
    ///
    /// Only allowed while nothing is bound, i.e. at startup or after a
    /// successful `destroy`.
    pub fn init_iface(&self, iface: Arc<dyn MasterInterface>) -> Result<()> {
        let mut slot = self.iface.write();
        if let Some(current) = slot.as_ref() {
            return report(
                "init_iface",
                Err(MbcError::invalid_state(format!(
                    "interface '{}' is already bound",
                    current.name()
                ))),
            );
        }
        debug!("Master interface '{}' bound", iface.name());
        *slot = Some(iface);
        Ok(())
    }

    /// Destroy the bound interface and unbind it
    pub async fn destroy(&self) -> Result<()> {
        let iface = self.iface("destroy")?;
        report("destroy", iface.destroy().await)?;
        let mut slot = self.iface.write();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &iface)) {
            *slot = None;
        }
        Ok(())
    }

    pub async fn setup(&self, comm: CommInfo) -> Result<()> {
        let iface = self.iface("setup")?;
        report("setup", iface.setup(comm).await)
    }

    pub async fn start(&self) -> Result<()> {
        let iface = self.iface("start")?;
        report("start", iface.start().await)
    }

    // ========================================================================
    // Descriptors
    // ========================================================================

    pub fn set_descriptor(&self, table: impl Into<Arc<[ParameterDescriptor]>>) -> Result<()> {
        let iface = self.iface("set_descriptor")?;
        let table = table.into();
        if table.is_empty() {
            return report("set_descriptor", Err(MbcError::invalid_arg("descriptor table is empty")));
        }
        report("set_descriptor", iface.set_descriptor(table))
    }

    pub fn get_cid_info(&self, cid: u16) -> Result<DescriptorRef> {
        let iface = self.iface("get_cid_info")?;
        report("get_cid_info", iface.get_cid_info(cid))
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Read a parameter into `value`; returns its layout tag
    pub async fn get_parameter(&self, cid: u16, name: &str, value: &mut [u8]) -> Result<LayoutTag> {
        let iface = self.iface("get_parameter")?;
        if name.is_empty() || value.is_empty() {
            return report(
                "get_parameter",
                Err(MbcError::invalid_arg("parameter name and value buffer are required")),
            );
        }
        report("get_parameter", iface.get_parameter(cid, name, value).await)
    }

    /// Write a parameter from `value`; returns its layout tag
    pub async fn set_parameter(&self, cid: u16, name: &str, value: &[u8]) -> Result<LayoutTag> {
        let iface = self.iface("set_parameter")?;
        if name.is_empty() || value.is_empty() {
            return report(
                "set_parameter",
                Err(MbcError::invalid_arg("parameter name and value buffer are required")),
            );
        }
        report("set_parameter", iface.set_parameter(cid, name, value).await)
    }

    pub async fn send_request(&self, request: &ParameterRequest, data: &mut [u8]) -> Result<()> {
        let iface = self.iface("send_request")?;
        if data.is_empty() {
            return report("send_request", Err(MbcError::invalid_arg("data buffer is empty")));
        }
        report("send_request", iface.send_request(request, data).await)
    }

    pub fn get_transaction_info(&self) -> Result<TransactionInfo> {
        let iface = self.iface("get_transaction_info")?;
        report("get_transaction_info", iface.get_transaction_info())
    }

    /// Marshal a native value into a register image
    ///
    /// Pure codec work; no interface needs to be bound.
    pub fn set_param_data(&self, dst: &mut [u8], src: &[u8], tag: LayoutTag, byte_size: usize) -> Result<()> {
        report("set_param_data", mbc_codec::set_param_data(dst, src, tag, byte_size))
    }

    /// Unmarshal a register image into a native value
    pub fn get_param_data(&self, dst: &mut [u8], src: &[u8], tag: LayoutTag, byte_size: usize) -> Result<()> {
        report("get_param_data", mbc_codec::get_param_data(dst, src, tag, byte_size))
    }

    pub fn options(&self) -> Option<MasterOptions> {
        self.iface.read().as_ref().and_then(|iface| iface.options())
    }

    // ========================================================================
    // Register-direction callbacks
    // ========================================================================

    fn bound(&self) -> std::result::Result<Arc<dyn MasterInterface>, RegisterError> {
        self.iface.read().clone().ok_or(RegisterError::IllState)
    }

    pub fn reg_cb_holding(&self, buf: &mut [u8], address: u16, n_regs: u16, mode: RegisterMode) -> RegisterResult {
        self.bound()?.reg_cb_holding(buf, address, n_regs, mode)
    }

    pub fn reg_cb_input(&self, buf: &[u8], address: u16, n_regs: u16) -> RegisterResult {
        self.bound()?.reg_cb_input(buf, address, n_regs)
    }

    pub fn reg_cb_coils(&self, buf: &mut [u8], address: u16, n_coils: u16, mode: RegisterMode) -> RegisterResult {
        self.bound()?.reg_cb_coils(buf, address, n_coils, mode)
    }

    pub fn reg_cb_discrete(&self, buf: &[u8], address: u16, n_discrete: u16) -> RegisterResult {
        self.bound()?.reg_cb_discrete(buf, address, n_discrete)
    }

    pub fn reg_cb_common(&self, buf: &[u8], address: u16, n_bytes: u16) -> RegisterResult {
        self.bound()?.reg_cb_common(buf, address, n_bytes)
    }
}

/// Process-wide controller instance
pub fn controller() -> &'static MasterController {
    static CONTROLLER: OnceLock<MasterController> = OnceLock::new();
    CONTROLLER.get_or_init(MasterController::new)
}
