//! Transaction engine
//!
//! Runs one Modbus transaction at a time over the bound transport, assigns
//! transaction ids, records the diagnostics of the last transaction and
//! translates parameter reads and writes into register requests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use errors::{MbcError, RegisterError, Result};
use mbc_codec::{get_param_data, native_values, set_param_data, LayoutTag};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::comm::CommInfo;
use crate::descriptor::ParameterDescriptor;
use crate::ingress::{RegisterIngress, RegisterMode};
use crate::registry::{Access, DescriptorRegistry};
use crate::request::{ParameterRequest, RequestFrame, MAX_IMAGE_SIZE};
use crate::transport::{MasterTransport, TransportError};

/// Process-wide transaction counter; ids are never reused
static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(0);

fn next_transaction_id() -> u64 {
    NEXT_TRANSACTION_ID.fetch_add(1, Ordering::SeqCst) + 1
}

/// Error class of the last transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum ErrorClass {
    /// Dispatched, no outcome yet
    #[default]
    Init = 0,
    RespondTimeout = 1,
    ReceiveData = 2,
    ExecuteFunction = 3,
    Ok = 4,
}

impl ErrorClass {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Diagnostics of the last completed or in-flight transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub transaction_id: u64,
    pub dest_addr: u8,
    pub function_code: u8,
    pub exception_code: u8,
    pub error_class: ErrorClass,
}

impl fmt::Display for TransactionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} slave={} fc=0x{:02X} exception=0x{:02X} class={:?}",
            self.transaction_id, self.dest_addr, self.function_code, self.exception_code, self.error_class
        )
    }
}

/// Phase of the last transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    #[default]
    Idle,
    Dispatched,
    AwaitingResponse,
    Completed,
    Exception,
    Timeout,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unconfigured,
    Configured,
    Started,
}

#[derive(Debug)]
struct EngineStatus {
    lifecycle: Lifecycle,
    comm: Option<CommInfo>,
}

#[derive(Debug, Default)]
struct LastTransaction {
    info: TransactionInfo,
    state: TransactionState,
}

pub struct TransactionEngine {
    transport: Arc<dyn MasterTransport>,
    registry: DescriptorRegistry,
    ingress: RegisterIngress,
    /// Serialises transactions and lifecycle changes
    serial: tokio::sync::Mutex<()>,
    status: Mutex<EngineStatus>,
    last: Mutex<LastTransaction>,
}

impl fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("mode", &self.transport.mode())
            .field("status", &*self.status.lock())
            .field("last", &*self.last.lock())
            .finish()
    }
}

impl TransactionEngine {
    pub fn new(transport: Arc<dyn MasterTransport>) -> Self {
        let ingress = RegisterIngress::new(transport.mode());
        Self {
            transport,
            registry: DescriptorRegistry::new(),
            ingress,
            serial: tokio::sync::Mutex::new(()),
            status: Mutex::new(EngineStatus {
                lifecycle: Lifecycle::Unconfigured,
                comm: None,
            }),
            last: Mutex::new(LastTransaction::default()),
        }
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn ingress(&self) -> &RegisterIngress {
        &self.ingress
    }

    pub fn is_started(&self) -> bool {
        self.status.lock().lifecycle == Lifecycle::Started
    }

    /// Communication info accepted by `setup`
    pub fn comm_info(&self) -> Option<CommInfo> {
        self.status.lock().comm.clone()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Store validated communication info; only allowed before `start`
    pub fn setup(&self, comm: CommInfo) -> Result<()> {
        let mut status = self.status.lock();
        if status.lifecycle == Lifecycle::Started {
            return Err(MbcError::invalid_state("setup is not allowed while started"));
        }
        comm.validate()?;
        if comm.mode != self.transport.mode() {
            return Err(MbcError::not_supported(format!(
                "{} communication info for a {} transport",
                comm.mode,
                self.transport.mode()
            )));
        }
        debug!("Master setup: {:?}", comm);
        status.comm = Some(comm);
        status.lifecycle = Lifecycle::Configured;
        Ok(())
    }

    /// Open the transport
    pub async fn start(&self) -> Result<()> {
        let _serial = self.serial.lock().await;
        let comm = {
            let status = self.status.lock();
            match (status.lifecycle, &status.comm) {
                (Lifecycle::Started, _) => return Err(MbcError::invalid_state("master already started")),
                (Lifecycle::Configured, Some(comm)) => comm.clone(),
                _ => return Err(MbcError::invalid_state("master is not set up")),
            }
        };

        self.transport.open(&comm).await.map_err(MbcError::from)?;
        self.status.lock().lifecycle = Lifecycle::Started;
        info!("Master started: {}", comm.mode);
        Ok(())
    }

    /// Close the transport and release the descriptor table
    pub async fn destroy(&self) -> Result<()> {
        let _serial = self.serial.lock().await;
        let was_started = self.status.lock().lifecycle == Lifecycle::Started;
        let closed = if was_started {
            self.transport.close().await.map_err(MbcError::from)
        } else {
            Ok(())
        };

        self.registry.clear();
        *self.last.lock() = LastTransaction::default();
        {
            let mut status = self.status.lock();
            status.lifecycle = Lifecycle::Unconfigured;
            status.comm = None;
        }
        if let Err(err) = &closed {
            warn!("Transport close failed: {}", err);
        }
        info!("Master destroyed");
        closed
    }

    fn response_timeout(&self) -> Result<Duration> {
        let status = self.status.lock();
        match (&status.lifecycle, &status.comm) {
            (Lifecycle::Started, Some(comm)) => Ok(comm.response_timeout()),
            _ => Err(MbcError::invalid_state("master is not started")),
        }
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Diagnostics of the last transaction
    pub fn get_transaction_info(&self) -> Result<TransactionInfo> {
        self.response_timeout()?;
        Ok(self.last.lock().info)
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.last.lock().state
    }

    fn record(&self, info: TransactionInfo, state: TransactionState) {
        let mut last = self.last.lock();
        last.info = info;
        last.state = state;
    }

    /// Run one transaction
    ///
    /// For reads `data` receives the register image; for writes it provides
    /// it. `data` must hold at least the image length of the request.
    pub async fn send_request(&self, request: &ParameterRequest, data: &mut [u8]) -> Result<()> {
        self.response_timeout()?;
        request.validate()?;
        let image_len = request.image_len();
        if data.len() < image_len {
            return Err(MbcError::invalid_arg(format!(
                "data buffer of {} bytes, request needs {}",
                data.len(),
                image_len
            )));
        }

        let _serial = self.serial.lock().await;
        // destroy may have run while waiting
        let timeout = self.response_timeout()?;
        self.execute(request, &mut data[..image_len], timeout).await
    }

    async fn execute(&self, request: &ParameterRequest, data: &mut [u8], timeout: Duration) -> Result<()> {
        let kind = request.window_kind()?;
        let mode = request.mode();
        let mut info = TransactionInfo {
            transaction_id: next_transaction_id(),
            dest_addr: request.slave_addr,
            function_code: request.function_code,
            exception_code: 0,
            error_class: ErrorClass::Init,
        };
        self.record(info, TransactionState::Dispatched);

        let payload = match mode {
            RegisterMode::Write => Bytes::copy_from_slice(data),
            RegisterMode::Read => Bytes::new(),
        };
        let mut rx = self.ingress.open(request, kind, payload);
        let frame = RequestFrame {
            transaction_id: info.transaction_id,
            request: *request,
        };
        debug!(
            "Transaction {} dispatched: slave={}, fc=0x{:02X}, start={}, count={}",
            info.transaction_id, request.slave_addr, request.function_code, request.reg_start, request.reg_count
        );

        self.record(info, TransactionState::AwaitingResponse);
        let outcome = match tokio::time::timeout(timeout, self.transport.transact(&frame, &self.ingress)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout),
        };

        let refused = self.ingress.close();
        let mut delivered = 0;
        while let Ok(event) = rx.try_recv() {
            delivered += event.apply_to(data);
        }

        let outcome = match (outcome, refused) {
            (Ok(()), Some(RegisterError::NoReg)) => Err(TransportError::NoRegister),
            (Ok(()), _) if mode == RegisterMode::Read && delivered == 0 => {
                Err(TransportError::invalid_frame("response carried no payload"))
            },
            (outcome, _) => outcome,
        };

        match outcome {
            Ok(()) => {
                info.error_class = ErrorClass::Ok;
                self.record(info, TransactionState::Completed);
                debug!("Transaction {} completed: {} bytes", info.transaction_id, delivered);
                Ok(())
            },
            Err(err) => {
                let (error, class, state, exception_code) = classify(err, request, timeout);
                info.error_class = class;
                info.exception_code = exception_code;
                self.record(info, state);
                warn!("Transaction {} failed: {}", info.transaction_id, error);
                Err(error)
            },
        }
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Read a parameter into `value` in native representation
    ///
    /// Returns the descriptor's layout tag. A decoded element outside the
    /// descriptor's limits yields `INVALID_RESPONSE` after `value` is written.
    pub async fn get_parameter(&self, cid: u16, name: &str, value: &mut [u8]) -> Result<LayoutTag> {
        let desc = self.registry.lookup(cid, name)?;
        if !DescriptorRegistry::check_access(&desc, Access::Read) {
            return Err(MbcError::invalid_arg(format!("'{}' is not readable", desc.name)));
        }
        let size = value_size(&desc, value.len())?;

        let request = ParameterRequest::read(&desc);
        fits_window(&desc, &request, size)?;
        let mut staging = [0u8; MAX_IMAGE_SIZE];
        self.send_request(&request, &mut staging).await?;
        get_param_data(&mut value[..size], &staging, desc.type_tag, size)?;

        if let Some(bad) = out_of_range(&desc, &value[..size]) {
            return Err(MbcError::invalid_response(format!(
                "'{}' read {} outside its limits",
                desc.name, bad
            )));
        }
        Ok(desc.type_tag)
    }

    /// Write a parameter from `value` in native representation
    ///
    /// The value is marshalled into the register image here; callers never
    /// pre-pack registers.
    pub async fn set_parameter(&self, cid: u16, name: &str, value: &[u8]) -> Result<LayoutTag> {
        let desc = self.registry.lookup(cid, name)?;
        if !DescriptorRegistry::check_access(&desc, Access::Write) {
            return Err(MbcError::invalid_arg(format!("'{}' is not writable", desc.name)));
        }
        let request = ParameterRequest::write(&desc)?;
        let size = value_size(&desc, value.len())?;
        fits_window(&desc, &request, size)?;
        if let Some(bad) = out_of_range(&desc, &value[..size]) {
            return Err(MbcError::invalid_arg(format!(
                "'{}' value {} outside its limits",
                desc.name, bad
            )));
        }

        let mut staging = [0u8; MAX_IMAGE_SIZE];
        set_param_data(&mut staging, &value[..size], desc.type_tag, size)?;
        self.send_request(&request, &mut staging).await?;
        Ok(desc.type_tag)
    }
}

fn value_size(desc: &ParameterDescriptor, available: usize) -> Result<usize> {
    let size = usize::from(desc.byte_size);
    if available < size {
        return Err(MbcError::invalid_arg(format!(
            "'{}' needs a {} byte value buffer, got {}",
            desc.name, size, available
        )));
    }
    Ok(size)
}

/// The whole value must travel in the request's register image
fn fits_window(desc: &ParameterDescriptor, request: &ParameterRequest, size: usize) -> Result<()> {
    if size > request.image_len() {
        return Err(MbcError::invalid_arg(format!(
            "'{}' value of {} bytes does not fit a {} byte register image",
            desc.name,
            size,
            request.image_len()
        )));
    }
    Ok(())
}

fn out_of_range(desc: &ParameterDescriptor, native: &[u8]) -> Option<f64> {
    desc.opts.range()?;
    native_values(desc.type_tag, native)
        .into_iter()
        .find(|v| !desc.opts.accepts(*v))
}

fn classify(
    err: TransportError,
    request: &ParameterRequest,
    timeout: Duration,
) -> (MbcError, ErrorClass, TransactionState, u8) {
    match err {
        TransportError::Exception(code) => (
            MbcError::SlaveException {
                function: request.function_code,
                code,
            },
            ErrorClass::ExecuteFunction,
            TransactionState::Exception,
            code,
        ),
        TransportError::Timeout => (
            MbcError::timeout(format!(
                "slave {} did not respond within {:?}",
                request.slave_addr, timeout
            )),
            ErrorClass::RespondTimeout,
            TransactionState::Timeout,
            0,
        ),
        TransportError::InvalidFrame(msg) => (
            MbcError::invalid_response(msg),
            ErrorClass::ReceiveData,
            TransactionState::Invalid,
            0,
        ),
        TransportError::NoRegister => (
            MbcError::not_supported(format!(
                "slave {} payload outside register window {}+{}",
                request.slave_addr, request.reg_start, request.reg_count
            )),
            ErrorClass::ExecuteFunction,
            TransactionState::Exception,
            0x02,
        ),
        TransportError::NotSupported => (
            MbcError::not_supported(format!(
                "function 0x{:02X} not supported by the transport",
                request.function_code
            )),
            ErrorClass::ExecuteFunction,
            TransactionState::Invalid,
            0,
        ),
        TransportError::Io(msg) => (
            MbcError::fail(msg),
            ErrorClass::ReceiveData,
            TransactionState::Invalid,
            0,
        ),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_are_monotonic() {
        let a = next_transaction_id();
        let b = next_transaction_id();
        assert!(a >= 1);
        assert!(b > a);
    }

    #[test]
    fn test_error_class_codes() {
        assert_eq!(ErrorClass::Init.code(), 0);
        assert_eq!(ErrorClass::RespondTimeout.code(), 1);
        assert_eq!(ErrorClass::ReceiveData.code(), 2);
        assert_eq!(ErrorClass::ExecuteFunction.code(), 3);
        assert_eq!(ErrorClass::Ok.code(), 4);
    }

    #[test]
    fn test_value_must_fit_window() {
        // byte_size set directly, skipping validate()
        let mut desc = ParameterDescriptor::new(1, "pair", LayoutTag::FloatAbcd);
        desc.byte_size = 8;
        let request = ParameterRequest::read(&desc);
        assert_eq!(request.image_len(), 4);
        assert_eq!(
            fits_window(&desc, &request, 8).unwrap_err().kind(),
            errors::ErrorKind::InvalidArg
        );
        assert!(fits_window(&desc, &request, 4).is_ok());
    }

    #[test]
    fn test_classify_exception() {
        let request = ParameterRequest::new(3, 0x03, 0, 1);
        let (err, class, state, code) =
            classify(TransportError::Exception(0x02), &request, Duration::from_millis(10));
        assert_eq!(err.exception_code(), Some(0x02));
        assert_eq!(err.kind(), errors::ErrorKind::Fail);
        assert_eq!(class, ErrorClass::ExecuteFunction);
        assert_eq!(state, TransactionState::Exception);
        assert_eq!(code, 0x02);
    }

    #[test]
    fn test_classify_timeout_and_frames() {
        let request = ParameterRequest::new(3, 0x04, 0, 1);
        let (err, class, state, _) = classify(TransportError::Timeout, &request, Duration::from_millis(10));
        assert_eq!(err.kind(), errors::ErrorKind::Timeout);
        assert_eq!(class, ErrorClass::RespondTimeout);
        assert_eq!(state, TransactionState::Timeout);

        let (err, class, _, _) = classify(TransportError::invalid_frame("crc"), &request, Duration::ZERO);
        assert_eq!(err.kind(), errors::ErrorKind::InvalidResponse);
        assert_eq!(class, ErrorClass::ReceiveData);

        let (err, _, _, code) = classify(TransportError::NoRegister, &request, Duration::ZERO);
        assert_eq!(err.kind(), errors::ErrorKind::NotSupported);
        assert_eq!(code, 0x02);
    }
}
