//! Transport contract
//!
//! A transport frames the request for its wire (RTU, ASCII or TCP), sends it
//! and validates the response. It never returns payload directly: response
//! data is handed to the [`RegisterIngress`] callbacks before `transact`
//! returns, and data for write requests is pulled from the same callbacks in
//! WRITE mode.

use async_trait::async_trait;
use errors::MbcError;
use thiserror::Error;

use crate::comm::{CommInfo, PortMode};
use crate::ingress::RegisterIngress;
use crate::request::RequestFrame;

/// Failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("response timeout")]
    Timeout,

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("slave exception 0x{0:02X}")]
    Exception(u8),

    #[error("register window refused the payload")]
    NoRegister,

    #[error("request not supported by the transport")]
    NotSupported,

    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }
}

impl From<TransportError> for MbcError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => MbcError::timeout("transport timed out"),
            TransportError::InvalidFrame(msg) => MbcError::invalid_response(msg),
            TransportError::Exception(code) => MbcError::SlaveException { function: 0, code },
            TransportError::NoRegister => MbcError::not_supported("register window refused"),
            TransportError::NotSupported => MbcError::not_supported("transport"),
            TransportError::Io(msg) => MbcError::fail(msg),
        }
    }
}

/// Backend that moves requests over a physical link
#[async_trait]
pub trait MasterTransport: Send + Sync {
    /// Framing this transport implements
    fn mode(&self) -> PortMode;

    /// Acquire the port
    async fn open(&self, comm: &CommInfo) -> Result<(), TransportError>;

    /// Run one request/response exchange
    ///
    /// Response payload must be delivered through `ingress` before returning.
    async fn transact(&self, frame: &RequestFrame, ingress: &RegisterIngress) -> Result<(), TransportError>;

    /// Release the port
    async fn close(&self) -> Result<(), TransportError>;
}
