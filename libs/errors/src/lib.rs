//! Error handling for the Modbus master controller
//!
//! Every fallible operation of the controller surfaces one of the closed set of
//! [`ErrorKind`]s. [`MbcError`] carries the kind plus enough context to print a
//! useful diagnostic; [`RegisterError`] is the narrower status returned by the
//! register-direction callbacks the transport invokes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// ErrorKind - closed taxonomy
// ============================================================================

/// Kind of a controller failure, independent of its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Caller supplied an empty or out-of-range argument
    InvalidArg,
    /// Interface not bound, slot missing, or engine in the wrong lifecycle state
    InvalidState,
    /// CID or name absent from the descriptor table
    NotFound,
    /// Layout tag unknown, feature disabled, or request shape unsupported
    NotSupported,
    /// Frame parsed but semantically wrong
    InvalidResponse,
    /// Transport timed out
    Timeout,
    /// Slave exception or other remote failure
    Fail,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArg => "INVALID_ARG",
            Self::InvalidState => "INVALID_STATE",
            Self::NotFound => "NOT_FOUND",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::Timeout => "TIMEOUT",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MbcError - Main error type
// ============================================================================

/// Main error type of the controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MbcError {
    // ======================================
    // Caller Errors
    // ======================================
    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    // ======================================
    // Remote & Transport Errors
    // ======================================
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Slave exception 0x{code:02X} on function 0x{function:02X}: {}", exception_description(*.code))]
    SlaveException { function: u8, code: u8 },

    #[error("Failure: {0}")]
    Fail(String),
}

impl MbcError {
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self::Fail(msg.into())
    }

    /// Kind of this error; a slave exception is a `FAIL`
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArg(_) => ErrorKind::InvalidArg,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::SlaveException { .. } | Self::Fail(_) => ErrorKind::Fail,
        }
    }

    /// Modbus exception code reported by the slave, if any
    pub fn exception_code(&self) -> Option<u8> {
        match self {
            Self::SlaveException { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Convert to the serialisable diagnostic record
    pub fn to_error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.kind(), self.to_string());
        match self.exception_code() {
            Some(code) => info
                .with_exception_code(code)
                .with_details(exception_description(code)),
            None => info,
        }
    }
}

/// Result type alias for the controller
pub type Result<T> = std::result::Result<T, MbcError>;

// ============================================================================
// ErrorInfo - diagnostic record
// ============================================================================

/// Serialisable error record printed by tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_code: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            exception_code: None,
            details: None,
        }
    }

    pub fn with_exception_code(mut self, code: u8) -> Self {
        self.exception_code = Some(code);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ============================================================================
// Register callback status
// ============================================================================

/// Status of a register-direction callback; success is `Ok(())`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// Address or length outside the active register window
    #[error("illegal register address")]
    NoReg,
    /// Empty buffer or malformed argument
    #[error("illegal argument")]
    Inval,
    /// No transaction is accepting data
    #[error("illegal state")]
    IllState,
    /// Ingress queue full
    #[error("insufficient resources")]
    NoRes,
}

pub type RegisterResult = std::result::Result<(), RegisterError>;

/// Human readable text of a Modbus exception code
pub fn exception_description(code: u8) -> &'static str {
    match code {
        0x01 => "Illegal Function",
        0x02 => "Illegal Data Address",
        0x03 => "Illegal Data Value",
        0x04 => "Slave Device Failure",
        0x05 => "Acknowledge",
        0x06 => "Slave Device Busy",
        0x08 => "Memory Parity Error",
        0x0A => "Gateway Path Unavailable",
        0x0B => "Gateway Target Device Failed to Respond",
        _ => "Unknown Exception",
    }
}
