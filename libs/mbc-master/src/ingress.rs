//! Register ingress
//!
//! The callback surface through which a transport hands response payload to
//! the engine (READ mode) or pulls request payload from it (WRITE mode).
//!
//! While a transaction is in flight the engine installs an active window
//! describing the register range of the request. Callbacks run on the
//! transport's context: they only validate against that window and enqueue
//! accepted bytes on a bounded channel. The engine drains the channel once the
//! transport returns and is the only writer of the caller's buffer.

use std::sync::Arc;

use bytes::Bytes;
use errors::{RegisterError, RegisterResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use crate::comm::PortMode;
use crate::request::ParameterRequest;

/// Depth of the per-transaction ingress queue
pub const INGRESS_QUEUE_DEPTH: usize = 8;

/// Data direction of a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterMode {
    /// Response payload flows into the master's buffer
    Read,
    /// Request payload flows out of the master's buffer
    Write,
}

/// Register bank of the active window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Holding,
    Input,
    Coils,
    Discrete,
    /// Generic byte window used by custom requests
    Common,
}

impl WindowKind {
    pub fn is_bit(self) -> bool {
        matches!(self, Self::Coils | Self::Discrete)
    }
}

/// Snapshot of the caller-visible register buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterOptions {
    pub mode: PortMode,
    /// Bank of the in-flight request, `None` between transactions
    pub reg_buffer_type: Option<WindowKind>,
    /// Register count of the in-flight request
    pub reg_buffer_size: u16,
}

#[derive(Debug)]
pub(crate) enum IngressEvent {
    /// Register bytes at a byte offset of the caller buffer
    Registers { offset: usize, data: Bytes },
    /// Packed bits at a bit offset of the caller buffer
    Bits { offset: usize, count: usize, data: Bytes },
    /// Bytes for the start of the caller buffer
    Common { data: Bytes },
}

impl IngressEvent {
    /// Copy the event into the caller buffer, returning the bytes touched
    pub(crate) fn apply_to(&self, dst: &mut [u8]) -> usize {
        match self {
            Self::Registers { offset, data } => {
                let end = (offset + data.len()).min(dst.len());
                if *offset >= end {
                    return 0;
                }
                dst[*offset..end].copy_from_slice(&data[..end - offset]);
                end - offset
            },
            Self::Bits {
                offset,
                count,
                data,
            } => {
                let count = (*count).min((dst.len() * 8).saturating_sub(*offset));
                for i in 0..count {
                    set_bit(dst, offset + i, get_bit(data, i));
                }
                count.div_ceil(8)
            },
            Self::Common { data } => {
                let len = data.len().min(dst.len());
                dst[..len].copy_from_slice(&data[..len]);
                len
            },
        }
    }
}

pub(crate) fn get_bit(bytes: &[u8], index: usize) -> bool {
    bytes
        .get(index / 8)
        .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
}

pub(crate) fn set_bit(bytes: &mut [u8], index: usize, value: bool) {
    if let Some(byte) = bytes.get_mut(index / 8) {
        if value {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
    }
}

#[derive(Debug)]
struct ActiveWindow {
    kind: WindowKind,
    mode: RegisterMode,
    start: u16,
    count: u16,
    /// Outgoing register image for write requests
    payload: Bytes,
    tx: mpsc::Sender<IngressEvent>,
    rejected: Option<RegisterError>,
}

impl ActiveWindow {
    /// Offset of `address` inside the window if `n` units fit
    fn offset(&self, kind: WindowKind, mode: RegisterMode, address: u16, n: u16) -> Result<usize, RegisterError> {
        let end = u32::from(self.start) + u32::from(self.count);
        if kind != self.kind
            || mode != self.mode
            || n == 0
            || address < self.start
            || u32::from(address) + u32::from(n) > end
        {
            return Err(RegisterError::NoReg);
        }
        Ok(usize::from(address - self.start))
    }

    fn send(&self, event: IngressEvent) -> RegisterResult {
        trace!("Ingress {:?}", event);
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => RegisterError::NoRes,
            TrySendError::Closed(_) => RegisterError::IllState,
        })
    }
}

/// Callback handle shared between the engine and its transport
#[derive(Debug, Clone)]
pub struct RegisterIngress {
    mode: PortMode,
    window: Arc<Mutex<Option<ActiveWindow>>>,
}

impl RegisterIngress {
    pub fn new(mode: PortMode) -> Self {
        Self {
            mode,
            window: Arc::new(Mutex::new(None)),
        }
    }

    /// Install the window of a request about to be dispatched
    pub(crate) fn open(&self, request: &ParameterRequest, kind: WindowKind, payload: Bytes) -> mpsc::Receiver<IngressEvent> {
        let (tx, rx) = mpsc::channel(INGRESS_QUEUE_DEPTH);
        *self.window.lock() = Some(ActiveWindow {
            kind,
            mode: request.mode(),
            start: request.reg_start,
            count: request.reg_count,
            payload,
            tx,
            rejected: None,
        });
        rx
    }

    /// Remove the active window, returning the first refusal it recorded
    pub(crate) fn close(&self) -> Option<RegisterError> {
        self.window.lock().take().and_then(|w| w.rejected)
    }

    pub fn is_active(&self) -> bool {
        self.window.lock().is_some()
    }

    pub fn options(&self) -> MasterOptions {
        let window = self.window.lock();
        MasterOptions {
            mode: self.mode,
            reg_buffer_type: window.as_ref().map(|w| w.kind),
            reg_buffer_size: window.as_ref().map_or(0, |w| w.count),
        }
    }

    fn with_window(
        &self,
        kind: WindowKind,
        mode: RegisterMode,
        address: u16,
        n: u16,
        f: impl FnOnce(&ActiveWindow, usize) -> RegisterResult,
    ) -> RegisterResult {
        let mut guard = self.window.lock();
        let window = guard.as_mut().ok_or(RegisterError::IllState)?;
        let result = window
            .offset(kind, mode, address, n)
            .and_then(|offset| f(window, offset));
        if result == Err(RegisterError::NoReg) {
            window.rejected.get_or_insert(RegisterError::NoReg);
        }
        result
    }

    // ========================================================================
    // Register-direction callbacks
    // ========================================================================

    /// Holding registers, both directions
    pub fn reg_cb_holding(&self, buf: &mut [u8], address: u16, n_regs: u16, mode: RegisterMode) -> RegisterResult {
        let len = usize::from(n_regs) * 2;
        self.with_window(WindowKind::Holding, mode, address, n_regs, |window, offset| {
            if buf.len() < len {
                return Err(RegisterError::Inval);
            }
            match mode {
                RegisterMode::Read => window.send(IngressEvent::Registers {
                    offset: offset * 2,
                    data: Bytes::copy_from_slice(&buf[..len]),
                }),
                RegisterMode::Write => {
                    let src = window
                        .payload
                        .get(offset * 2..offset * 2 + len)
                        .ok_or(RegisterError::NoReg)?;
                    buf[..len].copy_from_slice(src);
                    Ok(())
                },
            }
        })
    }

    /// Input registers, READ only
    pub fn reg_cb_input(&self, buf: &[u8], address: u16, n_regs: u16) -> RegisterResult {
        let len = usize::from(n_regs) * 2;
        self.with_window(WindowKind::Input, RegisterMode::Read, address, n_regs, |window, offset| {
            if buf.len() < len {
                return Err(RegisterError::Inval);
            }
            window.send(IngressEvent::Registers {
                offset: offset * 2,
                data: Bytes::copy_from_slice(&buf[..len]),
            })
        })
    }

    /// Coils, both directions; bits are packed LSB first
    pub fn reg_cb_coils(&self, buf: &mut [u8], address: u16, n_coils: u16, mode: RegisterMode) -> RegisterResult {
        let count = usize::from(n_coils);
        let len = count.div_ceil(8);
        self.with_window(WindowKind::Coils, mode, address, n_coils, |window, offset| {
            if buf.len() < len {
                return Err(RegisterError::Inval);
            }
            match mode {
                RegisterMode::Read => window.send(IngressEvent::Bits {
                    offset,
                    count,
                    data: Bytes::copy_from_slice(&buf[..len]),
                }),
                RegisterMode::Write => {
                    buf[..len].fill(0);
                    for i in 0..count {
                        set_bit(buf, i, get_bit(&window.payload, offset + i));
                    }
                    Ok(())
                },
            }
        })
    }

    /// Discrete inputs, READ only
    pub fn reg_cb_discrete(&self, buf: &[u8], address: u16, n_discrete: u16) -> RegisterResult {
        let count = usize::from(n_discrete);
        let len = count.div_ceil(8);
        self.with_window(WindowKind::Discrete, RegisterMode::Read, address, n_discrete, |window, offset| {
            if buf.len() < len {
                return Err(RegisterError::Inval);
            }
            window.send(IngressEvent::Bits {
                offset,
                count,
                data: Bytes::copy_from_slice(&buf[..len]),
            })
        })
    }

    /// Generic byte window over the caller buffer
    ///
    /// Accepts only `address == 0` and `1 <= n_bytes <= 2 * reg_buffer_size`.
    /// Each accepted call replaces the start of the buffer; there is no
    /// multi-slice accumulation.
    pub fn reg_cb_common(&self, buf: &[u8], address: u16, n_bytes: u16) -> RegisterResult {
        let mut guard = self.window.lock();
        let window = guard.as_mut().ok_or(RegisterError::IllState)?;
        let capacity = usize::from(window.count) * 2;
        let n = usize::from(n_bytes);
        if address != 0 || n == 0 || n > capacity {
            window.rejected.get_or_insert(RegisterError::NoReg);
            return Err(RegisterError::NoReg);
        }
        if buf.len() < n {
            return Err(RegisterError::Inval);
        }
        window.send(IngressEvent::Common {
            data: Bytes::copy_from_slice(&buf[..n.min(capacity)]),
        })
    }
}
