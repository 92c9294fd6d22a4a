//! Simulated slave transport
//!
//! An in-memory Modbus slave population behind the [`MasterTransport`]
//! contract. Payload moves through the register ingress exactly as with a
//! wire transport: request data is pulled in WRITE mode, response data is
//! pushed in READ mode. Faults can be queued per transaction for testing.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use errors::RegisterError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comm::{CommInfo, PortMode};
use crate::ingress::{get_bit, set_bit, RegisterIngress, RegisterMode, WindowKind};
use crate::request::function_code::*;
use crate::request::{ParameterRequest, RequestFrame};
use crate::transport::{MasterTransport, TransportError};

const ILLEGAL_FUNCTION: u8 = 0x01;
const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
/// Run indicator appended to the report-slave-id payload
const RUN_INDICATOR_ON: u8 = 0xFF;

/// Outcome forced on the next transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transport reports a response timeout
    Timeout,
    /// Transport never completes; the engine's own timeout fires
    Hang,
    /// Slave answers with an exception response
    Exception(u8),
    /// Response frame fails validation
    InvalidFrame,
    /// Exchange completes without delivering any payload
    Silent,
    /// Payload is delivered one register past the request window
    RefuseWindow,
}

fn default_bank_size() -> u32 {
    0x1_0000
}

/// Register maps keyed by address
///
/// Keys may arrive as integers (YAML) or as strings (JSON, or any document
/// passed through the layered loader); `0x` hex is accepted in strings.
mod address_map {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[derive(PartialEq, Eq, PartialOrd, Ord, Deserialize)]
    #[serde(untagged)]
    enum Key {
        Number(u16),
        Text(String),
    }

    fn parse(text: &str) -> Result<u16, std::num::ParseIntError> {
        let text = text.trim();
        match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => text.parse(),
        }
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<u16, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        BTreeMap::<Key, V>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, value)| match key {
                Key::Number(address) => Ok((address, value)),
                Key::Text(text) => parse(&text)
                    .map(|address| (address, value))
                    .map_err(|e| D::Error::custom(format!("register address '{text}': {e}"))),
            })
            .collect()
    }
}

/// Register banks of one simulated slave
///
/// Unset registers and bits read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedSlave {
    pub address: u8,
    #[serde(default, deserialize_with = "address_map::deserialize")]
    pub holding: BTreeMap<u16, u16>,
    #[serde(default, deserialize_with = "address_map::deserialize")]
    pub input: BTreeMap<u16, u16>,
    #[serde(default, deserialize_with = "address_map::deserialize")]
    pub coils: BTreeMap<u16, bool>,
    #[serde(default, deserialize_with = "address_map::deserialize")]
    pub discrete: BTreeMap<u16, bool>,
    /// Payload of report slave id (0x11), before the run indicator
    #[serde(default)]
    pub slave_id: Vec<u8>,
    /// Addresses at or above this answer with exception 0x02
    #[serde(default = "default_bank_size")]
    pub bank_size: u32,
}

impl SimulatedSlave {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            holding: BTreeMap::new(),
            input: BTreeMap::new(),
            coils: BTreeMap::new(),
            discrete: BTreeMap::new(),
            slave_id: Vec::new(),
            bank_size: default_bank_size(),
        }
    }

    pub fn with_holding(mut self, start: u16, values: &[u16]) -> Self {
        fill(&mut self.holding, start, values.iter().copied());
        self
    }

    pub fn with_input(mut self, start: u16, values: &[u16]) -> Self {
        fill(&mut self.input, start, values.iter().copied());
        self
    }

    pub fn with_coils(mut self, start: u16, values: &[bool]) -> Self {
        fill(&mut self.coils, start, values.iter().copied());
        self
    }

    pub fn with_discrete(mut self, start: u16, values: &[bool]) -> Self {
        fill(&mut self.discrete, start, values.iter().copied());
        self
    }

    pub fn with_slave_id(mut self, slave_id: impl Into<Vec<u8>>) -> Self {
        self.slave_id = slave_id.into();
        self
    }

    pub fn with_bank_size(mut self, bank_size: u32) -> Self {
        self.bank_size = bank_size;
        self
    }

    fn check_range(&self, request: &ParameterRequest) -> Result<(), TransportError> {
        if u32::from(request.reg_start) + u32::from(request.reg_count) > self.bank_size {
            return Err(TransportError::Exception(ILLEGAL_DATA_ADDRESS));
        }
        Ok(())
    }

    fn respond(&self, request: &ParameterRequest) -> Result<Response, TransportError> {
        let start = request.reg_start;
        let count = request.reg_count;
        if request.function_code != REPORT_SLAVE_ID {
            self.check_range(request)?;
        }
        let response = match request.function_code {
            READ_HOLDING_REGISTERS => Response::Holding(words_to_bytes(&self.holding, start, count)),
            READ_INPUT_REGISTERS => Response::Input(words_to_bytes(&self.input, start, count)),
            READ_COILS => Response::Coils(pack_bits(&self.coils, start, count)),
            READ_DISCRETE_INPUTS => Response::Discrete(pack_bits(&self.discrete, start, count)),
            REPORT_SLAVE_ID => {
                let mut data = self.slave_id.clone();
                data.push(RUN_INDICATOR_ON);
                Response::SlaveId(data)
            },
            _ => return Err(TransportError::Exception(ILLEGAL_FUNCTION)),
        };
        Ok(response)
    }

    fn store(&mut self, request: &ParameterRequest, data: &WriteData) -> Result<(), TransportError> {
        self.check_range(request)?;
        match data {
            WriteData::Registers(words) => fill(&mut self.holding, request.reg_start, words.iter().copied()),
            WriteData::Coils(bits) => fill(&mut self.coils, request.reg_start, bits.iter().copied()),
        }
        Ok(())
    }
}

fn fill<V>(bank: &mut BTreeMap<u16, V>, start: u16, values: impl Iterator<Item = V>) {
    for (address, value) in (start..=u16::MAX).zip(values) {
        bank.insert(address, value);
    }
}

fn addresses(start: u16, count: u16) -> impl Iterator<Item = u16> {
    (start..=u16::MAX).take(usize::from(count))
}

fn words_to_bytes(bank: &BTreeMap<u16, u16>, start: u16, count: u16) -> Vec<u8> {
    addresses(start, count)
        .flat_map(|a| bank.get(&a).copied().unwrap_or(0).to_be_bytes())
        .collect()
}

fn pack_bits(bank: &BTreeMap<u16, bool>, start: u16, count: u16) -> Vec<u8> {
    let mut packed = vec![0u8; usize::from(count).div_ceil(8)];
    for (i, address) in addresses(start, count).enumerate() {
        set_bit(&mut packed, i, bank.get(&address).copied().unwrap_or(false));
    }
    packed
}

#[derive(Debug)]
enum Response {
    Holding(Vec<u8>),
    Input(Vec<u8>),
    Coils(Vec<u8>),
    Discrete(Vec<u8>),
    SlaveId(Vec<u8>),
}

#[derive(Debug)]
enum WriteData {
    Registers(Vec<u16>),
    Coils(Vec<bool>),
}

fn callback_error(err: RegisterError) -> TransportError {
    match err {
        RegisterError::NoReg => TransportError::NoRegister,
        other => TransportError::io(format!("register callback failed: {other}")),
    }
}

/// Pull the request payload of a write from the ingress
fn pull_write(request: &ParameterRequest, ingress: &RegisterIngress) -> Result<WriteData, TransportError> {
    let count = usize::from(request.reg_count);
    match request.function_code {
        WRITE_SINGLE_REGISTER | WRITE_MULTIPLE_REGISTERS => {
            let mut buf = vec![0u8; count * 2];
            ingress
                .reg_cb_holding(&mut buf, request.reg_start, request.reg_count, RegisterMode::Write)
                .map_err(callback_error)?;
            let words = buf.chunks_exact(2).map(|w| u16::from_be_bytes([w[0], w[1]])).collect();
            Ok(WriteData::Registers(words))
        },
        WRITE_SINGLE_COIL | WRITE_MULTIPLE_COILS => {
            let mut buf = vec![0u8; count.div_ceil(8)];
            ingress
                .reg_cb_coils(&mut buf, request.reg_start, request.reg_count, RegisterMode::Write)
                .map_err(callback_error)?;
            Ok(WriteData::Coils((0..count).map(|i| get_bit(&buf, i)).collect()))
        },
        _ => Err(TransportError::Exception(ILLEGAL_FUNCTION)),
    }
}

/// Push a response payload into the ingress
fn deliver(request: &ParameterRequest, ingress: &RegisterIngress, response: Response) -> Result<(), TransportError> {
    let start = request.reg_start;
    let count = request.reg_count;
    let result = match response {
        Response::Holding(mut data) => ingress.reg_cb_holding(&mut data, start, count, RegisterMode::Read),
        Response::Input(data) => ingress.reg_cb_input(&data, start, count),
        Response::Coils(mut data) => ingress.reg_cb_coils(&mut data, start, count, RegisterMode::Read),
        Response::Discrete(data) => ingress.reg_cb_discrete(&data, start, count),
        Response::SlaveId(data) => {
            let len = u16::try_from(data.len()).map_err(|_| TransportError::invalid_frame("slave id too long"))?;
            ingress.reg_cb_common(&data, 0, len)
        },
    };
    result.map_err(callback_error)
}

/// Offer one register just past the window; the ingress records the refusal
fn refuse(request: &ParameterRequest, ingress: &RegisterIngress) {
    let past = request.reg_start.wrapping_add(request.reg_count);
    let mut buf = [0u8; 2];
    let status = match request.window_kind() {
        Ok(WindowKind::Holding) => ingress.reg_cb_holding(&mut buf, past, 1, request.mode()),
        Ok(WindowKind::Input) => ingress.reg_cb_input(&buf, past, 1),
        Ok(WindowKind::Coils) => ingress.reg_cb_coils(&mut buf, past, 1, request.mode()),
        Ok(WindowKind::Discrete) => ingress.reg_cb_discrete(&buf, past, 1),
        Ok(WindowKind::Common) | Err(_) => ingress.reg_cb_common(&buf, 1, 1),
    };
    debug!("Simulated window refusal: {:?}", status);
}

/// Simulator settings, usually part of the master config document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_mode")]
    pub mode: PortMode,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub slaves: Vec<SimulatedSlave>,
}

fn default_mode() -> PortMode {
    PortMode::Tcp
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            latency_ms: 0,
            slaves: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    comm: Option<CommInfo>,
    faults: VecDeque<Fault>,
    frames: VecDeque<RequestFrame>,
}

/// Received frames kept for inspection; older ones are dropped
pub const FRAME_HISTORY_DEPTH: usize = 256;

/// In-memory slave population
#[derive(Debug)]
pub struct SimulatedTransport {
    mode: PortMode,
    latency: Duration,
    slaves: Mutex<BTreeMap<u8, SimulatedSlave>>,
    state: Mutex<SimState>,
}

impl SimulatedTransport {
    pub fn new(mode: PortMode) -> Self {
        Self {
            mode,
            latency: Duration::ZERO,
            slaves: Mutex::new(BTreeMap::new()),
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        let sim = Self::new(config.mode).with_latency(Duration::from_millis(config.latency_ms));
        for slave in &config.slaves {
            sim.add_slave(slave.clone());
        }
        sim
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_slave(self, slave: SimulatedSlave) -> Self {
        self.add_slave(slave);
        self
    }

    /// Add or replace a slave
    pub fn add_slave(&self, slave: SimulatedSlave) {
        self.slaves.lock().insert(slave.address, slave);
    }

    pub fn remove_slave(&self, address: u8) -> Option<SimulatedSlave> {
        self.slaves.lock().remove(&address)
    }

    /// Snapshot of one slave's banks
    pub fn slave(&self, address: u8) -> Option<SimulatedSlave> {
        self.slaves.lock().get(&address).cloned()
    }

    pub fn holding_register(&self, slave: u8, address: u16) -> Option<u16> {
        self.slaves
            .lock()
            .get(&slave)
            .map(|s| s.holding.get(&address).copied().unwrap_or(0))
    }

    pub fn coil(&self, slave: u8, address: u16) -> Option<bool> {
        self.slaves
            .lock()
            .get(&slave)
            .map(|s| s.coils.get(&address).copied().unwrap_or(false))
    }

    /// Queue a fault for the next transaction
    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    /// The last `FRAME_HISTORY_DEPTH` frames received, oldest first
    pub fn sent_frames(&self) -> Vec<RequestFrame> {
        self.state.lock().frames.iter().copied().collect()
    }

    pub fn clear_history(&self) {
        self.state.lock().frames.clear();
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().comm.is_some()
    }

    fn execute(&self, request: &ParameterRequest, ingress: &RegisterIngress) -> Result<(), TransportError> {
        match request.mode() {
            RegisterMode::Write => {
                let data = pull_write(request, ingress)?;
                let mut slaves = self.slaves.lock();
                if request.slave_addr == 0 {
                    for slave in slaves.values_mut() {
                        if let Err(err) = slave.store(request, &data) {
                            debug!("Broadcast ignored by slave {}: {}", slave.address, err);
                        }
                    }
                    return Ok(());
                }
                let slave = slaves.get_mut(&request.slave_addr).ok_or(TransportError::Timeout)?;
                slave.store(request, &data)
            },
            RegisterMode::Read => {
                let response = {
                    let slaves = self.slaves.lock();
                    let slave = slaves.get(&request.slave_addr).ok_or(TransportError::Timeout)?;
                    slave.respond(request)?
                };
                deliver(request, ingress, response)
            },
        }
    }
}

#[async_trait]
impl MasterTransport for SimulatedTransport {
    fn mode(&self) -> PortMode {
        self.mode
    }

    async fn open(&self, comm: &CommInfo) -> Result<(), TransportError> {
        if comm.mode != self.mode {
            return Err(TransportError::NotSupported);
        }
        self.state.lock().comm = Some(comm.clone());
        debug!("Simulated {} transport opened", self.mode);
        Ok(())
    }

    async fn transact(&self, frame: &RequestFrame, ingress: &RegisterIngress) -> Result<(), TransportError> {
        let fault = {
            let mut state = self.state.lock();
            if state.comm.is_none() {
                return Err(TransportError::io("port is not open"));
            }
            if state.frames.len() == FRAME_HISTORY_DEPTH {
                state.frames.pop_front();
            }
            state.frames.push_back(*frame);
            state.faults.pop_front()
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let request = &frame.request;
        debug!(
            "Simulated slave {} handling fc=0x{:02X} (transaction {})",
            request.slave_addr, request.function_code, frame.transaction_id
        );
        match fault {
            Some(Fault::Timeout) => Err(TransportError::Timeout),
            Some(Fault::Hang) => std::future::pending().await,
            Some(Fault::Exception(code)) => Err(TransportError::Exception(code)),
            Some(Fault::InvalidFrame) => Err(TransportError::invalid_frame("simulated CRC mismatch")),
            Some(Fault::Silent) => Ok(()),
            Some(Fault::RefuseWindow) => {
                refuse(request, ingress);
                Ok(())
            },
            None => self.execute(request, ingress),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.lock().comm = None;
        debug!("Simulated {} transport closed", self.mode);
        Ok(())
    }
}
