//! Modbus master controller
//!
//! Resolves application parameters (CIDs) to register windows on remote
//! slaves, runs one transaction at a time over a bound transport and converts
//! register images to native values and back.
//!
//! ```text
//! MasterController ──> MasterInterface (ModbusMaster)
//!                          └─ TransactionEngine ──> MasterTransport
//!                               ├─ DescriptorRegistry      │
//!                               └─ RegisterIngress <───────┘ callbacks
//! ```

pub mod comm;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod engine;
pub mod iface;
pub mod ingress;
pub mod registry;
pub mod request;
pub mod sim;
pub mod transport;

pub use comm::{CommInfo, Parity, PortMode};
pub use config::MasterConfig;
pub use controller::{controller, MasterController};
pub use descriptor::{ParamOptions, ParameterDescriptor, Permissions, RegisterType, MAX_PARAM_SIZE};
pub use engine::{ErrorClass, TransactionEngine, TransactionInfo, TransactionState};
pub use iface::{MasterInterface, ModbusMaster};
pub use ingress::{MasterOptions, RegisterIngress, RegisterMode, WindowKind};
pub use registry::{Access, DescriptorRef, DescriptorRegistry};
pub use request::{function_code, ParameterRequest, RequestFrame};
pub use sim::{Fault, SimulatedSlave, SimulatedTransport, SimulatorConfig, FRAME_HISTORY_DEPTH};
pub use transport::{MasterTransport, TransportError};

pub use errors::{ErrorKind, MbcError, RegisterError, RegisterResult, Result};
pub use mbc_codec::{get_param_data, native_value, set_param_data, LayoutTag};
