//! Shared foundation of the Modbus master crates
//!
//! - logging bootstrap (`logging`)
//! - layered configuration loading (`config`)
//! - hex helpers for register dumps (`hex`)

pub mod config;
pub mod error;
pub mod hex;
pub mod logging;

pub use config::{load_config_from_file, load_config_with_defaults, save_config_to_file};
pub use error::{Error, Result};
pub use logging::{init_logging, LogConfig};
