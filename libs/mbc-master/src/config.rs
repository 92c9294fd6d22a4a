//! Master configuration document
//!
//! ```yaml
//! comm:
//!   mode: rtu
//!   port: /dev/ttyUSB0
//!   baudrate: 9600
//! descriptors:
//!   - cid: 7
//!     name: temperature
//!     slave_addr: 1
//!     reg_type: holding
//!     reg_start: 100
//!     reg_count: 2
//!     type_tag: FLOAT_CDAB
//!     byte_size: 4
//!     perms: READ|WRITE
//! ```

use std::path::Path;
use std::sync::Arc;

use common::LogConfig;
use errors::{MbcError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comm::CommInfo;
use crate::descriptor::ParameterDescriptor;
use crate::sim::SimulatorConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterConfig {
    pub comm: CommInfo,
    #[serde(default)]
    pub descriptors: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub logging: LogConfig,
    /// Slave population used when no physical transport is bound
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl MasterConfig {
    pub fn new(comm: CommInfo) -> Self {
        Self {
            comm,
            descriptors: Vec::new(),
            logging: LogConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }

    /// Load from YAML/TOML/JSON with `MBC_` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = common::load_config_from_file(path)
            .map_err(|e| MbcError::invalid_arg(e.to_string()))?;
        config.validate()?;
        debug!(
            "Loaded master config from {}: {} descriptors",
            path.display(),
            config.descriptors.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.comm.validate()?;
        for desc in &self.descriptors {
            desc.validate()?;
        }
        Ok(())
    }

    /// Shared descriptor table for `set_descriptor`
    pub fn descriptor_table(&self) -> Arc<[ParameterDescriptor]> {
        Arc::from(self.descriptors.as_slice())
    }
}
