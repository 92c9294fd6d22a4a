//! Communication settings passed to `setup`

use std::fmt;
use std::time::Duration;

use errors::{MbcError, Result};
use serde::{Deserialize, Serialize};

/// Default response timeout in milliseconds
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 1000;

/// Standard serial baud rates accepted by `setup`
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115_200, 230_400, 460_800, 921_600,
];

/// Framing of the bound transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortMode {
    Rtu,
    Ascii,
    Tcp,
}

impl PortMode {
    pub fn is_serial(self) -> bool {
        matches!(self, Self::Rtu | Self::Ascii)
    }
}

impl fmt::Display for PortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rtu => "RTU",
            Self::Ascii => "ASCII",
            Self::Tcp => "TCP",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Communication info of a master port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommInfo {
    pub mode: PortMode,
    /// Serial device for RTU/ASCII
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    #[serde(default)]
    pub parity: Parity,
    /// `host:port` of each slave for TCP
    #[serde(default)]
    pub slave_addrs: Vec<String>,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_baudrate() -> u32 {
    115_200
}

fn default_response_timeout_ms() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT_MS
}

impl CommInfo {
    pub fn serial(mode: PortMode, port: impl Into<String>, baudrate: u32) -> Self {
        Self {
            mode,
            port: Some(port.into()),
            baudrate,
            parity: Parity::None,
            slave_addrs: Vec::new(),
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
        }
    }

    pub fn tcp<I, S>(slave_addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: PortMode::Tcp,
            port: None,
            baudrate: default_baudrate(),
            parity: Parity::None,
            slave_addrs: slave_addrs.into_iter().map(Into::into).collect(),
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.response_timeout_ms == 0 {
            return Err(MbcError::invalid_arg("response timeout must be non-zero"));
        }
        match self.mode {
            PortMode::Rtu | PortMode::Ascii => {
                if self.port.as_deref().map_or(true, |p| p.trim().is_empty()) {
                    return Err(MbcError::invalid_arg(format!(
                        "{} port requires a serial device",
                        self.mode
                    )));
                }
                if !SUPPORTED_BAUD_RATES.contains(&self.baudrate) {
                    return Err(MbcError::invalid_arg(format!(
                        "unsupported baud rate {}",
                        self.baudrate
                    )));
                }
            },
            PortMode::Tcp => {
                if self.slave_addrs.is_empty() {
                    return Err(MbcError::invalid_arg("TCP port requires at least one slave address"));
                }
                if let Some(bad) = self.slave_addrs.iter().find(|a| a.trim().is_empty()) {
                    return Err(MbcError::invalid_arg(format!("invalid slave address '{bad}'")));
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_validation() {
        assert!(CommInfo::serial(PortMode::Rtu, "/dev/ttyUSB0", 9600).validate().is_ok());
        assert!(CommInfo::serial(PortMode::Ascii, "", 9600).validate().is_err());
        assert!(CommInfo::serial(PortMode::Rtu, "/dev/ttyS1", 12345).validate().is_err());
    }

    #[test]
    fn test_tcp_validation() {
        assert!(CommInfo::tcp(["10.0.0.5:502"]).validate().is_ok());
        assert!(CommInfo::tcp(Vec::<String>::new()).validate().is_err());
        let zero = CommInfo::tcp(["10.0.0.5:502"]).with_response_timeout(Duration::ZERO);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_yaml_defaults() {
        let comm: CommInfo = serde_yaml::from_str("mode: rtu\nport: /dev/ttyUSB0\n").unwrap();
        assert_eq!(comm.baudrate, 115_200);
        assert_eq!(comm.parity, Parity::None);
        assert_eq!(comm.response_timeout(), Duration::from_millis(1000));
    }
}
