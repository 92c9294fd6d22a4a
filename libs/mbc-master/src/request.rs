//! Modbus requests issued by the master
//!
//! A [`ParameterRequest`] names one transaction: the slave, the function code
//! and the register window. The engine validates it against the protocol
//! limits before any frame is dispatched.

use errors::{MbcError, Result};
use serde::{Deserialize, Serialize};

use crate::descriptor::{ParameterDescriptor, RegisterType};
use crate::ingress::{RegisterMode, WindowKind};

/// Function codes understood by the controller
pub mod function_code {
    pub const READ_COILS: u8 = 0x01;
    pub const READ_DISCRETE_INPUTS: u8 = 0x02;
    pub const READ_HOLDING_REGISTERS: u8 = 0x03;
    pub const READ_INPUT_REGISTERS: u8 = 0x04;
    pub const WRITE_SINGLE_COIL: u8 = 0x05;
    pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
    pub const WRITE_MULTIPLE_COILS: u8 = 0x0F;
    pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
    pub const REPORT_SLAVE_ID: u8 = 0x11;
}

/// Maximum registers per read (0x03, 0x04)
pub const MAX_READ_REGISTERS: u16 = 125;
/// Maximum registers per write (0x10)
pub const MAX_WRITE_REGISTERS: u16 = 123;
/// Maximum bits per read (0x01, 0x02)
pub const MAX_READ_BITS: u16 = 2000;
/// Maximum bits per write (0x0F)
pub const MAX_WRITE_BITS: u16 = 1968;
/// Highest unicast slave address
pub const MAX_SLAVE_ADDR: u8 = 247;
/// Largest register image of any request
pub const MAX_IMAGE_SIZE: usize = 256;

/// One Modbus transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRequest {
    pub slave_addr: u8,
    pub function_code: u8,
    pub reg_start: u16,
    pub reg_count: u16,
}

impl ParameterRequest {
    pub fn new(slave_addr: u8, function_code: u8, reg_start: u16, reg_count: u16) -> Self {
        Self {
            slave_addr,
            function_code,
            reg_start,
            reg_count,
        }
    }

    /// Read request covering the descriptor's window
    pub fn read(desc: &ParameterDescriptor) -> Self {
        use function_code::*;
        let fc = match desc.reg_type {
            RegisterType::Holding => READ_HOLDING_REGISTERS,
            RegisterType::Input => READ_INPUT_REGISTERS,
            RegisterType::Coil => READ_COILS,
            RegisterType::Discrete => READ_DISCRETE_INPUTS,
        };
        Self::new(desc.slave_addr, fc, desc.reg_start, desc.reg_count)
    }

    /// Write request covering the descriptor's window
    ///
    /// Input registers and discrete inputs are read-only on every slave.
    pub fn write(desc: &ParameterDescriptor) -> Result<Self> {
        use function_code::*;
        let fc = match desc.reg_type {
            RegisterType::Holding => WRITE_MULTIPLE_REGISTERS,
            RegisterType::Coil => WRITE_MULTIPLE_COILS,
            other => {
                return Err(MbcError::not_supported(format!(
                    "'{}' lives in {} registers which cannot be written",
                    desc.name, other
                )))
            },
        };
        Ok(Self::new(desc.slave_addr, fc, desc.reg_start, desc.reg_count))
    }

    /// Register bank addressed by the function code
    pub fn window_kind(&self) -> Result<WindowKind> {
        use function_code::*;
        match self.function_code {
            READ_HOLDING_REGISTERS | WRITE_SINGLE_REGISTER | WRITE_MULTIPLE_REGISTERS => {
                Ok(WindowKind::Holding)
            },
            READ_INPUT_REGISTERS => Ok(WindowKind::Input),
            READ_COILS | WRITE_SINGLE_COIL | WRITE_MULTIPLE_COILS => Ok(WindowKind::Coils),
            READ_DISCRETE_INPUTS => Ok(WindowKind::Discrete),
            REPORT_SLAVE_ID => Ok(WindowKind::Common),
            fc => Err(MbcError::not_supported(format!("function code 0x{fc:02X}"))),
        }
    }

    /// Data direction seen from the master's buffer
    pub fn mode(&self) -> RegisterMode {
        use function_code::*;
        match self.function_code {
            WRITE_SINGLE_COIL | WRITE_SINGLE_REGISTER | WRITE_MULTIPLE_COILS
            | WRITE_MULTIPLE_REGISTERS => RegisterMode::Write,
            _ => RegisterMode::Read,
        }
    }

    /// Length in bytes of the register image exchanged with the caller
    pub fn image_len(&self) -> usize {
        match self.window_kind() {
            Ok(WindowKind::Coils | WindowKind::Discrete) => usize::from(self.reg_count).div_ceil(8),
            _ => usize::from(self.reg_count) * 2,
        }
    }

    /// Check the request against the protocol limits
    pub fn validate(&self) -> Result<()> {
        use function_code::*;
        let kind = self.window_kind()?;

        if self.slave_addr > MAX_SLAVE_ADDR {
            return Err(MbcError::invalid_arg(format!(
                "slave address {} out of range 0..={}",
                self.slave_addr, MAX_SLAVE_ADDR
            )));
        }
        if self.slave_addr == 0 && self.mode() == RegisterMode::Read {
            return Err(MbcError::invalid_arg("broadcast address cannot be read"));
        }
        if self.reg_count == 0 {
            return Err(MbcError::invalid_arg("register count is zero"));
        }

        let limit = match self.function_code {
            READ_HOLDING_REGISTERS | READ_INPUT_REGISTERS | REPORT_SLAVE_ID => MAX_READ_REGISTERS,
            WRITE_MULTIPLE_REGISTERS => MAX_WRITE_REGISTERS,
            READ_COILS | READ_DISCRETE_INPUTS => MAX_READ_BITS,
            WRITE_MULTIPLE_COILS => MAX_WRITE_BITS,
            _ => 1,
        };
        if self.reg_count > limit {
            return Err(MbcError::invalid_arg(format!(
                "function 0x{:02X} allows at most {} {}, got {}",
                self.function_code,
                limit,
                if kind.is_bit() { "bits" } else { "registers" },
                self.reg_count
            )));
        }
        if u32::from(self.reg_start) + u32::from(self.reg_count) > 0x1_0000 {
            return Err(MbcError::invalid_arg(format!(
                "window {}+{} crosses the end of the address space",
                self.reg_start, self.reg_count
            )));
        }
        Ok(())
    }
}

/// Request handed to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    pub transaction_id: u64,
    pub request: ParameterRequest,
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::function_code::*;
    use super::*;
    use errors::ErrorKind;
    use mbc_codec::LayoutTag;

    #[test]
    fn test_read_mapping() {
        let desc = ParameterDescriptor::new(7, "t", LayoutTag::FloatCdab)
            .with_registers(RegisterType::Holding, 100, 2);
        assert_eq!(ParameterRequest::read(&desc), ParameterRequest::new(1, 0x03, 100, 2));

        let coil = desc.clone().with_registers(RegisterType::Coil, 8, 10);
        assert_eq!(ParameterRequest::read(&coil).function_code, READ_COILS);
        let input = desc.clone().with_registers(RegisterType::Input, 0, 2);
        assert_eq!(ParameterRequest::read(&input).function_code, READ_INPUT_REGISTERS);
        let discrete = desc.with_registers(RegisterType::Discrete, 0, 2);
        assert_eq!(ParameterRequest::read(&discrete).function_code, READ_DISCRETE_INPUTS);
    }

    #[test]
    fn test_write_mapping() {
        let desc = ParameterDescriptor::new(1, "sp", LayoutTag::U16);
        assert_eq!(ParameterRequest::write(&desc).unwrap().function_code, WRITE_MULTIPLE_REGISTERS);
        let coil = desc.clone().with_registers(RegisterType::Coil, 0, 4);
        assert_eq!(ParameterRequest::write(&coil).unwrap().function_code, WRITE_MULTIPLE_COILS);
        let input = desc.with_registers(RegisterType::Input, 0, 1);
        assert_eq!(ParameterRequest::write(&input).unwrap_err().kind(), ErrorKind::NotSupported);
    }

    #[test]
    fn test_image_len() {
        assert_eq!(ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 3).image_len(), 6);
        assert_eq!(ParameterRequest::new(1, READ_COILS, 0, 9).image_len(), 2);
        assert_eq!(ParameterRequest::new(1, WRITE_SINGLE_COIL, 0, 1).image_len(), 1);
        assert_eq!(ParameterRequest::new(1, REPORT_SLAVE_ID, 0, 4).image_len(), 8);
    }

    #[test]
    fn test_limits() {
        assert!(ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 125).validate().is_ok());
        assert!(ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 126).validate().is_err());
        assert!(ParameterRequest::new(1, WRITE_MULTIPLE_REGISTERS, 0, 123).validate().is_ok());
        assert!(ParameterRequest::new(1, WRITE_MULTIPLE_REGISTERS, 0, 124).validate().is_err());
        assert!(ParameterRequest::new(1, READ_COILS, 0, 2000).validate().is_ok());
        assert!(ParameterRequest::new(1, READ_DISCRETE_INPUTS, 0, 2001).validate().is_err());
        assert!(ParameterRequest::new(1, WRITE_MULTIPLE_COILS, 0, 1969).validate().is_err());
        assert!(ParameterRequest::new(1, WRITE_SINGLE_REGISTER, 0, 2).validate().is_err());
        assert!(ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0xFFFF, 2).validate().is_err());
    }

    #[test]
    fn test_addresses_and_codes() {
        let zero = ParameterRequest::new(1, READ_HOLDING_REGISTERS, 0, 0);
        assert_eq!(zero.validate().unwrap_err().kind(), ErrorKind::InvalidArg);
        let far = ParameterRequest::new(248, READ_HOLDING_REGISTERS, 0, 1);
        assert_eq!(far.validate().unwrap_err().kind(), ErrorKind::InvalidArg);
        let broadcast_read = ParameterRequest::new(0, READ_HOLDING_REGISTERS, 0, 1);
        assert!(broadcast_read.validate().is_err());
        assert!(ParameterRequest::new(0, WRITE_SINGLE_REGISTER, 0, 1).validate().is_ok());
        let diag = ParameterRequest::new(1, 0x08, 0, 1);
        assert_eq!(diag.validate().unwrap_err().kind(), ErrorKind::NotSupported);
    }
}
