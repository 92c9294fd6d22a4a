//! Parameter descriptors
//!
//! A descriptor binds a characteristic id and a name to a register window on
//! one slave and to the layout of the value stored there.

use std::borrow::Cow;
use std::fmt;
use std::ops::BitOr;

use errors::{MbcError, Result};
use mbc_codec::LayoutTag;
use serde::{Deserialize, Serialize};

/// Largest parameter the controller marshals in one transaction
pub const MAX_PARAM_SIZE: u16 = 256;

/// Modbus register bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    Holding,
    Input,
    Coil,
    Discrete,
}

impl RegisterType {
    /// Whether the bank addresses single bits
    pub fn is_bit(self) -> bool {
        matches!(self, Self::Coil | Self::Discrete)
    }

    /// Whether the master may write the bank
    pub fn is_writable(self) -> bool {
        matches!(self, Self::Holding | Self::Coil)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Holding => "holding",
            Self::Input => "input",
            Self::Coil => "coil",
            Self::Discrete => "discrete",
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// Access rights of a parameter
///
/// Serialised as `"READ|WRITE"`; the short forms `r`, `w`, `t` and
/// combinations like `rw` are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(0x01);
    pub const WRITE: Self = Self(0x02);
    pub const TRIGGER: Self = Self(0x04);
    pub const READ_WRITE: Self = Self(0x03);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::READ, "READ"),
            (Self::WRITE, "WRITE"),
            (Self::TRIGGER, "TRIGGER"),
        ]
        .into_iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, name)| name)
        .collect();

        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

impl TryFrom<String> for Permissions {
    type Error = MbcError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl std::str::FromStr for Permissions {
    type Err = MbcError;

    fn from_str(s: &str) -> Result<Self> {
        let mut perms = Self::NONE;
        for part in s.split(['|', ',', '+']).map(str::trim).filter(|p| !p.is_empty()) {
            perms = perms
                | match part.to_uppercase().as_str() {
                    "READ" => Self::READ,
                    "WRITE" => Self::WRITE,
                    "TRIGGER" => Self::TRIGGER,
                    "NONE" => Self::NONE,
                    short if short.chars().all(|c| matches!(c, 'R' | 'W' | 'T')) => {
                        short.chars().fold(Self::NONE, |acc, c| {
                            acc | match c {
                                'R' => Self::READ,
                                'W' => Self::WRITE,
                                _ => Self::TRIGGER,
                            }
                        })
                    },
                    _ => {
                        return Err(MbcError::invalid_arg(format!(
                            "unknown permission '{part}'"
                        )))
                    },
                };
        }
        Ok(perms)
    }
}

impl From<Permissions> for String {
    fn from(perms: Permissions) -> Self {
        perms.to_string()
    }
}

// ============================================================================
// Options
// ============================================================================

/// Three-integer option block of a descriptor
///
/// The `semantics` discriminator states whether the integers are opaque
/// options or a `{min, max, step}` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "semantics", rename_all = "snake_case")]
pub enum ParamOptions {
    Options {
        #[serde(default)]
        opt1: i32,
        #[serde(default)]
        opt2: i32,
        #[serde(default)]
        opt3: i32,
    },
    Limits {
        min: i32,
        max: i32,
        #[serde(default)]
        step: i32,
    },
}

impl Default for ParamOptions {
    fn default() -> Self {
        Self::Options {
            opt1: 0,
            opt2: 0,
            opt3: 0,
        }
    }
}

impl ParamOptions {
    /// Enforced range, present only for limits with `min < max`
    pub fn range(&self) -> Option<(f64, f64)> {
        match *self {
            Self::Limits { min, max, .. } if min < max => Some((f64::from(min), f64::from(max))),
            _ => None,
        }
    }

    /// Whether a value satisfies the enforced range
    pub fn accepts(&self, value: f64) -> bool {
        match self.range() {
            Some((min, max)) => value >= min && value <= max,
            None => true,
        }
    }
}

// ============================================================================
// ParameterDescriptor
// ============================================================================

/// One entry of the application's data dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub cid: u16,
    pub name: Cow<'static, str>,
    #[serde(default)]
    pub units: Cow<'static, str>,
    pub slave_addr: u8,
    pub reg_type: RegisterType,
    pub reg_start: u16,
    pub reg_count: u16,
    /// Offset of the value inside the application's value struct; opaque here
    #[serde(default)]
    pub param_offset: u16,
    pub type_tag: LayoutTag,
    pub byte_size: u16,
    #[serde(default)]
    pub opts: ParamOptions,
    #[serde(default = "default_perms")]
    pub perms: Permissions,
}

fn default_perms() -> Permissions {
    Permissions::READ
}

impl ParameterDescriptor {
    /// Readable holding-register parameter of minimal size for `type_tag`
    pub fn new(cid: u16, name: impl Into<Cow<'static, str>>, type_tag: LayoutTag) -> Self {
        let byte_size = type_tag.min_size() as u16;
        Self {
            cid,
            name: name.into(),
            units: Cow::Borrowed(""),
            slave_addr: 1,
            reg_type: RegisterType::Holding,
            reg_start: 0,
            reg_count: byte_size.div_ceil(2),
            param_offset: 0,
            type_tag,
            byte_size,
            opts: ParamOptions::default(),
            perms: Permissions::READ,
        }
    }

    pub fn with_slave(mut self, slave_addr: u8) -> Self {
        self.slave_addr = slave_addr;
        self
    }

    pub fn with_registers(mut self, reg_type: RegisterType, reg_start: u16, reg_count: u16) -> Self {
        self.reg_type = reg_type;
        self.reg_start = reg_start;
        self.reg_count = reg_count;
        self
    }

    pub fn with_byte_size(mut self, byte_size: u16) -> Self {
        self.byte_size = byte_size;
        self
    }

    pub fn with_units(mut self, units: impl Into<Cow<'static, str>>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_offset(mut self, param_offset: u16) -> Self {
        self.param_offset = param_offset;
        self
    }

    pub fn with_opts(mut self, opts: ParamOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_limits(self, min: i32, max: i32, step: i32) -> Self {
        self.with_opts(ParamOptions::Limits { min, max, step })
    }

    pub fn with_perms(mut self, perms: Permissions) -> Self {
        self.perms = perms;
        self
    }

    /// Bytes the register window can carry: two per register, one bit per
    /// coil or discrete input
    pub fn window_capacity(&self) -> usize {
        let count = usize::from(self.reg_count);
        if self.reg_type.is_bit() {
            count.div_ceil(8)
        } else {
            count * 2
        }
    }

    /// Check the size invariant of the descriptor
    ///
    /// `byte_size` must be at least the element size of `type_tag`, a
    /// multiple of it, and no larger than [`MAX_PARAM_SIZE`] or the register
    /// window. The register window must not be empty.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(MbcError::invalid_arg(format!("cid {} has an empty name", self.cid)));
        }
        if self.reg_count == 0 {
            return Err(MbcError::invalid_arg(format!(
                "'{}' (cid {}) has an empty register window",
                self.name, self.cid
            )));
        }
        if self.byte_size > MAX_PARAM_SIZE {
            return Err(MbcError::invalid_arg(format!(
                "'{}' (cid {}) byte_size {} exceeds {}",
                self.name, self.cid, self.byte_size, MAX_PARAM_SIZE
            )));
        }
        let size = usize::from(self.byte_size);
        if let Some(element) = self.type_tag.element_size() {
            if size < element || size % element != 0 {
                return Err(MbcError::invalid_arg(format!(
                    "'{}' (cid {}) byte_size {} is not a multiple of {} for {}",
                    self.name, self.cid, self.byte_size, element, self.type_tag
                )));
            }
        } else if size == 0 {
            return Err(MbcError::invalid_arg(format!(
                "'{}' (cid {}) has zero byte_size",
                self.name, self.cid
            )));
        }
        if size > self.window_capacity() {
            return Err(MbcError::invalid_arg(format!(
                "'{}' (cid {}) byte_size {} does not fit {} {} register(s) ({} bytes)",
                self.name,
                self.cid,
                self.byte_size,
                self.reg_count,
                self.reg_type,
                self.window_capacity()
            )));
        }
        Ok(())
    }
}
