//! Layout tags
//!
//! The closed set of descriptor type tags. Each tag names the native element a
//! caller works with and the byte layout that element takes in the register
//! image. Numeric codes match the descriptor table format used on the wire by
//! existing controller configurations.

use std::fmt;
use std::str::FromStr;

use errors::MbcError;
use serde::{Deserialize, Serialize};

use crate::byte_order::ByteLayout;

/// Native scalar type of one element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    I64,
    U64,
    F64,
    /// Opaque bytes copied verbatim
    Raw,
}

/// How one element travels between native memory and the register image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementLayout {
    /// Verbatim copy of the whole parameter
    Raw,
    /// Verbatim copy of one byte per element
    Byte,
    /// Scalar of the given type stored with the given byte layout
    Scalar(Primitive, ByteLayout),
}

/// Descriptor type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum LayoutTag {
    // ======================================
    // Primitives
    // ======================================
    U8 = 0x00,
    U16 = 0x01,
    U32 = 0x02,
    /// Same register order as `FLOAT_CDAB`
    Float = 0x03,
    Ascii = 0x04,
    Bin = 0x07,

    // ======================================
    // Single byte in a register
    // ======================================
    I8A = 0x0A,
    I8B = 0x0B,
    U8A = 0x0C,
    U8B = 0x0D,

    // ======================================
    // 16-bit
    // ======================================
    I16Ab = 0x0E,
    I16Ba = 0x0F,
    U16Ab = 0x10,
    U16Ba = 0x11,

    // ======================================
    // 32-bit
    // ======================================
    I32Abcd = 0x12,
    I32Cdab = 0x13,
    I32Badc = 0x14,
    I32Dcba = 0x15,
    U32Abcd = 0x16,
    U32Cdab = 0x17,
    U32Badc = 0x18,
    U32Dcba = 0x19,
    FloatAbcd = 0x1A,
    /// Low word first: 1.0 is registers `[0x0000, 0x3F80]`, each register
    /// high byte first
    FloatCdab = 0x1B,
    FloatBadc = 0x1C,
    FloatDcba = 0x1D,

    // ======================================
    // 64-bit
    // ======================================
    I64Abcdefgh = 0x1E,
    I64Hgfedcba = 0x1F,
    I64Ghefcdab = 0x20,
    I64Badcfehg = 0x21,
    U64Abcdefgh = 0x22,
    U64Hgfedcba = 0x23,
    U64Ghefcdab = 0x24,
    U64Badcfehg = 0x25,
    DoubleAbcdefgh = 0x26,
    DoubleHgfedcba = 0x27,
    DoubleGhefcdab = 0x28,
    DoubleBadcfehg = 0x29,
}

impl LayoutTag {
    pub const ALL: [LayoutTag; 38] = [
        Self::U8,
        Self::U16,
        Self::U32,
        Self::Float,
        Self::Ascii,
        Self::Bin,
        Self::I8A,
        Self::I8B,
        Self::U8A,
        Self::U8B,
        Self::I16Ab,
        Self::I16Ba,
        Self::U16Ab,
        Self::U16Ba,
        Self::I32Abcd,
        Self::I32Cdab,
        Self::I32Badc,
        Self::I32Dcba,
        Self::U32Abcd,
        Self::U32Cdab,
        Self::U32Badc,
        Self::U32Dcba,
        Self::FloatAbcd,
        Self::FloatCdab,
        Self::FloatBadc,
        Self::FloatDcba,
        Self::I64Abcdefgh,
        Self::I64Hgfedcba,
        Self::I64Ghefcdab,
        Self::I64Badcfehg,
        Self::U64Abcdefgh,
        Self::U64Hgfedcba,
        Self::U64Ghefcdab,
        Self::U64Badcfehg,
        Self::DoubleAbcdefgh,
        Self::DoubleHgfedcba,
        Self::DoubleGhefcdab,
        Self::DoubleBadcfehg,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the tag belongs to the extended set
    pub fn is_extended(self) -> bool {
        !matches!(
            self,
            Self::U8 | Self::U16 | Self::U32 | Self::Float | Self::Ascii | Self::Bin
        )
    }

    /// Whether the tag is available in this build
    pub fn is_enabled(self) -> bool {
        cfg!(feature = "ext-types") || !self.is_extended()
    }

    /// Element layout of the tag
    ///
    /// The primitive numeric tags keep the layout of low-word-first
    /// controllers: `U16` is `AB`, `U32` and `FLOAT` are `CDAB`.
    pub fn element_layout(self) -> ElementLayout {
        use ByteLayout as L;
        use ElementLayout::{Byte, Raw, Scalar};
        use Primitive as P;

        match self {
            Self::U8 => Byte,
            Self::U16 => Scalar(P::U16, L::Ab),
            Self::U32 => Scalar(P::U32, L::Cdab),
            Self::Float => Scalar(P::F32, L::Cdab),
            Self::Ascii | Self::Bin => Raw,
            Self::I8A => Scalar(P::I8, L::A),
            Self::I8B => Scalar(P::I8, L::B),
            Self::U8A => Scalar(P::U8, L::A),
            Self::U8B => Scalar(P::U8, L::B),
            Self::I16Ab => Scalar(P::I16, L::Ab),
            Self::I16Ba => Scalar(P::I16, L::Ba),
            Self::U16Ab => Scalar(P::U16, L::Ab),
            Self::U16Ba => Scalar(P::U16, L::Ba),
            Self::I32Abcd => Scalar(P::I32, L::Abcd),
            Self::I32Cdab => Scalar(P::I32, L::Cdab),
            Self::I32Badc => Scalar(P::I32, L::Badc),
            Self::I32Dcba => Scalar(P::I32, L::Dcba),
            Self::U32Abcd => Scalar(P::U32, L::Abcd),
            Self::U32Cdab => Scalar(P::U32, L::Cdab),
            Self::U32Badc => Scalar(P::U32, L::Badc),
            Self::U32Dcba => Scalar(P::U32, L::Dcba),
            Self::FloatAbcd => Scalar(P::F32, L::Abcd),
            Self::FloatCdab => Scalar(P::F32, L::Cdab),
            Self::FloatBadc => Scalar(P::F32, L::Badc),
            Self::FloatDcba => Scalar(P::F32, L::Dcba),
            Self::I64Abcdefgh => Scalar(P::I64, L::Abcdefgh),
            Self::I64Hgfedcba => Scalar(P::I64, L::Hgfedcba),
            Self::I64Ghefcdab => Scalar(P::I64, L::Ghefcdab),
            Self::I64Badcfehg => Scalar(P::I64, L::Badcfehg),
            Self::U64Abcdefgh => Scalar(P::U64, L::Abcdefgh),
            Self::U64Hgfedcba => Scalar(P::U64, L::Hgfedcba),
            Self::U64Ghefcdab => Scalar(P::U64, L::Ghefcdab),
            Self::U64Badcfehg => Scalar(P::U64, L::Badcfehg),
            Self::DoubleAbcdefgh => Scalar(P::F64, L::Abcdefgh),
            Self::DoubleHgfedcba => Scalar(P::F64, L::Hgfedcba),
            Self::DoubleGhefcdab => Scalar(P::F64, L::Ghefcdab),
            Self::DoubleBadcfehg => Scalar(P::F64, L::Badcfehg),
        }
    }

    /// Element size E in bytes, `None` for the raw tags
    ///
    /// Single-byte-in-register tags consume a full register per element, so
    /// their native element is a 16-bit word as well.
    pub fn element_size(self) -> Option<usize> {
        match self.element_layout() {
            ElementLayout::Raw => None,
            ElementLayout::Byte => Some(1),
            ElementLayout::Scalar(_, layout) => Some(layout.image_width()),
        }
    }

    /// Smallest valid `byte_size` for a descriptor with this tag
    pub fn min_size(self) -> usize {
        self.element_size().unwrap_or(1)
    }

    /// Native scalar type of the tag
    pub fn primitive(self) -> Primitive {
        match self.element_layout() {
            ElementLayout::Raw => Primitive::Raw,
            ElementLayout::Byte => Primitive::U8,
            ElementLayout::Scalar(p, _) => p,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "U8",
            Self::U16 => "U16",
            Self::U32 => "U32",
            Self::Float => "FLOAT",
            Self::Ascii => "ASCII",
            Self::Bin => "BIN",
            Self::I8A => "I8_A",
            Self::I8B => "I8_B",
            Self::U8A => "U8_A",
            Self::U8B => "U8_B",
            Self::I16Ab => "I16_AB",
            Self::I16Ba => "I16_BA",
            Self::U16Ab => "U16_AB",
            Self::U16Ba => "U16_BA",
            Self::I32Abcd => "I32_ABCD",
            Self::I32Cdab => "I32_CDAB",
            Self::I32Badc => "I32_BADC",
            Self::I32Dcba => "I32_DCBA",
            Self::U32Abcd => "U32_ABCD",
            Self::U32Cdab => "U32_CDAB",
            Self::U32Badc => "U32_BADC",
            Self::U32Dcba => "U32_DCBA",
            Self::FloatAbcd => "FLOAT_ABCD",
            Self::FloatCdab => "FLOAT_CDAB",
            Self::FloatBadc => "FLOAT_BADC",
            Self::FloatDcba => "FLOAT_DCBA",
            Self::I64Abcdefgh => "I64_ABCDEFGH",
            Self::I64Hgfedcba => "I64_HGFEDCBA",
            Self::I64Ghefcdab => "I64_GHEFCDAB",
            Self::I64Badcfehg => "I64_BADCFEHG",
            Self::U64Abcdefgh => "U64_ABCDEFGH",
            Self::U64Hgfedcba => "U64_HGFEDCBA",
            Self::U64Ghefcdab => "U64_GHEFCDAB",
            Self::U64Badcfehg => "U64_BADCFEHG",
            Self::DoubleAbcdefgh => "DOUBLE_ABCDEFGH",
            Self::DoubleHgfedcba => "DOUBLE_HGFEDCBA",
            Self::DoubleGhefcdab => "DOUBLE_GHEFCDAB",
            Self::DoubleBadcfehg => "DOUBLE_BADCFEHG",
        }
    }
}

impl fmt::Display for LayoutTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutTag {
    type Err = MbcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| MbcError::not_supported(format!("unknown layout tag '{s}'")))
    }
}

impl TryFrom<u8> for LayoutTag {
    type Error = MbcError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.code() == code)
            .ok_or_else(|| MbcError::not_supported(format!("unknown layout tag code 0x{code:02X}")))
    }
}
