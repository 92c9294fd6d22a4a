//! Register byte layouts
//!
//! Names the order in which the bytes of a scalar land at successive bytes of
//! one or more 16-bit Modbus registers, as they appear on the wire.

use std::fmt;

/// Byte layout of a scalar inside a register image
///
/// # Naming Convention
/// Uses ABCD notation where:
/// - A = Most significant byte (MSB)
/// - B = Second byte
/// - ... up to H for 64-bit values
///
/// For 32-bit value `0x11223344`:
/// - `Abcd`: [0x11, 0x22, 0x33, 0x44]
/// - `Cdab`: [0x33, 0x44, 0x11, 0x22] (low word first, common on PLCs)
/// - `Badc`: [0x22, 0x11, 0x44, 0x33]
/// - `Dcba`: [0x44, 0x33, 0x22, 0x11]
///
/// `A` and `B` place a single byte in the high or low half of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteLayout {
    /// Single byte in the high half of the register, low half zero
    A,
    /// Single byte in the low half of the register, high half zero
    B,
    Ab,
    Ba,
    Abcd,
    Cdab,
    Badc,
    Dcba,
    Abcdefgh,
    Hgfedcba,
    Ghefcdab,
    Badcfehg,
}

impl ByteLayout {
    pub const ALL: [ByteLayout; 12] = [
        Self::A,
        Self::B,
        Self::Ab,
        Self::Ba,
        Self::Abcd,
        Self::Cdab,
        Self::Badc,
        Self::Dcba,
        Self::Abcdefgh,
        Self::Hgfedcba,
        Self::Ghefcdab,
        Self::Badcfehg,
    ];

    /// Source byte index written to each output position
    ///
    /// Output byte `i` of the register image is byte `permutation()[i]` of the
    /// big-endian representation of the value. Every table is self-inverse.
    /// The single-byte layouts have no permutation; see [`Self::byte_slot`].
    pub const fn permutation(self) -> &'static [usize] {
        match self {
            Self::A | Self::B => &[0],
            Self::Ab => &[0, 1],
            Self::Ba => &[1, 0],
            Self::Abcd => &[0, 1, 2, 3],
            Self::Cdab => &[2, 3, 0, 1],
            Self::Badc => &[1, 0, 3, 2],
            Self::Dcba => &[3, 2, 1, 0],
            Self::Abcdefgh => &[0, 1, 2, 3, 4, 5, 6, 7],
            Self::Hgfedcba => &[7, 6, 5, 4, 3, 2, 1, 0],
            Self::Ghefcdab => &[6, 7, 4, 5, 2, 3, 0, 1],
            Self::Badcfehg => &[1, 0, 3, 2, 5, 4, 7, 6],
        }
    }

    /// Register byte that holds the value of a single-byte layout
    pub const fn byte_slot(self) -> Option<usize> {
        match self {
            Self::A => Some(0),
            Self::B => Some(1),
            _ => None,
        }
    }

    /// Width of the value in bytes (1 for the single-byte layouts)
    pub const fn value_width(self) -> usize {
        self.permutation().len()
    }

    /// Width of the register image in bytes
    pub const fn image_width(self) -> usize {
        match self {
            Self::A | Self::B => 2,
            _ => self.permutation().len(),
        }
    }

    /// Parse layout letters
    ///
    /// Accepts "CDAB", "cd-ab", "CD_AB" and similar spellings.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.to_uppercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "AB" => Some(Self::Ab),
            "BA" => Some(Self::Ba),
            "ABCD" => Some(Self::Abcd),
            "CDAB" => Some(Self::Cdab),
            "BADC" => Some(Self::Badc),
            "DCBA" => Some(Self::Dcba),
            "ABCDEFGH" => Some(Self::Abcdefgh),
            "HGFEDCBA" => Some(Self::Hgfedcba),
            "GHEFCDAB" => Some(Self::Ghefcdab),
            "BADCFEHG" => Some(Self::Badcfehg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::Ab => "AB",
            Self::Ba => "BA",
            Self::Abcd => "ABCD",
            Self::Cdab => "CDAB",
            Self::Badc => "BADC",
            Self::Dcba => "DCBA",
            Self::Abcdefgh => "ABCDEFGH",
            Self::Hgfedcba => "HGFEDCBA",
            Self::Ghefcdab => "GHEFCDAB",
            Self::Badcfehg => "BADCFEHG",
        }
    }
}

impl fmt::Display for ByteLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Place big-endian value bytes into a register image
#[inline]
pub(crate) fn permute<const N: usize>(value: &[u8; N], pi: &[usize]) -> [u8; N] {
    debug_assert_eq!(pi.len(), N);
    let mut out = [0u8; N];
    for (slot, &src) in out.iter_mut().zip(pi) {
        *slot = value[src];
    }
    out
}

/// Recover big-endian value bytes from a register image
#[inline]
pub(crate) fn unpermute<const N: usize>(image: &[u8; N], pi: &[usize]) -> [u8; N] {
    debug_assert_eq!(pi.len(), N);
    let mut out = [0u8; N];
    for (&byte, &src) in image.iter().zip(pi) {
        out[src] = byte;
    }
    out
}
