//! Endian codec
//!
//! Pure conversions between typed scalars and register images. For every
//! layout over a primitive of width N there is a getter reading the scalar
//! from an N-byte image and a setter writing it. The setter also returns the
//! written image so it can be used in expression position.
//!
//! ```
//! use mbc_codec::codec::{get_u32_cdab, set_u32_cdab};
//!
//! let mut regs = [0u8; 4];
//! assert_eq!(set_u32_cdab(&mut regs, 0x1122_3344), [0x33, 0x44, 0x11, 0x22]);
//! assert_eq!(get_u32_cdab(&regs), 0x1122_3344);
//! ```

use crate::byte_order::{permute, unpermute, ByteLayout};

macro_rules! permuted_codec {
    ($($get:ident / $set:ident: $ty:ty, $n:literal, $layout:ident;)*) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` stored in ", stringify!($layout), " order")]
            #[inline]
            pub fn $get(regs: &[u8; $n]) -> $ty {
                <$ty>::from_be_bytes(unpermute(regs, ByteLayout::$layout.permutation()))
            }

            #[doc = concat!("Write a `", stringify!($ty), "` in ", stringify!($layout), " order")]
            #[inline]
            pub fn $set(regs: &mut [u8; $n], value: $ty) -> [u8; $n] {
                *regs = permute(&value.to_be_bytes(), ByteLayout::$layout.permutation());
                *regs
            }
        )*
    };
}

macro_rules! single_byte_codec {
    ($($get:ident / $set:ident: $ty:ty, $slot:literal;)*) => {
        $(
            #[inline]
            pub fn $get(regs: &[u8; 2]) -> $ty {
                regs[$slot] as $ty
            }

            #[inline]
            pub fn $set(regs: &mut [u8; 2], value: $ty) -> [u8; 2] {
                *regs = [0; 2];
                regs[$slot] = value as u8;
                *regs
            }
        )*
    };
}

// ============================================================================
// Single byte in a register
// ============================================================================

single_byte_codec! {
    get_i8_a / set_i8_a: i8, 0;
    get_i8_b / set_i8_b: i8, 1;
    get_u8_a / set_u8_a: u8, 0;
    get_u8_b / set_u8_b: u8, 1;
}

// ============================================================================
// 16-bit
// ============================================================================

permuted_codec! {
    get_i16_ab / set_i16_ab: i16, 2, Ab;
    get_i16_ba / set_i16_ba: i16, 2, Ba;
    get_u16_ab / set_u16_ab: u16, 2, Ab;
    get_u16_ba / set_u16_ba: u16, 2, Ba;
}

// ============================================================================
// 32-bit
// ============================================================================

permuted_codec! {
    get_i32_abcd / set_i32_abcd: i32, 4, Abcd;
    get_i32_cdab / set_i32_cdab: i32, 4, Cdab;
    get_i32_badc / set_i32_badc: i32, 4, Badc;
    get_i32_dcba / set_i32_dcba: i32, 4, Dcba;
    get_u32_abcd / set_u32_abcd: u32, 4, Abcd;
    get_u32_cdab / set_u32_cdab: u32, 4, Cdab;
    get_u32_badc / set_u32_badc: u32, 4, Badc;
    get_u32_dcba / set_u32_dcba: u32, 4, Dcba;
    get_float_abcd / set_float_abcd: f32, 4, Abcd;
    get_float_cdab / set_float_cdab: f32, 4, Cdab;
    get_float_badc / set_float_badc: f32, 4, Badc;
    get_float_dcba / set_float_dcba: f32, 4, Dcba;
}

// ============================================================================
// 64-bit
// ============================================================================

permuted_codec! {
    get_i64_abcdefgh / set_i64_abcdefgh: i64, 8, Abcdefgh;
    get_i64_hgfedcba / set_i64_hgfedcba: i64, 8, Hgfedcba;
    get_i64_ghefcdab / set_i64_ghefcdab: i64, 8, Ghefcdab;
    get_i64_badcfehg / set_i64_badcfehg: i64, 8, Badcfehg;
    get_u64_abcdefgh / set_u64_abcdefgh: u64, 8, Abcdefgh;
    get_u64_hgfedcba / set_u64_hgfedcba: u64, 8, Hgfedcba;
    get_u64_ghefcdab / set_u64_ghefcdab: u64, 8, Ghefcdab;
    get_u64_badcfehg / set_u64_badcfehg: u64, 8, Badcfehg;
    get_double_abcdefgh / set_double_abcdefgh: f64, 8, Abcdefgh;
    get_double_hgfedcba / set_double_hgfedcba: f64, 8, Hgfedcba;
    get_double_ghefcdab / set_double_ghefcdab: f64, 8, Ghefcdab;
    get_double_badcfehg / set_double_badcfehg: f64, 8, Badcfehg;
}
