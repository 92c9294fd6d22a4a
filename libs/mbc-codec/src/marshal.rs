//! Parameter marshalling
//!
//! Moves a whole parameter between the caller's native buffer and the
//! register image, one element at a time, through the endian codec.
//!
//! Native elements are host-endian scalars. Tags that place a single byte in
//! a register use a 16-bit native word per element; encoding keeps its low
//! 8 bits and decoding sign-extends (`I8_*`) or zero-extends (`U8_*`).

use errors::{MbcError, Result};
use tracing::{error, trace};

use crate::codec;
use crate::layout::{ElementLayout, LayoutTag, Primitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// native -> register image
    Encode,
    /// register image -> native
    Decode,
}

/// Convert a native value buffer into its register image
///
/// Copies `byte_size` bytes worth of elements from `src` into `dst`. `ASCII`,
/// `BIN` and `U8` are copied verbatim; every other tag goes through the codec
/// element by element. Trailing bytes that do not fill a whole element are
/// left untouched.
///
/// # Errors
/// - `INVALID_STATE` when either buffer is empty
/// - `INVALID_ARG` when `byte_size` exceeds either buffer
/// - `NOT_SUPPORTED` when the tag is not available in this build
pub fn set_param_data(dst: &mut [u8], src: &[u8], tag: LayoutTag, byte_size: usize) -> Result<()> {
    transfer(dst, src, tag, byte_size, Direction::Encode)
}

/// Convert a register image back into native values
///
/// Exact inverse of [`set_param_data`] with the same error contract.
pub fn get_param_data(dst: &mut [u8], src: &[u8], tag: LayoutTag, byte_size: usize) -> Result<()> {
    transfer(dst, src, tag, byte_size, Direction::Decode)
}

fn transfer(
    dst: &mut [u8],
    src: &[u8],
    tag: LayoutTag,
    byte_size: usize,
    direction: Direction,
) -> Result<()> {
    if dst.is_empty() || src.is_empty() {
        error!("Incorrect data buffer for {}", tag);
        return Err(MbcError::invalid_state("incorrect data pointer"));
    }
    if !tag.is_enabled() {
        error!("Incorrect param type ({})", tag);
        return Err(MbcError::not_supported(format!(
            "layout tag {tag} requires the ext-types feature"
        )));
    }
    if byte_size > dst.len() || byte_size > src.len() {
        return Err(MbcError::invalid_arg(format!(
            "byte_size {} exceeds buffer (dst {}, src {})",
            byte_size,
            dst.len(),
            src.len()
        )));
    }

    match tag.element_layout() {
        ElementLayout::Raw | ElementLayout::Byte => {
            dst[..byte_size].copy_from_slice(&src[..byte_size]);
        },
        ElementLayout::Scalar(..) => {
            let size = tag.min_size();
            let elements = dst[..byte_size]
                .chunks_exact_mut(size)
                .zip(src[..byte_size].chunks_exact(size));
            for (i, (out, input)) in elements.enumerate() {
                match direction {
                    Direction::Encode => encode_element(tag, input, out)?,
                    Direction::Decode => decode_element(tag, input, out)?,
                }
                trace!("Convert {}[{}] {:02X?} = {:02X?}", tag, i, input, out);
            }
        },
    }
    Ok(())
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| MbcError::invalid_arg(format!("element of {} bytes, expected {}", bytes.len(), N)))
}

macro_rules! element_codecs {
    (
        bytes { $($btag:ident: $native:ty as $bty:ty => $bget:ident / $bset:ident;)* }
        scalars { $($tag:ident: $ty:ty => $get:ident / $set:ident;)* }
    ) => {
        fn encode_element(tag: LayoutTag, native: &[u8], image: &mut [u8]) -> Result<()> {
            match tag {
                $(LayoutTag::$btag => {
                    let value = <$native>::from_ne_bytes(to_array(native)?) as $bty;
                    image.copy_from_slice(&codec::$bset(&mut [0u8; 2], value));
                },)*
                $(LayoutTag::$tag => {
                    let value = <$ty>::from_ne_bytes(to_array(native)?);
                    image.copy_from_slice(&codec::$set(&mut [0u8; std::mem::size_of::<$ty>()], value));
                },)*
                other => return Err(MbcError::not_supported(format!("no element codec for {other}"))),
            }
            Ok(())
        }

        fn decode_element(tag: LayoutTag, image: &[u8], native: &mut [u8]) -> Result<()> {
            match tag {
                $(LayoutTag::$btag => {
                    let value = <$native>::from(codec::$bget(&to_array(image)?));
                    native.copy_from_slice(&value.to_ne_bytes());
                },)*
                $(LayoutTag::$tag => {
                    let value: $ty = codec::$get(&to_array(image)?);
                    native.copy_from_slice(&value.to_ne_bytes());
                },)*
                other => return Err(MbcError::not_supported(format!("no element codec for {other}"))),
            }
            Ok(())
        }
    };
}

element_codecs! {
    bytes {
        I8A: i16 as i8 => get_i8_a / set_i8_a;
        I8B: i16 as i8 => get_i8_b / set_i8_b;
        U8A: u16 as u8 => get_u8_a / set_u8_a;
        U8B: u16 as u8 => get_u8_b / set_u8_b;
    }
    scalars {
        U16: u16 => get_u16_ab / set_u16_ab;
        U32: u32 => get_u32_cdab / set_u32_cdab;
        Float: f32 => get_float_cdab / set_float_cdab;
        I16Ab: i16 => get_i16_ab / set_i16_ab;
        I16Ba: i16 => get_i16_ba / set_i16_ba;
        U16Ab: u16 => get_u16_ab / set_u16_ab;
        U16Ba: u16 => get_u16_ba / set_u16_ba;
        I32Abcd: i32 => get_i32_abcd / set_i32_abcd;
        I32Cdab: i32 => get_i32_cdab / set_i32_cdab;
        I32Badc: i32 => get_i32_badc / set_i32_badc;
        I32Dcba: i32 => get_i32_dcba / set_i32_dcba;
        U32Abcd: u32 => get_u32_abcd / set_u32_abcd;
        U32Cdab: u32 => get_u32_cdab / set_u32_cdab;
        U32Badc: u32 => get_u32_badc / set_u32_badc;
        U32Dcba: u32 => get_u32_dcba / set_u32_dcba;
        FloatAbcd: f32 => get_float_abcd / set_float_abcd;
        FloatCdab: f32 => get_float_cdab / set_float_cdab;
        FloatBadc: f32 => get_float_badc / set_float_badc;
        FloatDcba: f32 => get_float_dcba / set_float_dcba;
        I64Abcdefgh: i64 => get_i64_abcdefgh / set_i64_abcdefgh;
        I64Hgfedcba: i64 => get_i64_hgfedcba / set_i64_hgfedcba;
        I64Ghefcdab: i64 => get_i64_ghefcdab / set_i64_ghefcdab;
        I64Badcfehg: i64 => get_i64_badcfehg / set_i64_badcfehg;
        U64Abcdefgh: u64 => get_u64_abcdefgh / set_u64_abcdefgh;
        U64Hgfedcba: u64 => get_u64_hgfedcba / set_u64_hgfedcba;
        U64Ghefcdab: u64 => get_u64_ghefcdab / set_u64_ghefcdab;
        U64Badcfehg: u64 => get_u64_badcfehg / set_u64_badcfehg;
        DoubleAbcdefgh: f64 => get_double_abcdefgh / set_double_abcdefgh;
        DoubleHgfedcba: f64 => get_double_hgfedcba / set_double_hgfedcba;
        DoubleGhefcdab: f64 => get_double_ghefcdab / set_double_ghefcdab;
        DoubleBadcfehg: f64 => get_double_badcfehg / set_double_badcfehg;
    }
}

// ============================================================================
// Native element inspection
// ============================================================================

/// Numeric value of one native element, `None` for raw tags
pub fn native_value(tag: LayoutTag, element: &[u8]) -> Option<f64> {
    let value = match (tag.primitive(), element.len()) {
        (Primitive::U8, 1) => f64::from(element[0]),
        (Primitive::I8 | Primitive::I16, 2) => f64::from(i16::from_ne_bytes(element.try_into().ok()?)),
        (Primitive::U8 | Primitive::U16, 2) => f64::from(u16::from_ne_bytes(element.try_into().ok()?)),
        (Primitive::I32, 4) => f64::from(i32::from_ne_bytes(element.try_into().ok()?)),
        (Primitive::U32, 4) => f64::from(u32::from_ne_bytes(element.try_into().ok()?)),
        (Primitive::F32, 4) => f64::from(f32::from_ne_bytes(element.try_into().ok()?)),
        (Primitive::I64, 8) => i64::from_ne_bytes(element.try_into().ok()?) as f64,
        (Primitive::U64, 8) => u64::from_ne_bytes(element.try_into().ok()?) as f64,
        (Primitive::F64, 8) => f64::from_ne_bytes(element.try_into().ok()?),
        _ => return None,
    };
    Some(value)
}

/// Numeric values of every whole element in a native buffer
pub fn native_values(tag: LayoutTag, native: &[u8]) -> Vec<f64> {
    match tag.element_size() {
        Some(size) if tag.primitive() != Primitive::Raw => native
            .chunks_exact(size)
            .filter_map(|element| native_value(tag, element))
            .collect(),
        _ => Vec::new(),
    }
}
