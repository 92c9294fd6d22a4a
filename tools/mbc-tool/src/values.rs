//! Conversion between command line text and native value buffers

use anyhow::{anyhow, bail, Context, Result};
use mbc_codec::{native_values, ElementLayout, LayoutTag, Primitive};

fn parse_one<T: std::str::FromStr>(text: &str, tag: LayoutTag) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    text.parse::<T>()
        .map_err(|e| anyhow!("'{}' is not a valid {} value: {}", text, tag, e))
}

/// Build the native buffer for `values`
///
/// `ASCII` takes the text as-is, `BIN` takes hex. Numeric tags take one value
/// per element in host byte order.
pub fn parse_native(tag: LayoutTag, values: &[String]) -> Result<Vec<u8>> {
    if values.is_empty() {
        bail!("at least one value is required");
    }

    match tag {
        LayoutTag::Ascii => return Ok(values.join(" ").into_bytes()),
        LayoutTag::Bin => {
            return common::hex::decode(&values.join(" ")).context("BIN values are given as hex");
        },
        _ => {},
    }

    let mut native = Vec::new();
    for text in values {
        match (tag.element_layout(), tag.primitive()) {
            (ElementLayout::Byte, _) => native.push(parse_one::<u8>(text, tag)?),
            // one byte per register, carried in a 16-bit native word
            (_, Primitive::I8) => native.extend(i16::from(parse_one::<i8>(text, tag)?).to_ne_bytes()),
            (_, Primitive::U8) => native.extend(u16::from(parse_one::<u8>(text, tag)?).to_ne_bytes()),
            (_, Primitive::I16) => native.extend(parse_one::<i16>(text, tag)?.to_ne_bytes()),
            (_, Primitive::U16) => native.extend(parse_one::<u16>(text, tag)?.to_ne_bytes()),
            (_, Primitive::I32) => native.extend(parse_one::<i32>(text, tag)?.to_ne_bytes()),
            (_, Primitive::U32) => native.extend(parse_one::<u32>(text, tag)?.to_ne_bytes()),
            (_, Primitive::F32) => native.extend(parse_one::<f32>(text, tag)?.to_ne_bytes()),
            (_, Primitive::I64) => native.extend(parse_one::<i64>(text, tag)?.to_ne_bytes()),
            (_, Primitive::U64) => native.extend(parse_one::<u64>(text, tag)?.to_ne_bytes()),
            (_, Primitive::F64) => native.extend(parse_one::<f64>(text, tag)?.to_ne_bytes()),
            (_, Primitive::Raw) => bail!("{} takes no numeric values", tag),
        }
    }
    Ok(native)
}

/// Render a native buffer for display
pub fn format_native(tag: LayoutTag, native: &[u8]) -> String {
    match tag {
        LayoutTag::Ascii => String::from_utf8_lossy(native)
            .trim_end_matches('\0')
            .to_string(),
        LayoutTag::Bin => common::hex::encode_words(native),
        _ => native_values(tag, native)
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// JSON form of a native buffer
pub fn native_json(tag: LayoutTag, native: &[u8]) -> serde_json::Value {
    match tag {
        LayoutTag::Ascii | LayoutTag::Bin => serde_json::Value::String(format_native(tag, native)),
        _ => serde_json::json!(native_values(tag, native)),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_numeric_values() {
        let native = parse_native(LayoutTag::FloatCdab, &args(&["1.0", "-2.5"])).unwrap();
        assert_eq!(native.len(), 8);
        assert_eq!(format_native(LayoutTag::FloatCdab, &native), "1 -2.5");

        let native = parse_native(LayoutTag::I8B, &args(&["-2"])).unwrap();
        assert_eq!(native, (-2i16).to_ne_bytes());

        let native = parse_native(LayoutTag::U8, &args(&["1", "0", "255"])).unwrap();
        assert_eq!(native, [1, 0, 255]);
    }

    #[test]
    fn test_raw_values() {
        let native = parse_native(LayoutTag::Ascii, &args(&["MBC", "v1"])).unwrap();
        assert_eq!(native, b"MBC v1");
        assert_eq!(format_native(LayoutTag::Ascii, b"MBC\0\0"), "MBC");

        let native = parse_native(LayoutTag::Bin, &args(&["DEAD", "0xBEEF"])).unwrap();
        assert_eq!(native, [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(format_native(LayoutTag::Bin, &native), "DEAD BEEF");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_native(LayoutTag::U16Ab, &args(&["70000"])).is_err());
        assert!(parse_native(LayoutTag::I32Abcd, &args(&["abc"])).is_err());
        assert!(parse_native(LayoutTag::Float, &[]).is_err());
    }
}
