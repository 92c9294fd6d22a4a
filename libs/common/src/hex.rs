//! Hex helpers for register images
//!
//! Register dumps are shown as uppercase hex, one 16-bit word per group.

use std::fmt::Write;

use crate::{Error, Result};

/// Encode bytes to uppercase hex string
/// Example: [0x12, 0x34, 0xAB] -> "1234AB"
pub fn encode_upper(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 2);
    for byte in data {
        // Writing to String buffer is infallible
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

/// Encode a register image as space separated 16-bit words
/// Example: [0x3F, 0x80, 0x00, 0x00] -> "3F80 0000"
///
/// A trailing odd byte is printed on its own.
pub fn encode_words(data: &[u8]) -> String {
    data.chunks(2).map(encode_upper).collect::<Vec<_>>().join(" ")
}

/// Decode hex text, ignoring whitespace and an optional `0x` prefix per group
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .split_whitespace()
        .map(|group| {
            group
                .strip_prefix("0x")
                .or_else(|| group.strip_prefix("0X"))
                .unwrap_or(group)
        })
        .collect();

    if !digits.is_ascii() {
        return Err(Error::Parse(format!("non-hex characters in '{}'", text)));
    }
    if digits.len() % 2 != 0 {
        return Err(Error::Parse(format!(
            "odd number of hex digits in '{}'",
            text
        )));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| Error::Parse(format!("invalid hex '{}': {}", &digits[i..i + 2], e)))
        })
        .collect()
}
