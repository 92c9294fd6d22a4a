//! Offline encode/decode of register images

use anyhow::{bail, Result};
use colored::*;
use mbc_codec::{get_param_data, set_param_data, LayoutTag};

use crate::values;

pub fn encode(tag: LayoutTag, raw: &[String], json: bool) -> Result<()> {
    let native = values::parse_native(tag, raw)?;
    let mut image = vec![0u8; native.len()];
    set_param_data(&mut image, &native, tag, native.len())?;

    let words = common::hex::encode_words(&image);
    if json {
        let out = serde_json::json!({ "type": tag, "image": words, "registers": image.len().div_ceil(2) });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{} {} -> {}", tag.to_string().bright_cyan(), raw.join(" "), words.green());
    }
    Ok(())
}

pub fn decode(tag: LayoutTag, hex: &[String], json: bool) -> Result<()> {
    let image = common::hex::decode(&hex.join(" "))?;
    if image.len() < tag.min_size() {
        bail!("{} needs at least {} bytes, got {}", tag, tag.min_size(), image.len());
    }
    let mut native = vec![0u8; image.len()];
    get_param_data(&mut native, &image, tag, image.len())?;

    if json {
        let out = serde_json::json!({ "type": tag, "value": values::native_json(tag, &native) });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "{} {} -> {}",
            tag.to_string().bright_cyan(),
            common::hex::encode_words(&image),
            values::format_native(tag, &native).green()
        );
    }
    Ok(())
}

/// List every layout tag with its code and element size
pub fn list_tags() {
    println!("{:<18} {:>4}  {:>4}  {}", "TAG".bold(), "CODE".bold(), "SIZE".bold(), "BUILD".bold());
    for tag in LayoutTag::ALL {
        let size = tag
            .element_size()
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let build = if tag.is_enabled() { "yes".green() } else { "no".red() };
        println!("{:<18} 0x{:02X}  {:>4}  {}", tag.as_str(), tag.code(), size, build);
    }
}
