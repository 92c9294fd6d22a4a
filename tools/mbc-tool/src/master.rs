//! Descriptor table and parameter commands
//!
//! Parameters are read and written through the process-wide controller bound
//! to a simulated slave population taken from the config's `simulator`
//! section.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;
use mbc_master::{controller, MasterConfig, MasterController, ModbusMaster, SimulatedTransport, TransactionInfo};
use tracing::info;

use crate::values;

pub fn load(config_path: &Path) -> Result<MasterConfig> {
    MasterConfig::load(config_path).with_context(|| format!("Failed to load {}", config_path.display()))
}

pub fn print_table(config: &MasterConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&config.descriptors)?);
        return Ok(());
    }

    println!(
        "{:>5}  {:<16} {:>5}  {:<9} {:>6} {:>5}  {:<16} {:>5}  {:<12} {}",
        "CID".bold(),
        "NAME".bold(),
        "SLAVE".bold(),
        "TYPE".bold(),
        "START".bold(),
        "COUNT".bold(),
        "TAG".bold(),
        "SIZE".bold(),
        "PERMS".bold(),
        "UNITS".bold()
    );
    for desc in &config.descriptors {
        println!(
            "{:>5}  {:<16} {:>5}  {:<9} {:>6} {:>5}  {:<16} {:>5}  {:<12} {}",
            desc.cid,
            desc.name.bright_yellow(),
            desc.slave_addr,
            desc.reg_type,
            desc.reg_start,
            desc.reg_count,
            desc.type_tag.to_string(),
            desc.byte_size,
            desc.perms.to_string(),
            desc.units
        );
    }
    println!(
        "\n{} {} descriptors, {} over {}",
        "*".bright_blue(),
        config.descriptors.len(),
        config.comm.mode,
        config.comm.port.as_deref().unwrap_or("tcp")
    );
    Ok(())
}

async fn bring_up(config: &MasterConfig) -> Result<&'static MasterController> {
    let ctl = controller();
    let sim = SimulatedTransport::from_config(&config.simulator);
    ctl.init_iface(Arc::new(ModbusMaster::new(sim)))?;
    ctl.setup(config.comm.clone()).await?;
    ctl.start().await?;
    ctl.set_descriptor(config.descriptor_table())?;
    info!("Master started with {} descriptors", config.descriptors.len());
    Ok(ctl)
}

/// Resolve the name used for a cid, defaulting to the table's own
fn resolve_name(ctl: &MasterController, cid: u16, name: Option<String>) -> Result<String> {
    match name {
        Some(name) => Ok(name),
        None => Ok(ctl.get_cid_info(cid)?.name.to_string()),
    }
}

fn print_info(info: &TransactionInfo, json: bool) {
    if !json {
        println!("  {} {}", "transaction".bright_cyan(), info);
    }
}

pub async fn get(config: &MasterConfig, cid: u16, name: Option<String>, json: bool) -> Result<()> {
    let ctl = bring_up(config).await?;
    let name = resolve_name(ctl, cid, name)?;
    let desc = ctl.get_cid_info(cid)?;

    let mut value = vec![0u8; usize::from(desc.byte_size)];
    let outcome = ctl.get_parameter(cid, &name, &mut value).await;
    let info = ctl.get_transaction_info()?;
    ctl.destroy().await?;
    let tag = outcome?;

    if json {
        let out = serde_json::json!({
            "cid": cid,
            "name": name,
            "type": tag,
            "value": values::native_json(tag, &value),
            "units": desc.units,
            "transaction": {
                "id": info.transaction_id,
                "slave": info.dest_addr,
                "function": info.function_code,
                "exception": info.exception_code,
                "error_class": info.error_class.code(),
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "{} = {} {}",
            name.bright_yellow(),
            values::format_native(tag, &value).green(),
            desc.units
        );
    }
    print_info(&info, json);
    Ok(())
}

pub async fn set(config: &MasterConfig, cid: u16, name: Option<String>, raw: &[String], json: bool) -> Result<()> {
    let ctl = bring_up(config).await?;
    let name = resolve_name(ctl, cid, name)?;
    let desc = ctl.get_cid_info(cid)?;

    let mut value = values::parse_native(desc.type_tag, raw)?;
    // ASCII text shorter than the parameter is NUL padded
    if value.len() < usize::from(desc.byte_size) && desc.type_tag == mbc_codec::LayoutTag::Ascii {
        value.resize(usize::from(desc.byte_size), 0);
    }

    let outcome = ctl.set_parameter(cid, &name, &value).await;
    let info = ctl.get_transaction_info()?;
    ctl.destroy().await?;
    outcome?;

    if json {
        let out = serde_json::json!({
            "cid": cid,
            "name": name,
            "written": values::native_json(desc.type_tag, &value),
            "transaction_id": info.transaction_id,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "{} {} <- {}",
            "OK".green(),
            name.bright_yellow(),
            values::format_native(desc.type_tag, &value)
        );
    }
    print_info(&info, json);
    Ok(())
}
