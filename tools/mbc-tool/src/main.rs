//! mbc - Modbus master controller tool
//!
//! Encodes and decodes register images offline and reads or writes
//! parameters described by a master config against its simulated slaves.

mod codec;
mod master;
mod values;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use common::LogConfig;
use mbc_codec::LayoutTag;

#[derive(Parser)]
#[command(name = "mbc")]
#[command(about = "Modbus master controller tool")]
#[command(long_about = "Modbus master controller tool

Codec:
  encode      Native values to a register image
  decode      Register image to native values
  tags        List layout tags

Parameters:
  table       Show the descriptor table of a config
  get         Read a parameter
  set         Write a parameter

Examples:
  mbc encode --tag FLOAT_CDAB 1.0           # 0000 3F80
  mbc decode --tag U32_ABCD 1122 3344       # 287454020
  mbc get -c config/master.yaml --cid 7     # temperature = 1 C
  mbc set -c config/master.yaml --cid 8 --value 55")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, env = "MBC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode native values into a register image
    Encode {
        /// Layout tag, e.g. FLOAT_CDAB
        #[arg(short, long)]
        tag: LayoutTag,

        /// One value per element; text for ASCII, hex for BIN
        #[arg(required = true, allow_hyphen_values = true)]
        values: Vec<String>,
    },

    /// Decode a register image into native values
    Decode {
        #[arg(short, long)]
        tag: LayoutTag,

        /// Image as hex, e.g. "3F80 0000"
        #[arg(required = true)]
        hex: Vec<String>,
    },

    /// List layout tags
    Tags,

    /// Show the descriptor table
    Table {
        #[arg(short, long, default_value = "config/master.yaml")]
        config: PathBuf,
    },

    /// Read a parameter
    Get {
        #[arg(short, long, default_value = "config/master.yaml")]
        config: PathBuf,

        #[arg(long)]
        cid: u16,

        /// Parameter name (defaults to the descriptor's)
        #[arg(long)]
        name: Option<String>,
    },

    /// Write a parameter
    Set {
        #[arg(short, long, default_value = "config/master.yaml")]
        config: PathBuf,

        #[arg(long)]
        cid: u16,

        #[arg(long)]
        name: Option<String>,

        /// New value; repeat or list several for multi-element parameters
        #[arg(long = "value", required = true, num_args = 1.., allow_hyphen_values = true)]
        values: Vec<String>,
    },
}

fn log_config(cli: &Cli, base: LogConfig) -> LogConfig {
    let mut config = base;
    if let Some(level) = &cli.log_level {
        config = config.with_level(level.clone());
    }
    if cli.json_logs {
        config = config.with_json(true);
    }
    if cli.no_color {
        config.ansi = false;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Commands with a config take their logging section as the baseline
    let config = match &cli.command {
        Commands::Table { config } | Commands::Get { config, .. } | Commands::Set { config, .. } => {
            Some(master::load(config)?)
        },
        _ => None,
    };
    let base = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|| LogConfig::default().with_level("warn"));
    common::init_logging(&log_config(&cli, base))?;

    let result = match (&cli.command, config.as_ref()) {
        (Commands::Encode { tag, values }, _) => codec::encode(*tag, values, cli.json),
        (Commands::Decode { tag, hex }, _) => codec::decode(*tag, hex, cli.json),
        (Commands::Tags, _) => {
            codec::list_tags();
            Ok(())
        },
        (Commands::Table { .. }, Some(config)) => master::print_table(config, cli.json),
        (Commands::Get { cid, name, .. }, Some(config)) => {
            master::get(config, *cid, name.clone(), cli.json).await
        },
        (Commands::Set { cid, name, values, .. }, Some(config)) => {
            master::set(config, *cid, name.clone(), values, cli.json).await
        },
        _ => Ok(()),
    };

    if let Err(e) = &result {
        eprintln!("{} {:#}", "ERROR".red(), e);
        std::process::exit(1);
    }
    Ok(())
}
