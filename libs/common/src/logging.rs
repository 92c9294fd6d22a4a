//! Logging bootstrap
//!
//! Console logging with the bracketed level format
//! (`2025-12-02T00:50:44.809000Z [INFO] message`) or JSON lines.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::{Error, Result};

/// Bracketed tag and ANSI colour of a level
fn level_style(level: Level) -> (&'static str, &'static str) {
    match level {
        Level::TRACE => ("[TRACE]", "\x1b[35m"),
        Level::DEBUG => ("[DEBUG]", "\x1b[34m"),
        Level::INFO => ("[INFO]", "\x1b[32m"),
        Level::WARN => ("[WARN]", "\x1b[33m"),
        Level::ERROR => ("[ERROR]", "\x1b[31m"),
    }
}

/// `timestamp [LEVEL] message`; debug and trace events also name their module
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let (tag, color) = level_style(*meta.level());
        write!(writer, "{} ", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;
        if writer.has_ansi_escapes() {
            write!(writer, "{color}{tag}\x1b[0m ")?;
        } else {
            write!(writer, "{tag} ")?;
        }
        if *meta.level() >= Level::DEBUG {
            write!(writer, "{}: ", meta.target())?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `info,mbc_master=debug`
    pub level: String,
    /// Emit JSON lines instead of the bracketed format
    pub json: bool,
    /// Colour the level tag
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Filter in effect: `RUST_LOG` wins over the configured level
    pub fn filter_directive(&self) -> String {
        match std::env::var("RUST_LOG") {
            Ok(env) if !env.trim().is_empty() => env,
            _ => self.level.clone(),
        }
    }
}

static INITIALIZED: OnceLock<String> = OnceLock::new();

fn build_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| Error::Logging(format!("Invalid log level '{}': {}", directive, e)))
}

/// Install the global subscriber
///
/// Only the first call installs anything; later calls are no-ops so tests and
/// binaries can both call it.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let directive = config.filter_directive();
    let filter = build_filter(&directive)?;

    let layer = if config.json {
        fmt::layer().json().with_current_span(false).boxed()
    } else {
        fmt::layer()
            .with_ansi(config.ansi)
            .event_format(BracketedLevelFormat)
            .boxed()
    };

    match tracing_subscriber::registry().with(filter).with(layer).try_init() {
        Ok(()) => {
            let _ = INITIALIZED.set(directive.clone());
            tracing::debug!("Logging initialised with filter '{}'", directive);
            Ok(())
        },
        // Another subscriber owns the process (e.g. a test harness)
        Err(_) => {
            let _ = INITIALIZED.set(directive);
            Ok(())
        },
    }
}

/// Filter installed by `init_logging`, if any
pub fn get_log_level() -> Option<String> {
    INITIALIZED.get().cloned()
}
