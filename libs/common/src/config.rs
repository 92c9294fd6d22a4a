//! Layered configuration loading
//!
//! A document is read from YAML, TOML or JSON (chosen by extension) and then
//! overlaid with environment variables carrying the `MBC_` prefix. Nested keys
//! use a double underscore: `MBC_COMM__RESPONSE_TIMEOUT_MS=250`.

use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "MBC_";

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;
        match extension {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!(
                "Unsupported config file format: {}",
                other
            ))),
        }
    }
}

fn file_figment(path: &Path) -> Result<Figment> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    let figment = match ConfigFormat::from_path(path)? {
        ConfigFormat::Yaml => Figment::new().merge(Yaml::file(path)),
        ConfigFormat::Toml => Figment::new().merge(Toml::file(path)),
        ConfigFormat::Json => Figment::new().merge(Json::file(path)),
    };
    Ok(figment)
}

fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

/// Load a document from a file, then apply `MBC_` environment overrides
pub fn load_config_from_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    file_figment(path)?
        .merge(env_overrides())
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load {}: {}", path.display(), e)))
}

/// Load a document starting from `T::default()`
///
/// The file is optional here; a missing file leaves the defaults in place.
pub fn load_config_with_defaults<T, P>(path: Option<P>) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Default,
    P: AsRef<Path>,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));
    if let Some(path) = path {
        figment = figment.merge(file_figment(path.as_ref())?);
    }
    figment.merge(env_overrides()).extract().map_err(Error::from)
}

/// Save a document, format chosen by extension
pub fn save_config_to_file<T, P>(config: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = match ConfigFormat::from_path(path)? {
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => {
            return Err(Error::Config(
                "Saving TOML documents is not supported".to_string(),
            ))
        },
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
