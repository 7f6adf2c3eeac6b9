//! Layered configuration loading for the engine.

use std::path::Path;

use anyhow::{Context, Result};
use engine::config::NBackConfig;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

pub const ENV_PREFIX: &str = "COGSCREEN_";
pub const DEFAULT_CONFIG_FILE: &str = "cogscreen.yaml";

/// Precedence, lowest to highest:
/// 1. `NBackConfig::default()`
/// 2. the YAML file at `path`, or `./cogscreen.yaml` when absent (optional)
/// 3. `COGSCREEN_*` environment variables
pub fn figment(path: Option<&Path>) -> Figment {
    let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    Figment::new()
        .merge(Serialized::defaults(NBackConfig::default()))
        .merge(Yaml::file(file))
        .merge(Env::prefixed(ENV_PREFIX))
}

/// Extract and validate. Invalid values are reported, never clamped.
pub fn extract(figment: &Figment) -> Result<NBackConfig> {
    let config: NBackConfig = figment
        .extract()
        .context("Failed to extract configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn load(path: Option<&Path>) -> Result<NBackConfig> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("Config file {} does not exist", path.display());
        }
    }
    extract(&figment(path))
        .with_context(|| format!("Failed to load config from {}", source_label(path)))
}

fn source_label(path: Option<&Path>) -> String {
    path.map_or_else(
        || format!("defaults, {DEFAULT_CONFIG_FILE} and {ENV_PREFIX}* variables"),
        |path| path.display().to_string(),
    )
}
