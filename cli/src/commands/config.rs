use anyhow::{Context, Result};
use engine::config::NBackConfig;

pub fn execute(config: &NBackConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{yaml}");
    Ok(())
}
