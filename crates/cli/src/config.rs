//! CLI configuration utilities

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use warden_core::WardenConfig;

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
        .join("warden.json")
}

/// Load configuration, preferring an explicit file, then the default
/// location if it exists, then defaults plus environment
pub fn load_config(path: Option<&Path>, database_url: Option<String>) -> Result<WardenConfig> {
    let default_path = default_config_path();
    let path = path.or_else(|| default_path.exists().then_some(default_path.as_path()));

    let mut config = WardenConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from environment".to_string(),
    })?;

    if let Some(database_url) = database_url {
        config.database_url = database_url;
    }

    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<Path>>(config: &WardenConfig, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    save_config(&WardenConfig::default(), path)
}
