mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./ull-relay.toml",
        "~/.config/ull-relay/config.toml",
        "/etc/ull-relay/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.pump.poll_interval_ms == 0 {
        anyhow::bail!("Pump poll interval cannot be 0");
    }

    if config.pump.max_idle() < config.pump.poll_interval() {
        anyhow::bail!(
            "Pump max idle ({}s) is shorter than the poll interval ({}ms)",
            config.pump.max_idle_secs,
            config.pump.poll_interval_ms
        );
    }

    if config.transcoder.program.trim().is_empty() {
        anyhow::bail!("Transcoder program cannot be empty");
    }

    if config.cache.eviction_secs == 0 {
        tracing::warn!("Cache eviction delay is 0; temp-cached entries expire immediately");
    }

    Ok(())
}
