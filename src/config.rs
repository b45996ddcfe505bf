use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vibin: VibinConfig,
    pub ui: UiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vibin: VibinConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

/// Vibin server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VibinConfig {
    /// Host used to seed the durable host record on first run
    pub default_host: String,
    /// Port for the Vibin command API, used when the host carries no port of its own
    pub default_port: u16,
}

impl Default for VibinConfig {
    fn default() -> Self {
        Self {
            default_host: "vibin.local".to_string(),
            default_port: 8080,
        }
    }
}

impl VibinConfig {
    /// Command API base URL for `host`. A host that already carries a
    /// `:port` override is used verbatim; otherwise the default port is
    /// appended.
    pub fn api_base(&self, host: &str) -> String {
        if has_port_override(host) {
            format!("http://{host}")
        } else {
            format!("http://{host}:{}", self.default_port)
        }
    }
}

fn has_port_override(host: &str) -> bool {
    match host.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// UI behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// How long the transport must stay in buffering before the UI reports
    /// it, in milliseconds
    pub buffering_debounce_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            buffering_debounce_ms: 2000,
        }
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("vibin-remote");

        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from file, or create default if not exists
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .context("Failed to read config file")?;

            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;

            Ok(config)
        } else {
            // Create default config and save it
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(&path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}
