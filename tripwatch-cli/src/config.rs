//! CLI configuration handling.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tripwatch_core::{ClientConfig, StoreKind};

/// Environment variable overriding `client.base_url`.
pub const BASE_URL_ENV: &str = "TRIPWATCH_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Backend connection settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Where the session credentials are persisted.
    #[serde(default)]
    pub storage: StoreKind,

    /// Directory for file-backed credential storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".tripwatch"))
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            storage: StoreKind::default(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            config_path: PathBuf::new(),
        }
    }
}

/// Load configuration from `explicit`, or from the default location.
///
/// A missing default file yields defaults; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file {:?} does not exist", path);
            }
            path.to_path_buf()
        }
        None => default_config_path(),
    };

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        parse_config(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;

    if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
        if !base_url.trim().is_empty() {
            config.client.base_url = base_url;
        }
    }

    config
        .client
        .parsed_base_url()
        .context("Invalid client configuration")?;

    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<CliConfig> {
    Ok(toml::from_str(contents)?)
}

fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("tripwatch.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tripwatch", "tripwatch")
}
