use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub registry: RegistryConfig,
    pub capabilities: CapabilityConfig,
    #[serde(default)]
    pub recommended: Vec<RecommendedPlugin>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    pub product_name: String,
    pub product_version: String,
    pub product_slug: String,
    pub data_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CapabilityConfig {
    pub install_plugins: bool,
    pub activate_plugins: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendedPlugin {
    pub slug: String,
    pub name: String,
    pub description: String,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let defaults = include_str!("../../config/default.toml");
        let mut config: AppConfig = toml::from_str(defaults)?;

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "hearth") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                let user_str = fs::read_to_string(&config_path)?;
                let user_config: AppConfig = toml::from_str(&user_str)?;
                config = user_config;
            }
        }

        // Expand ~ in data_dir
        if config.general.data_dir.starts_with('~') {
            let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            config.general.data_dir =
                config
                    .general
                    .data_dir
                    .replacen('~', &home.to_string_lossy(), 1);
        }

        Ok(config)
    }

    /// Directory holding installed plugins, active flags and persisted UI state.
    /// `None` when no data directory can be resolved for this environment.
    pub fn data_dir(&self) -> Option<PathBuf> {
        if !self.general.data_dir.is_empty() {
            return Some(PathBuf::from(&self.general.data_dir));
        }

        directories::ProjectDirs::from("", "", "hearth").map(|d| d.data_dir().to_path_buf())
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
