use serde::Deserialize;
use thiserror::Error;

/// Plugin metadata as published by the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    /// File name of the plugin's main file inside its install directory.
    pub entry: String,
    pub download_url: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("plugin not found in registry: {0}")]
    NotFound(String),
    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Remote plugin registry. Production uses HTTP; tests stub this out.
pub trait PluginRegistry: Send {
    fn plugin_info(&self, slug: &str) -> Result<PluginInfo, RegistryError>;
    fn download(&self, info: &PluginInfo) -> Result<Vec<u8>, RegistryError>;
}

/// Registry client over HTTP. Metadata lives at
/// `<base>/plugins/<slug>.json`; payloads at the URL the metadata names.
/// No timeout is configured beyond the transport default, and no retries.
pub struct HttpRegistry {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRegistry {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl PluginRegistry for HttpRegistry {
    fn plugin_info(&self, slug: &str) -> Result<PluginInfo, RegistryError> {
        let url = format!("{}/plugins/{slug}.json", self.base_url);
        let response = self.client.get(&url).send()?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(slug.to_string()));
        }

        let info = response.error_for_status()?.json::<PluginInfo>()?;
        Ok(info)
    }

    fn download(&self, info: &PluginInfo) -> Result<Vec<u8>, RegistryError> {
        let response = self.client.get(&info.download_url).send()?;
        let bytes = response.error_for_status()?.bytes()?;
        Ok(bytes.to_vec())
    }
}
