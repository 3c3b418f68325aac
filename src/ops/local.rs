use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::ops::registry::PluginInfo;

/// Manifest written next to every installed plugin payload.
#[derive(Debug, Serialize, Deserialize)]
struct InstalledManifest {
    name: String,
    version: String,
    entry: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ActiveList {
    #[serde(default)]
    active: Vec<String>,
}

/// On-disk record of installed plugins and their active flags.
/// Layout: `<data>/plugins/<slug>/plugin.toml` plus the payload file, and
/// `<data>/active.toml` listing active slugs. Read fresh on every query;
/// no lock is held between a read and a later write.
pub struct LocalStore {
    plugins_dir: PathBuf,
    active_path: PathBuf,
}

impl LocalStore {
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        let plugins_dir = data_dir.join("plugins");
        fs::create_dir_all(&plugins_dir)?;

        Ok(Self {
            plugins_dir,
            active_path: data_dir.join("active.toml"),
        })
    }

    fn manifest_path(&self, slug: &str) -> PathBuf {
        self.plugins_dir.join(slug).join("plugin.toml")
    }

    fn read_manifest(&self, slug: &str) -> Option<InstalledManifest> {
        let raw = fs::read_to_string(self.manifest_path(slug)).ok()?;
        toml::from_str(&raw).ok()
    }

    fn read_active(&self) -> ActiveList {
        fs::read_to_string(&self.active_path)
            .ok()
            .and_then(|raw| toml::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn is_installed(&self, slug: &str) -> bool {
        self.manifest_path(slug).exists()
    }

    pub fn is_active(&self, slug: &str) -> bool {
        self.read_active().active.iter().any(|s| s == slug)
    }

    /// Resolve the installed main file for a slug. `None` when the plugin
    /// is not installed or its recorded entry file is missing on disk.
    pub fn entry_file(&self, slug: &str) -> Option<PathBuf> {
        let manifest = self.read_manifest(slug)?;
        let path = self.plugins_dir.join(slug).join(manifest.entry);
        if path.is_file() { Some(path) } else { None }
    }

    /// Write the payload and manifest for a freshly downloaded plugin.
    pub fn install(&self, slug: &str, info: &PluginInfo, payload: &[u8]) -> Result<()> {
        let dir = self.plugins_dir.join(slug);
        fs::create_dir_all(&dir)?;

        fs::write(dir.join(&info.entry), payload)?;

        let manifest = InstalledManifest {
            name: info.name.clone(),
            version: info.version.clone(),
            entry: info.entry.clone(),
        };
        fs::write(dir.join("plugin.toml"), toml::to_string(&manifest)?)?;

        Ok(())
    }

    /// Add the slug to the active list. Idempotent.
    pub fn activate(&self, slug: &str) -> Result<()> {
        let mut list = self.read_active();
        if !list.active.iter().any(|s| s == slug) {
            list.active.push(slug.to_string());
        }
        fs::write(&self.active_path, toml::to_string(&list)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> PluginInfo {
        PluginInfo {
            name: "Akismet".to_string(),
            version: "5.3".to_string(),
            entry: "akismet.wasm".to_string(),
            download_url: "https://registry.hearth.dev/dl/akismet.wasm".to_string(),
        }
    }

    #[test]
    fn install_then_query() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().to_path_buf()).unwrap();

        assert!(!store.is_installed("akismet"));
        assert_eq!(store.entry_file("akismet"), None);

        store.install("akismet", &sample_info(), b"payload").unwrap();

        assert!(store.is_installed("akismet"));
        assert!(!store.is_active("akismet"));
        let entry = store.entry_file("akismet").unwrap();
        assert!(entry.ends_with("akismet/akismet.wasm"));
    }

    #[test]
    fn activate_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().to_path_buf()).unwrap();

        store.install("akismet", &sample_info(), b"payload").unwrap();
        store.activate("akismet").unwrap();
        store.activate("akismet").unwrap();

        assert!(store.is_active("akismet"));
        assert_eq!(store.read_active().active, vec!["akismet".to_string()]);
    }

    #[test]
    fn entry_file_is_none_when_payload_is_gone() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().to_path_buf()).unwrap();

        store.install("akismet", &sample_info(), b"payload").unwrap();
        fs::remove_file(tmp.path().join("plugins/akismet/akismet.wasm")).unwrap();

        // Still counted as installed, but the main file cannot be resolved.
        assert!(store.is_installed("akismet"));
        assert_eq!(store.entry_file("akismet"), None);
    }
}
