use std::fs;
use std::path::PathBuf;

/// Persisted per-instance UI state: the active tab selection and the
/// welcome-notice dismissal flag, one small file each under the state
/// directory. When no directory is available (or writes fail) the store
/// degrades to memory-only for the session; it never errors.
pub struct StateStore {
    dir: Option<PathBuf>,
    prefix: String,
}

impl StateStore {
    pub fn open(dir: Option<PathBuf>, instance_prefix: &str) -> Self {
        let dir = dir.and_then(|d| {
            let state_dir = d.join("state");
            match fs::create_dir_all(&state_dir) {
                Ok(()) => Some(state_dir),
                Err(err) => {
                    tracing::warn!("state dir unavailable, running memory-only: {err}");
                    None
                }
            }
        });

        Self {
            dir,
            prefix: instance_prefix.to_string(),
        }
    }

    /// Open a store with no backing directory. Used when the environment
    /// provides no writable location.
    pub fn disabled(instance_prefix: &str) -> Self {
        Self {
            dir: None,
            prefix: instance_prefix.to_string(),
        }
    }

    fn key_path(&self, key: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-{key}", self.prefix)))
    }

    /// Last explicitly selected tab id, if any was persisted.
    pub fn active_tab(&self) -> Option<String> {
        let path = self.key_path("activetab")?;
        let value = fs::read_to_string(path).ok()?;
        let value = value.trim().to_string();
        if value.is_empty() { None } else { Some(value) }
    }

    /// Persist the active tab id, overwriting any previous value.
    /// Write failures are logged and otherwise ignored.
    pub fn set_active_tab(&self, tab_id: &str) {
        let Some(path) = self.key_path("activetab") else {
            return;
        };

        if let Err(err) = fs::write(&path, tab_id) {
            tracing::warn!("failed to persist active tab: {err}");
        }
    }

    pub fn notice_dismissed(&self) -> bool {
        self.key_path("notice-dismissed")
            .is_some_and(|path| path.exists())
    }

    pub fn dismiss_notice(&self) {
        let Some(path) = self.key_path("notice-dismissed") else {
            return;
        };

        if let Err(err) = fs::write(&path, "1") {
            tracing::warn!("failed to persist notice dismissal: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_tab_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = StateStore::open(Some(tmp.path().to_path_buf()), "demo");

        assert_eq!(store.active_tab(), None);
        store.set_active_tab("advanced");
        assert_eq!(store.active_tab(), Some("advanced".to_string()));

        // Overwrites the previous value.
        store.set_active_tab("general");
        assert_eq!(store.active_tab(), Some("general".to_string()));
    }

    #[test]
    fn instances_do_not_collide() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = StateStore::open(Some(tmp.path().to_path_buf()), "product-a");
        let b = StateStore::open(Some(tmp.path().to_path_buf()), "product-b");

        a.set_active_tab("advanced");
        assert_eq!(b.active_tab(), None);
    }

    #[test]
    fn disabled_store_degrades_silently() {
        let store = StateStore::disabled("demo");
        store.set_active_tab("advanced");
        assert_eq!(store.active_tab(), None);
        store.dismiss_notice();
        assert!(!store.notice_dismissed());
    }

    #[test]
    fn notice_dismissal_persists() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = StateStore::open(Some(tmp.path().to_path_buf()), "demo");

        assert!(!store.notice_dismissed());
        store.dismiss_notice();
        assert!(store.notice_dismissed());

        let reopened = StateStore::open(Some(tmp.path().to_path_buf()), "demo");
        assert!(reopened.notice_dismissed());
    }
}
