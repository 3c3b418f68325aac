use thiserror::Error;

use crate::ops::local::LocalStore;
use crate::ops::registry::{PluginRegistry, RegistryError};

/// What the caller is allowed to do. Checked before anything else.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub install_plugins: bool,
    pub activate_plugins: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpAction {
    Install,
    Activate,
}

/// One privileged request, one per button press.
#[derive(Debug, Clone)]
pub struct OpRequest {
    pub action: OpAction,
    pub slug: String,
    pub nonce: String,
}

/// Structured outcome returned for every request. Always echoes the slug
/// so the caller can correlate it to the originating card.
#[derive(Debug, Clone)]
pub struct OpOutcome {
    pub action: OpAction,
    pub slug: String,
    pub success: bool,
    pub plugin: Option<String>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum OpError {
    #[error("sorry, you are not allowed to {0} plugins")]
    Unauthorized(&'static str),
    #[error("invalid plugin slug")]
    InvalidSlug,
    #[error("nonce verification failed")]
    BadNonce,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Registry metadata resolved but the local install record is missing
    /// or mismatched. Distinct from a plain registry failure.
    #[error("{0} is installed but its main file is missing")]
    MissingEntry(String),
    #[error("plugin store failure: {0}")]
    Store(String),
}

/// Privileged operation handlers. Each handler validates capability, slug
/// and nonce in that order and bails on the first failure with no partial
/// work; side effects complete before the outcome is returned. No per-slug
/// locking: two simultaneous requests for one slug may race.
pub struct OpsService<R: PluginRegistry> {
    registry: R,
    store: LocalStore,
    caps: Capabilities,
    nonce: String,
}

impl<R: PluginRegistry> OpsService<R> {
    pub fn new(registry: R, store: LocalStore, caps: Capabilities, nonce: &str) -> Self {
        Self {
            registry,
            store,
            caps,
            nonce: nonce.to_string(),
        }
    }

    /// Handle one request, converting the error taxonomy into the
    /// structured outcome payload. Never panics and never retries.
    pub fn handle(&self, request: &OpRequest) -> OpOutcome {
        let result = match request.action {
            OpAction::Install => self.install(&request.slug, &request.nonce),
            OpAction::Activate => self.activate(&request.slug, &request.nonce),
        };

        match result {
            Ok(name) => {
                let verb = match request.action {
                    OpAction::Install => "installed",
                    OpAction::Activate => "activated",
                };
                OpOutcome {
                    action: request.action,
                    slug: request.slug.clone(),
                    success: true,
                    plugin: Some(name.clone()),
                    message: format!("{name} successfully {verb}."),
                }
            }
            Err(err) => OpOutcome {
                action: request.action,
                slug: request.slug.clone(),
                success: false,
                plugin: None,
                message: err.to_string(),
            },
        }
    }

    fn validate(&self, allowed: bool, verb: &'static str, slug: &str, nonce: &str) -> Result<(), OpError> {
        if !allowed {
            return Err(OpError::Unauthorized(verb));
        }
        if slug.is_empty() {
            return Err(OpError::InvalidSlug);
        }
        if nonce != self.nonce {
            return Err(OpError::BadNonce);
        }
        Ok(())
    }

    /// Resolve metadata from the registry, download the payload and write
    /// it to the plugin directory. Returns the resolved plugin name.
    fn install(&self, slug: &str, nonce: &str) -> Result<String, OpError> {
        self.validate(self.caps.install_plugins, "install", slug, nonce)?;

        let info = self.registry.plugin_info(slug)?;
        let payload = self.registry.download(&info)?;
        self.store
            .install(slug, &info, &payload)
            .map_err(|err| OpError::Store(err.to_string()))?;

        tracing::info!("installed plugin {slug} ({} {})", info.name, info.version);
        Ok(info.name)
    }

    /// Confirm the slug exists in the registry, resolve the locally
    /// installed main file and flip the active flag. A resolvable slug
    /// with no local main file is a detectable inconsistency and fails
    /// distinctly rather than silently succeeding.
    fn activate(&self, slug: &str, nonce: &str) -> Result<String, OpError> {
        self.validate(self.caps.activate_plugins, "activate", slug, nonce)?;

        let info = self.registry.plugin_info(slug)?;

        if self.store.entry_file(slug).is_none() {
            return Err(OpError::MissingEntry(info.name));
        }

        self.store
            .activate(slug)
            .map_err(|err| OpError::Store(err.to_string()))?;

        tracing::info!("activated plugin {slug} ({})", info.name);
        Ok(info.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::registry::PluginInfo;
    use std::collections::HashMap;

    struct StubRegistry {
        plugins: HashMap<String, PluginInfo>,
    }

    impl StubRegistry {
        fn with_akismet() -> Self {
            let mut plugins = HashMap::new();
            plugins.insert(
                "akismet".to_string(),
                PluginInfo {
                    name: "Akismet".to_string(),
                    version: "5.3".to_string(),
                    entry: "akismet.wasm".to_string(),
                    download_url: "stub://akismet".to_string(),
                },
            );
            Self { plugins }
        }
    }

    impl PluginRegistry for StubRegistry {
        fn plugin_info(&self, slug: &str) -> Result<PluginInfo, RegistryError> {
            self.plugins
                .get(slug)
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(slug.to_string()))
        }

        fn download(&self, _info: &PluginInfo) -> Result<Vec<u8>, RegistryError> {
            Ok(b"payload".to_vec())
        }
    }

    const ALL: Capabilities = Capabilities {
        install_plugins: true,
        activate_plugins: true,
    };

    fn service(tmp: &tempfile::TempDir, caps: Capabilities) -> OpsService<StubRegistry> {
        let store = LocalStore::open(tmp.path().to_path_buf()).unwrap();
        OpsService::new(StubRegistry::with_akismet(), store, caps, "session-nonce")
    }

    fn request(action: OpAction, slug: &str, nonce: &str) -> OpRequest {
        OpRequest {
            action,
            slug: slug.to_string(),
            nonce: nonce.to_string(),
        }
    }

    #[test]
    fn install_succeeds_and_reports_plugin_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = service(&tmp, ALL);

        let outcome = svc.handle(&request(OpAction::Install, "akismet", "session-nonce"));

        assert!(outcome.success);
        assert_eq!(outcome.slug, "akismet");
        assert_eq!(outcome.plugin.as_deref(), Some("Akismet"));
        assert_eq!(outcome.message, "Akismet successfully installed.");
        assert!(tmp.path().join("plugins/akismet/plugin.toml").exists());
    }

    #[test]
    fn install_then_activate() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = service(&tmp, ALL);

        svc.handle(&request(OpAction::Install, "akismet", "session-nonce"));
        let outcome = svc.handle(&request(OpAction::Activate, "akismet", "session-nonce"));

        assert!(outcome.success);
        assert_eq!(outcome.message, "Akismet successfully activated.");
    }

    #[test]
    fn unauthorized_fails_before_any_other_check() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = service(
            &tmp,
            Capabilities {
                install_plugins: false,
                activate_plugins: true,
            },
        );

        // Bad slug and bad nonce as well; the capability failure wins.
        let outcome = svc.handle(&request(OpAction::Install, "", "wrong"));
        assert!(!outcome.success);
        assert!(outcome.message.contains("not allowed to install"));
    }

    #[test]
    fn empty_slug_is_rejected_before_nonce() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = service(&tmp, ALL);

        let outcome = svc.handle(&request(OpAction::Install, "", "wrong"));
        assert!(!outcome.success);
        assert_eq!(outcome.message, "invalid plugin slug");
    }

    #[test]
    fn stale_nonce_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = service(&tmp, ALL);

        let outcome = svc.handle(&request(OpAction::Install, "akismet", "stale"));
        assert!(!outcome.success);
        assert_eq!(outcome.message, "nonce verification failed");
        // No partial work: nothing was installed.
        assert!(!tmp.path().join("plugins/akismet").exists());
    }

    #[test]
    fn unknown_slug_surfaces_registry_detail() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = service(&tmp, ALL);

        let outcome = svc.handle(&request(OpAction::Install, "no-such", "session-nonce"));
        assert!(!outcome.success);
        assert_eq!(outcome.slug, "no-such");
        assert!(outcome.message.contains("not found in registry"));
    }

    #[test]
    fn activate_with_missing_main_file_is_a_distinct_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = service(&tmp, ALL);

        // Metadata resolves, but the plugin was never installed locally.
        let outcome = svc.handle(&request(OpAction::Activate, "akismet", "session-nonce"));

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Akismet is installed but its main file is missing");
        assert_ne!(outcome.message, "nonce verification failed");
        assert!(!outcome.message.contains("not allowed"));
    }

    #[test]
    fn every_outcome_echoes_the_slug() {
        let tmp = tempfile::TempDir::new().unwrap();
        let svc = service(&tmp, ALL);

        for nonce in ["session-nonce", "stale"] {
            let outcome = svc.handle(&request(OpAction::Activate, "akismet", nonce));
            assert_eq!(outcome.slug, "akismet");
        }
    }
}
