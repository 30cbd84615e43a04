//! Startup wiring: open the registry, seed it and build the collector

use crate::collector::FailureCollector;
use crate::config::{Config, ConfigLoader};
use crate::error::Result;
use ignore_registry::{transfer, Origin, RegistryError, RegistryStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a running proxy needs, built once at startup
pub struct IgnoreContext {
    pub store: Arc<RegistryStore>,
    pub collector: Arc<FailureCollector>,
}

impl IgnoreContext {
    /// Open the configured database and build the collector on top of it
    pub fn open(config: &Config) -> Result<Self> {
        let database = &config.registry.database;
        ConfigLoader::ensure_parent_dir(database)?;

        let store = RegistryStore::open(database)?;
        info!("Ignore registry database: {:?}", database);
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Build the collector around an already opened store
    pub fn with_store(config: &Config, store: Arc<RegistryStore>) -> Self {
        let compat_file = config.registry.compat_file.clone();

        if config.registry.import_on_start {
            if let Some(path) = &compat_file {
                match transfer::import_foreign_file(&store, path, &Origin::FileImport) {
                    Ok(Some(n)) => info!("Imported {} new domains from existing ignore file", n),
                    Ok(None) => debug!("Ignore file {:?} is a registry export, not importing", path),
                    Err(RegistryError::FileNotFound(_)) => {
                        info!("No existing ignore file at {:?}", path)
                    }
                    Err(e) => warn!("Could not import existing ignore file: {}", e),
                }
            }
        }

        let collector = FailureCollector::new(Arc::clone(&store), config.proxy.ignore_hosts.clone())
            .with_compat_file(compat_file);
        let cached = collector.rebuild();
        info!("TLS ignore collector loaded with {} ignored hosts", cached);

        Self {
            store,
            collector: Arc::new(collector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.registry.database = dir.path().join("data").join("ignore_hosts.db");
        config.registry.compat_file = Some(dir.path().join("ignore-host.txt"));
        config.proxy.ignore_hosts = vec!["corp.example".to_string()];
        config
    }

    #[test]
    fn test_open_creates_database_directory() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let ctx = IgnoreContext::open(&config).unwrap();
        assert!(config.registry.database.exists());
        assert_eq!(ctx.collector.effective().entries(), ["corp.example"]);
    }

    #[test]
    fn test_startup_imports_existing_ignore_file() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let compat = config.registry.compat_file.clone().unwrap();
        fs::write(&compat, "legacy.example.com\n# note\n").unwrap();

        let ctx = IgnoreContext::open(&config).unwrap();
        let record = ctx.store.get("legacy.example.com").unwrap();
        assert_eq!(record.origin, Origin::FileImport);
        assert_eq!(
            ctx.collector.effective().entries(),
            ["corp.example", "legacy.example.com"]
        );
        assert_eq!(
            fs::read_to_string(&compat).unwrap(),
            "legacy.example.com\nplugin-tls-loaded\n"
        );
    }

    #[test]
    fn test_restart_keeps_removed_domain_inactive() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let ctx = IgnoreContext::open(&config).unwrap();
        ctx.collector.record_transport_failure(&crate::collector::TransportFailure::new(
            Some("bad.example.com".into()),
            Some("TLS handshake error".into()),
        ));
        drop(ctx);

        let admin = RegistryStore::open(&config.registry.database).unwrap();
        assert!(admin.deactivate("bad.example.com"));
        drop(admin);

        for _ in 0..3 {
            let ctx = IgnoreContext::open(&config).unwrap();
            let record = ctx.store.get("bad.example.com").unwrap();
            assert!(!record.active);
            assert_eq!(record.count, 1);
            assert_eq!(ctx.collector.effective().entries(), ["corp.example"]);
        }
    }

    #[test]
    fn test_restart_does_not_recount_own_export() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let ctx = IgnoreContext::open(&config).unwrap();
        ctx.store.register("kept.example.com", &Origin::Manual);
        ctx.collector.rebuild();
        drop(ctx);

        let compat = config.registry.compat_file.clone().unwrap();
        assert_eq!(
            fs::read_to_string(&compat).unwrap(),
            "kept.example.com\nplugin-tls-loaded\n"
        );

        let ctx = IgnoreContext::open(&config).unwrap();
        assert_eq!(ctx.store.get("kept.example.com").unwrap().count, 1);
        assert_eq!(
            ctx.collector.effective().entries(),
            ["corp.example", "kept.example.com"]
        );
    }

    #[test]
    fn test_import_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.registry.import_on_start = false;
        fs::write(config.registry.compat_file.as_ref().unwrap(), "legacy.example.com\n").unwrap();

        let ctx = IgnoreContext::with_store(
            &config,
            Arc::new(RegistryStore::open_in_memory().unwrap()),
        );
        assert!(ctx.store.get("legacy.example.com").is_none());
    }
}
