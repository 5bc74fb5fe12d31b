use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::config::PersistenceConfig;
use crate::error::{Error, Result};
use crate::persistence::http::HttpPersistence;
use crate::persistence::local::LocalPersistence;
use crate::persistence::s3::S3Persistence;
use crate::persistence::{DataPersistence, DriverFactory};
use crate::scheme::{Scheme, SchemeKey};

struct Plugin {
    factory: DriverFactory,
    instance: Mutex<Option<Arc<dyn DataPersistence>>>,
}

impl Plugin {
    fn driver(&self, scheme: &SchemeKey) -> Result<Arc<dyn DataPersistence>> {
        let mut slot = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(driver) = slot.as_ref() {
            return Ok(driver.clone());
        }
        let driver = (self.factory)()?;
        debug!(scheme = %scheme, driver = driver.name(), "Persistence driver constructed");
        *slot = Some(driver.clone());
        Ok(driver)
    }
}

/// Maps path schemes to persistence drivers.
///
/// Drivers are built on first resolution of their scheme and reused afterwards.
#[derive(Default)]
pub struct PersistenceRegistry {
    plugins: RwLock<HashMap<SchemeKey, Arc<Plugin>>>,
}

impl PersistenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `scheme` to `factory`. A forced registration replaces any existing
    /// plugin together with its cached driver.
    pub fn register<F>(&self, scheme: impl Into<SchemeKey>, factory: F, force: bool) -> Result<()>
    where
        F: Fn() -> Result<Arc<dyn DataPersistence>> + Send + Sync + 'static,
    {
        let scheme = scheme.into();
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        if !force && plugins.contains_key(&scheme) {
            return Err(Error::PluginAlreadyRegistered {
                scheme: scheme.to_string(),
            });
        }
        let plugin = Arc::new(Plugin {
            factory: Arc::new(factory),
            instance: Mutex::new(None),
        });
        let replaced = plugins.insert(scheme.clone(), plugin).is_some();
        info!(scheme = %scheme, force, replaced, "Persistence plugin registered");
        Ok(())
    }

    /// Registers an already-built driver.
    pub fn register_driver(
        &self,
        scheme: impl Into<SchemeKey>,
        driver: Arc<dyn DataPersistence>,
        force: bool,
    ) -> Result<()> {
        self.register(scheme, move || Ok(driver.clone()), force)
    }

    pub fn resolve(&self, path: &str) -> Result<Arc<dyn DataPersistence>> {
        let not_found = || Error::NoPluginFound {
            path: path.to_string(),
        };
        let scheme = Scheme::parse(path).key().ok_or_else(not_found)?;
        let plugin = {
            let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
            plugins.get(&scheme).cloned().ok_or_else(not_found)?
        };
        plugin.driver(&scheme)
    }

    pub fn is_registered(&self, scheme: impl Into<SchemeKey>) -> bool {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&scheme.into())
    }

    pub fn schemes(&self) -> Vec<SchemeKey> {
        let mut schemes: Vec<_> = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        schemes.sort();
        schemes
    }

    /// Force-registers the built-in drivers: local disk for `/` and `file://`,
    /// HTTP for `http://` and `https://`, and S3 when `config.s3` is set.
    pub fn register_defaults(&self, config: &PersistenceConfig) -> Result<()> {
        for scheme in [SchemeKey::local(), SchemeKey::protocol("file")] {
            self.register(
                scheme,
                || Ok(Arc::new(LocalPersistence::new()) as Arc<dyn DataPersistence>),
                true,
            )?;
        }

        for protocol in ["http", "https"] {
            let http = config.http.clone();
            self.register(
                SchemeKey::protocol(protocol),
                move || Ok(Arc::new(HttpPersistence::new(&http)?) as Arc<dyn DataPersistence>),
                true,
            )?;
        }

        if let Some(s3) = &config.s3 {
            let s3 = s3.clone();
            self.register(
                SchemeKey::protocol("s3"),
                move || Ok(Arc::new(S3Persistence::new(&s3)?) as Arc<dyn DataPersistence>),
                true,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn local() -> Result<Arc<dyn DataPersistence>> {
        Ok(Arc::new(LocalPersistence::new()))
    }

    #[test]
    fn duplicate_registration_requires_force() {
        let registry = PersistenceRegistry::new();
        registry.register("s3://", local, false).unwrap();

        let err = registry.register("s3://", local, false).unwrap_err();
        assert!(matches!(err, Error::PluginAlreadyRegistered { ref scheme } if scheme == "s3://"));

        let replacement: Arc<dyn DataPersistence> =
            Arc::new(LocalPersistence::with_default_prefix("/replaced"));
        registry
            .register_driver("s3://", replacement.clone(), true)
            .unwrap();
        let resolved = registry.resolve("s3://bucket/key").unwrap();
        assert!(Arc::ptr_eq(&resolved, &replacement));
    }

    #[test]
    fn resolves_every_registered_scheme() {
        let registry = PersistenceRegistry::new();
        registry
            .register_defaults(&PersistenceConfig::default())
            .unwrap();
        for scheme in ["gs", "abfs", "s3"] {
            registry.register(scheme, local, false).unwrap();
        }

        for scheme in registry.schemes() {
            let path = if scheme == SchemeKey::local() {
                "/anything".to_string()
            } else {
                format!("{scheme}anything")
            };
            assert!(registry.resolve(&path).is_ok(), "{path} did not resolve");
        }

        let err = registry.resolve("ftp://host/file").err().unwrap();
        assert!(matches!(err, Error::NoPluginFound { .. }));
        let err = registry.resolve("relative/path").err().unwrap();
        assert!(matches!(err, Error::NoPluginFound { .. }));
    }

    #[test]
    fn driver_is_constructed_once_per_scheme() {
        let registry = PersistenceRegistry::new();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        registry
            .register(
                "gs://",
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    local()
                },
                false,
            )
            .unwrap();

        let first = registry.resolve("gs://a/b").unwrap();
        let second = registry.resolve("gs://c").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn factory_errors_propagate_and_are_not_cached() {
        let registry = PersistenceRegistry::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        registry
            .register(
                "s3://",
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Config("no credentials".to_string()))
                },
                false,
            )
            .unwrap();

        assert!(matches!(registry.resolve("s3://b/k"), Err(Error::Config(_))));
        assert!(matches!(registry.resolve("s3://b/k"), Err(Error::Config(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn defaults_cover_local_and_http() {
        let registry = PersistenceRegistry::new();
        registry
            .register_defaults(&PersistenceConfig::default())
            .unwrap();
        assert!(registry.is_registered("/"));
        assert!(registry.is_registered("file"));
        assert!(registry.is_registered("https://"));
        assert!(!registry.is_registered("s3://"));
        assert_eq!(registry.resolve("/tmp/x").unwrap().name(), LocalPersistence::NAME);
        assert_eq!(
            registry.resolve("https://example.com/a").unwrap().name(),
            HttpPersistence::NAME
        );
    }
}
