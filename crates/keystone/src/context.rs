//! Running application handle

use std::path::{Path, PathBuf};
use std::sync::Arc;

use keystone_domain::error::{Error, Result};
use keystone_domain::value_objects::SystemConfig;
use keystone_infrastructure::di::SingletonRegistry;
use keystone_providers::{
    BrokerClient, BrokerTemplate, CacheClient, CacheTemplate, DatasourceConnection,
    DatasourceTemplate,
};
use tracing::{info, warn};

/// Liveness of one started resource, as reported by [`AppContext::check`]
#[derive(Debug)]
pub struct ResourceCheck {
    /// Resource kind (`datasource`, `broker` or `cache`)
    pub kind: &'static str,
    /// Where the resource points at, when it could be acquired
    pub target: Option<String>,
    /// `Ok` when a live instance was acquired
    pub outcome: Result<()>,
}

impl ResourceCheck {
    fn of<T>(kind: &'static str, acquired: Result<Arc<T>>, target: impl Fn(&T) -> String) -> Self {
        match acquired {
            Ok(instance) => Self {
                kind,
                target: Some(target(&instance)),
                outcome: Ok(()),
            },
            Err(e) => Self {
                kind,
                target: None,
                outcome: Err(e),
            },
        }
    }

    /// Whether the resource is usable
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Access to the configuration and the recovered resources of a running
/// application
///
/// Resources that were not started fail with [`Error::NotFound`].
#[derive(Debug)]
pub struct AppContext {
    registry: Arc<SingletonRegistry>,
    source: PathBuf,
    datasource: Option<DatasourceTemplate>,
    broker: Option<BrokerTemplate>,
    cache: Option<CacheTemplate>,
}

impl AppContext {
    pub(crate) fn new(
        registry: Arc<SingletonRegistry>,
        source: PathBuf,
        datasource: bool,
        broker: bool,
        cache: bool,
    ) -> Self {
        Self {
            datasource: datasource.then(|| DatasourceTemplate::new(Arc::clone(&registry))),
            broker: broker.then(|| BrokerTemplate::new(Arc::clone(&registry))),
            cache: cache.then(|| CacheTemplate::new(Arc::clone(&registry))),
            registry,
            source,
        }
    }

    /// The registry holding every resource
    pub fn registry(&self) -> &Arc<SingletonRegistry> {
        &self.registry
    }

    /// File the configuration was loaded from
    pub fn config_source(&self) -> &Path {
        &self.source
    }

    /// System configuration (reloaded if it was removed from the registry)
    pub fn config(&self) -> Result<Arc<SystemConfig>> {
        self.registry.get()
    }

    /// Live datasource connection
    pub fn datasource(&self) -> Result<Arc<DatasourceConnection>> {
        self.datasource_template()?.connection()
    }

    /// Live broker client
    pub fn broker(&self) -> Result<Arc<BrokerClient>> {
        self.broker_template()?.client()
    }

    /// Live cache client
    pub fn cache(&self) -> Result<Arc<CacheClient>> {
        self.cache_template()?.client()
    }

    /// Datasource operations
    pub fn datasource_template(&self) -> Result<&DatasourceTemplate> {
        self.datasource
            .as_ref()
            .ok_or_else(|| Error::not_found("datasource"))
    }

    /// Broker operations
    pub fn broker_template(&self) -> Result<&BrokerTemplate> {
        self.broker.as_ref().ok_or_else(|| Error::not_found("broker"))
    }

    /// Cache operations
    pub fn cache_template(&self) -> Result<&CacheTemplate> {
        self.cache.as_ref().ok_or_else(|| Error::not_found("cache"))
    }

    /// Close the datasource connection; the next access opens a new one
    pub fn release_datasource(&self) -> Result<()> {
        self.datasource_template()?.close()
    }

    /// Disconnect the broker client; the next access connects again
    pub fn release_broker(&self) -> Result<()> {
        self.broker_template()?.close()
    }

    /// Close the cache client; the next access connects again
    pub fn release_cache(&self) -> Result<()> {
        self.cache_template()?.close()
    }

    /// Acquire every started resource and report its liveness
    pub fn check(&self) -> Vec<ResourceCheck> {
        let mut checks = Vec::new();
        if self.cache.is_some() {
            checks.push(ResourceCheck::of("cache", self.cache(), |c| {
                c.target().to_string()
            }));
        }
        if self.datasource.is_some() {
            checks.push(ResourceCheck::of("datasource", self.datasource(), |c| {
                c.target().to_string()
            }));
        }
        if self.broker.is_some() {
            checks.push(ResourceCheck::of("broker", self.broker(), |c| {
                c.target().to_string()
            }));
        }
        checks
    }

    /// Close every started resource, then shut the registry down
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        if self.registry.is_shut_down() {
            return;
        }
        info!("Shutting down application");
        // Reverse start order
        release_quietly("broker", self.broker.as_ref().map(BrokerTemplate::close));
        release_quietly(
            "datasource",
            self.datasource.as_ref().map(DatasourceTemplate::close),
        );
        release_quietly("cache", self.cache.as_ref().map(CacheTemplate::close));
        self.registry.shutdown();
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn release_quietly(kind: &str, released: Option<Result<()>>) {
    match released {
        None | Some(Ok(()) | Err(Error::NotFound { .. })) => {}
        Some(Err(e)) => warn!(resource = kind, error = %e, "Failed to release resource"),
    }
}

