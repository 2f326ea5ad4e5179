//! Application bootstrap
//!
//! [`Application`] loads the system configuration, builds the singleton
//! registry and brings up the optional resources in a fixed order:
//!
//! 1. System configuration (mandatory, loaded eagerly)
//! 2. Cache client
//! 3. Datasource connection
//! 4. Broker client
//!
//! An optional resource starts when a factory was given to the builder or,
//! without one, when its configuration section is present. Started
//! resources are created eagerly so that a broken deployment fails at boot
//! instead of on first use.
//!
//! ## Example
//!
//! ```ignore
//! let app = Application::configure()
//!     .with_system(ConfigLoader::new().with_config_dir("/etc/orders"))
//!     .with_cache(CacheFactory::default().with_expired_key_handler(|key: &str| {
//!         tracing::info!(key, "session expired");
//!     }))
//!     .run()?;
//!
//! app.cache_template()?.put("orders:last", &order, 60)?;
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use keystone_domain::error::Result;
use keystone_domain::ports::factory::ResourceFactory;
use keystone_infrastructure::config::{ConfigLoader, RegistryConfig, SystemConfigFactory};
use keystone_infrastructure::di::SingletonRegistry;
use keystone_infrastructure::logging::init_logging;
use keystone_providers::{
    BrokerClient, BrokerFactory, CacheClient, CacheFactory, DatasourceConnection,
    DatasourceFactory,
};
use tracing::{debug, info, warn};

use crate::context::AppContext;

/// Deferred factory registration for one resource kind
type Registration = Box<dyn FnOnce(&SingletonRegistry) + Send>;

fn registration<F: ResourceFactory>(factory: F) -> Registration {
    Box::new(move |registry: &SingletonRegistry| registry.register(factory))
}

/// Bootstrap builder
#[must_use]
pub struct Application {
    loader: ConfigLoader,
    registry_config: Option<RegistryConfig>,
    logging: bool,
    datasource: Option<Registration>,
    broker: Option<Registration>,
    cache: Option<Registration>,
}

impl Application {
    /// Builder with the default configuration loader and no custom factories
    pub fn configure() -> Self {
        Self {
            loader: ConfigLoader::new(),
            registry_config: None,
            logging: true,
            datasource: None,
            broker: None,
            cache: None,
        }
    }

    /// Load the system configuration through `loader`
    pub fn with_system(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Registry settings replacing the `registry` table of the configuration
    pub fn with_registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = Some(config);
        self
    }

    /// Whether `run` installs the global log subscriber (default: yes)
    ///
    /// A subscriber already installed in the process is kept.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Datasource factory; the datasource is started even without a
    /// `database` section
    pub fn with_datasource<F>(mut self, factory: F) -> Self
    where
        F: ResourceFactory<Resource = DatasourceConnection>,
    {
        self.datasource = Some(registration(factory));
        self
    }

    /// Datasource factory unless one was already set
    pub fn with_datasource_if_absent<F>(self, factory: F) -> Self
    where
        F: ResourceFactory<Resource = DatasourceConnection>,
    {
        if self.datasource.is_some() {
            return self;
        }
        self.with_datasource(factory)
    }

    /// Broker factory; the broker is started even without an `mqtt` section
    pub fn with_broker<F>(mut self, factory: F) -> Self
    where
        F: ResourceFactory<Resource = BrokerClient>,
    {
        self.broker = Some(registration(factory));
        self
    }

    /// Broker factory unless one was already set
    pub fn with_broker_if_absent<F>(self, factory: F) -> Self
    where
        F: ResourceFactory<Resource = BrokerClient>,
    {
        if self.broker.is_some() {
            return self;
        }
        self.with_broker(factory)
    }

    /// Cache factory; the cache is started even without a `redis` section
    pub fn with_cache<F>(mut self, factory: F) -> Self
    where
        F: ResourceFactory<Resource = CacheClient>,
    {
        self.cache = Some(registration(factory));
        self
    }

    /// Cache factory unless one was already set
    pub fn with_cache_if_absent<F>(self, factory: F) -> Self
    where
        F: ResourceFactory<Resource = CacheClient>,
    {
        if self.cache.is_some() {
            return self;
        }
        self.with_cache(factory)
    }

    /// Load the configuration and start every enabled resource
    ///
    /// Any failure is returned and leaves nothing running.
    pub fn run(self) -> Result<AppContext> {
        let loaded = self.loader.load()?;
        if self.logging {
            init_logging(&loaded.system.log)?;
        }

        let registry = Arc::new(SingletonRegistry::new(
            self.registry_config.unwrap_or(loaded.registry),
        ));
        let system = registry.create(loaded.system)?;
        registry.register(SystemConfigFactory::new(self.loader));
        info!(
            application = %system.application.name,
            source = %loaded.source.display(),
            "Bootstrapping application"
        );

        let started = start::<CacheClient>(&registry, self.cache, system.redis.is_some(), || {
            registration(CacheFactory::default())
        })
        .and_then(|cache| {
            let datasource = start::<DatasourceConnection>(
                &registry,
                self.datasource,
                system.database.is_some(),
                || registration(DatasourceFactory),
            )?;
            let broker = start::<BrokerClient>(
                &registry,
                self.broker,
                system.mqtt.is_some(),
                || registration(BrokerFactory),
            )?;
            Ok((cache, datasource, broker))
        });

        match started {
            Ok((cache, datasource, broker)) => {
                info!(cache, datasource, broker, "Application started");
                Ok(AppContext::new(
                    registry,
                    loaded.source,
                    datasource,
                    broker,
                    cache,
                ))
            }
            Err(e) => {
                warn!(error = %e, "Application failed to start");
                registry.shutdown();
                Err(e)
            }
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::configure()
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("loader", &self.loader)
            .field("registry_config", &self.registry_config)
            .field("logging", &self.logging)
            .field("datasource", &self.datasource.is_some())
            .field("broker", &self.broker.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

/// Register and eagerly create `T`; returns whether it was started
fn start<T>(
    registry: &SingletonRegistry,
    custom: Option<Registration>,
    configured: bool,
    default: impl FnOnce() -> Registration,
) -> Result<bool>
where
    T: Send + Sync + 'static,
{
    let register = match custom {
        Some(register) => register,
        None if configured => default(),
        None => {
            debug!(resource = type_name::<T>(), "Not configured, skipping");
            return Ok(false);
        }
    };
    register(registry);
    registry.get::<T>()?;
    Ok(true)
}
