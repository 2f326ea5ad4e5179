//! System configuration as a registry resource

use keystone_domain::error::Result;
use keystone_domain::ports::factory::{ResourceFactory, Resolve};
use keystone_domain::value_objects::SystemConfig;

use crate::config::loader::ConfigLoader;

/// Factory loading [`SystemConfig`] through a [`ConfigLoader`]
///
/// Bootstrap loads the configuration eagerly; the factory only runs again when
/// the cached configuration was removed from the registry.
#[derive(Debug, Clone, Default)]
pub struct SystemConfigFactory {
    loader: ConfigLoader,
}

impl SystemConfigFactory {
    /// Factory using `loader`
    pub fn new(loader: ConfigLoader) -> Self {
        Self { loader }
    }
}

impl ResourceFactory for SystemConfigFactory {
    type Resource = SystemConfig;

    fn name(&self) -> &'static str {
        "system-config"
    }

    fn produce(&self, _resolver: &dyn Resolve) -> Result<SystemConfig> {
        self.loader.load().map(|loaded| loaded.system)
    }
}
