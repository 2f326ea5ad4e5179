//! Resolution context handed to factories

use std::sync::Arc;
use std::time::Instant;

use keystone_domain::error::{Error, Result};
use keystone_domain::key::{Instance, TypeKey};
use keystone_domain::ports::factory::Resolve;
use keystone_domain::ports::lifecycle::ShutdownCoordinator;

use crate::di::registry::SingletonRegistry;

/// Dependency access for one running factory
///
/// Carries the chain of kinds under construction on this call path so a
/// dependency request that would re-enter a kind fails with
/// [`Error::Cycle`] instead of blocking on its own once-cell.
pub(crate) struct ResolveContext<'a> {
    pub(crate) registry: &'a SingletonRegistry,
    pub(crate) declared: Vec<TypeKey>,
    pub(crate) path: Vec<TypeKey>,
    pub(crate) deadline: Instant,
}

impl ResolveContext<'_> {
    fn requester(&self) -> String {
        self.path
            .last()
            .map_or_else(|| "<root>".to_string(), ToString::to_string)
    }
}

impl Resolve for ResolveContext<'_> {
    fn resolve(&self, key: TypeKey) -> Result<Instance> {
        if !self.declared.contains(&key) {
            return Err(Error::construction(
                self.requester(),
                format!("requested undeclared dependency {key}"),
            ));
        }
        self.registry.resolve(key, &self.path, self.deadline)
    }

    fn deadline(&self) -> Instant {
        self.deadline
    }

    fn shutdown_coordinator(&self) -> Arc<dyn ShutdownCoordinator> {
        self.registry.shutdown_coordinator()
    }
}
