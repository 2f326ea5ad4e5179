//! Resource Factory Port
//!
//! Port implemented once per resource kind. A factory declares the kinds it
//! depends on up front and builds a fresh instance from the already-resolved
//! dependencies handed to it by the registry.
//!
//! ## Example
//!
//! ```ignore
//! struct GreeterFactory;
//!
//! impl ResourceFactory for GreeterFactory {
//!     type Resource = Greeter;
//!
//!     fn dependencies(&self) -> Vec<TypeKey> {
//!         vec![TypeKey::of::<SystemConfig>()]
//!     }
//!
//!     fn produce(&self, resolver: &dyn Resolve) -> Result<Greeter> {
//!         let config = resolver.get::<SystemConfig>()?;
//!         Ok(Greeter::new(&config.application.name))
//!     }
//! }
//! ```

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::key::{Instance, TypeKey};
use crate::ports::lifecycle::ShutdownCoordinator;

/// Dependency access handed to a factory while it runs
pub trait Resolve {
    /// Resolve a declared dependency to its registry instance
    fn resolve(&self, key: TypeKey) -> Result<Instance>;

    /// Point in time by which the whole construction must finish
    fn deadline(&self) -> Instant;

    /// Coordinator collecting shutdown actions for background work
    fn shutdown_coordinator(&self) -> Arc<dyn ShutdownCoordinator>;
}

impl dyn Resolve + '_ {
    /// Resolve a declared dependency with its concrete type
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        self.resolve(key)?
            .downcast::<T>()
            .map_err(|_| Error::internal(format!("registry entry for {key} has a foreign type")))
    }

    /// Time left before the construction deadline
    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }
}

/// Capability producing fresh instances of one resource kind
pub trait ResourceFactory: Send + Sync + 'static {
    /// Kind produced by this factory
    type Resource: Send + Sync + 'static;

    /// Name used in logs and errors
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Kinds that must be resolved before [`produce`](Self::produce) runs
    fn dependencies(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    /// Build a fresh instance
    ///
    /// Errors should use the factory kinds: [`Error::ConfigMissing`],
    /// [`Error::Connect`], [`Error::Authentication`] or [`Error::Unsupported`].
    fn produce(&self, resolver: &dyn Resolve) -> Result<Self::Resource>;
}
