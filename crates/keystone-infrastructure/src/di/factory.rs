//! Factory registration helpers
//!
//! The registry stores factories type-erased; [`FnFactory`] lets a plain
//! closure plus an explicit dependency list stand in for a factory type.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use keystone_domain::error::Result;
use keystone_domain::key::{Instance, TypeKey};
use keystone_domain::ports::factory::{ResourceFactory, Resolve};

/// Object-safe view of a [`ResourceFactory`]
pub(crate) trait ErasedFactory: Send + Sync {
    fn name(&self) -> &'static str;
    fn dependencies(&self) -> Vec<TypeKey>;
    fn produce_erased(&self, resolver: &dyn Resolve) -> Result<Instance>;
}

impl<F: ResourceFactory> ErasedFactory for F {
    fn name(&self) -> &'static str {
        ResourceFactory::name(self)
    }

    fn dependencies(&self) -> Vec<TypeKey> {
        ResourceFactory::dependencies(self)
    }

    fn produce_erased(&self, resolver: &dyn Resolve) -> Result<Instance> {
        let resource = self.produce(resolver)?;
        Ok(Arc::new(resource))
    }
}

/// Factory backed by a closure
pub struct FnFactory<T, F> {
    name: &'static str,
    dependencies: Vec<TypeKey>,
    produce: F,
    _resource: PhantomData<fn() -> T>,
}

impl<T, F> FnFactory<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&dyn Resolve) -> Result<T> + Send + Sync + 'static,
{
    /// Named factory with declared dependencies
    pub fn new(name: &'static str, dependencies: Vec<TypeKey>, produce: F) -> Self {
        Self {
            name,
            dependencies,
            produce,
            _resource: PhantomData,
        }
    }
}

impl<T, F> ResourceFactory for FnFactory<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&dyn Resolve) -> Result<T> + Send + Sync + 'static,
{
    type Resource = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn dependencies(&self) -> Vec<TypeKey> {
        self.dependencies.clone()
    }

    fn produce(&self, resolver: &dyn Resolve) -> Result<T> {
        (self.produce)(resolver)
    }
}

impl<T, F> fmt::Debug for FnFactory<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
