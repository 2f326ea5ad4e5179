//! Singleton Registry
//!
//! Concurrency-safe map from a resource kind to exactly one owned instance.
//! Missing entries are built on demand by the kind's registered factory,
//! declared dependencies first.
//!
//! ## Construction
//!
//! ```text
//! get(A) ──▶ cached? ──yes──▶ instance
//!               │no
//!               ▼
//!      check_dependencies(A)        ← cycle / missing factory, nothing built yet
//!               │
//!               ▼
//!      once-cell(A).get_or_try_init
//!               │
//!               ▼
//!      factory(A).produce(ctx) ──ctx.get::<B>()──▶ resolve(B) (same thread)
//! ```
//!
//! Each key maps to an `Arc<OnceCell<Instance>>`. The map entry is created
//! with an insert-if-absent and its guard is released before the factory
//! runs, so concurrent callers of the same key block on the cell (one
//! construction) while recursive resolution of other keys proceeds freely.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = SingletonRegistry::new(RegistryConfig::default());
//! registry.register(CacheFactory::default());
//! registry.create(system_config)?;
//!
//! let cache: Arc<CacheClient> = registry.get()?;
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use keystone_domain::error::{Error, Result};
use keystone_domain::key::{Instance, TypeKey};
use keystone_domain::ports::factory::{ResourceFactory, Resolve};
use keystone_domain::ports::lifecycle::ShutdownCoordinator;
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::types::RegistryConfig;
use crate::constants::MAX_RESOLUTION_DEPTH;
use crate::di::context::ResolveContext;
use crate::di::factory::{ErasedFactory, FnFactory};
use crate::di::graph::{DependencyNode, check_dependencies};
use crate::lifecycle::DefaultShutdownCoordinator;

type Slot = Arc<OnceCell<Instance>>;

/// Container holding one instance per resource kind
pub struct SingletonRegistry {
    instances: DashMap<TypeKey, Slot>,
    factories: DashMap<TypeKey, Arc<dyn ErasedFactory>>,
    shutdown: Arc<DefaultShutdownCoordinator>,
    closed: AtomicBool,
    config: RegistryConfig,
}

impl SingletonRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            instances: DashMap::new(),
            factories: DashMap::new(),
            shutdown: Arc::new(DefaultShutdownCoordinator::new()),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Registry settings
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ========================================================================
    // Factory registration
    // ========================================================================

    /// Register the factory for `F::Resource`, replacing any previous one
    pub fn register<F: ResourceFactory>(&self, factory: F) {
        let key = TypeKey::of::<F::Resource>();
        let dependencies = ResourceFactory::dependencies(&factory);
        let name = ResourceFactory::name(&factory);
        if self.factories.insert(key, Arc::new(factory)).is_some() {
            debug!(resource = %key, factory = name, "Replacing registered factory");
        } else {
            debug!(resource = %key, factory = name, ?dependencies, "Registered factory");
        }
    }

    /// Register a closure as the factory for `T`
    pub fn register_fn<T, F>(&self, name: &'static str, dependencies: Vec<TypeKey>, produce: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolve) -> Result<T> + Send + Sync + 'static,
    {
        self.register(FnFactory::new(name, dependencies, produce));
    }

    /// Whether a factory is registered for `key`
    pub fn has_factory(&self, key: TypeKey) -> bool {
        self.factories.contains_key(&key)
    }

    // ========================================================================
    // Registry operations
    // ========================================================================

    /// Store `instance` unless `T` already has one; returns the stored instance
    pub fn create<T: Any + Send + Sync>(&self, instance: T) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        downcast(key, self.create_erased(key, Arc::new(instance))?)
    }

    /// Store an erased `instance` for `key` unless one exists
    ///
    /// Fails with [`Error::InvalidArgument`] when the instance is not of the
    /// kind `key` names, and with [`Error::Construction`] after
    /// [`shutdown`](Self::shutdown).
    pub fn create_erased(&self, key: TypeKey, instance: Instance) -> Result<Instance> {
        if self.is_shut_down() {
            return Err(Error::construction(key.to_string(), "registry is shut down"));
        }
        if (*instance).type_id() != key.type_id() {
            return Err(Error::invalid_argument(format!(
                "instance does not belong to kind {key}"
            )));
        }
        let slot = self.slot(key);
        let mut stored = false;
        let current = slot.get_or_init(|| {
            stored = true;
            instance
        });
        if stored {
            info!(resource = %key, "Registered instance");
        } else {
            debug!(resource = %key, "Instance already registered, keeping existing");
        }
        Ok(Arc::clone(current))
    }

    /// Singleton for `T`, built through its factory if absent
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        downcast(key, self.get_key(key)?)
    }

    /// Singleton for `key`, built through its factory if absent
    pub fn get_key(&self, key: TypeKey) -> Result<Instance> {
        let deadline = Instant::now() + self.config.construction_timeout();
        self.resolve(key, &[], deadline)
    }

    /// Evict the singleton for `T`, returning it
    pub fn remove<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        downcast(key, self.remove_key(key)?)
    }

    /// Evict the singleton for `key`, returning it
    ///
    /// Fails with [`Error::NotFound`] and leaves the map untouched when no
    /// instance is cached.
    pub fn remove_key(&self, key: TypeKey) -> Result<Instance> {
        let (_, slot) = self
            .instances
            .remove_if(&key, |_, slot| slot.get().is_some())
            .ok_or_else(|| Error::not_found(key.to_string()))?;
        info!(resource = %key, "Removed instance");
        slot.get()
            .cloned()
            .ok_or_else(|| Error::internal(format!("evicted slot for {key} was empty")))
    }

    /// Evict the singleton for `T` only if it is still `expected`
    ///
    /// Returns whether an eviction happened. Lets concurrent recoveries of the
    /// same kind avoid discarding an instance another thread just rebuilt.
    pub fn remove_if_current<T: Any + Send + Sync>(&self, expected: &Arc<T>) -> bool {
        let key = TypeKey::of::<T>();
        let expected = Arc::as_ptr(expected);
        let removed = self
            .instances
            .remove_if(&key, |_, slot| {
                slot.get()
                    .is_some_and(|current| std::ptr::addr_eq(Arc::as_ptr(current), expected))
            })
            .is_some();
        if removed {
            info!(resource = %key, "Removed instance");
        }
        removed
    }

    /// Whether `T` has a cached instance
    pub fn exists<T: Any>(&self) -> bool {
        self.exists_key(TypeKey::of::<T>())
    }

    /// Whether `key` has a cached instance
    pub fn exists_key(&self, key: TypeKey) -> bool {
        self.cached(key).is_some()
    }

    /// Kinds with a cached instance
    pub fn keys(&self) -> Vec<TypeKey> {
        self.instances
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .map(|entry| *entry.key())
            .collect()
    }

    /// Number of cached instances
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether no instance is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Coordinator receiving shutdown actions from adapters
    pub fn shutdown_coordinator(&self) -> Arc<dyn ShutdownCoordinator> {
        self.shutdown.clone()
    }

    /// Run registered shutdown actions and drop every cached instance
    ///
    /// Later constructions fail; cached lookups are no longer possible since
    /// the map is empty.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(instances = self.len(), "Shutting down registry");
        self.shutdown.signal_shutdown();
        self.instances.clear();
    }

    /// Whether [`shutdown`](Self::shutdown) was called
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    pub(crate) fn resolve(
        &self,
        key: TypeKey,
        path: &[TypeKey],
        deadline: Instant,
    ) -> Result<Instance> {
        if let Some(instance) = self.cached(key) {
            return Ok(instance);
        }
        if self.is_shut_down() {
            return Err(Error::construction(key.to_string(), "registry is shut down"));
        }
        if path.contains(&key) {
            let cycle = path
                .iter()
                .skip_while(|entry| **entry != key)
                .chain(std::iter::once(&key))
                .map(ToString::to_string);
            return Err(Error::cycle(cycle));
        }
        if path.len() >= MAX_RESOLUTION_DEPTH {
            return Err(Error::construction(
                key.to_string(),
                format!("dependency chain deeper than {MAX_RESOLUTION_DEPTH}"),
            ));
        }
        if path.is_empty() {
            check_dependencies(key, |node| self.describe(node))?;
        }

        let slot = self.slot(key);
        slot.get_or_try_init(|| self.construct(key, path, deadline))
            .cloned()
    }

    fn construct(&self, key: TypeKey, path: &[TypeKey], deadline: Instant) -> Result<Instance> {
        let factory = self
            .factories
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::construction(key.to_string(), "no factory registered"))?;

        let mut chain = path.to_vec();
        chain.push(key);
        let context = ResolveContext {
            registry: self,
            declared: factory.dependencies(),
            path: chain,
            deadline,
        };

        debug!(resource = %key, factory = factory.name(), "Constructing instance");
        let started = Instant::now();
        let instance = factory
            .produce_erased(&context)
            .map_err(|e| match e {
                Error::Cycle { .. } => e,
                other => Error::construction_with_source(
                    key.to_string(),
                    format!("factory {} failed", factory.name()),
                    other,
                ),
            })?;

        if (*instance).type_id() != key.type_id() {
            return Err(Error::construction(
                key.to_string(),
                format!("factory {} produced a foreign type", factory.name()),
            ));
        }
        if Instant::now() > deadline {
            warn!(resource = %key, elapsed = ?started.elapsed(), "Construction finished past its deadline");
        }
        info!(resource = %key, elapsed = ?started.elapsed(), "Constructed instance");
        Ok(instance)
    }

    fn cached(&self, key: TypeKey) -> Option<Instance> {
        self.instances
            .get(&key)
            .and_then(|slot| slot.get().cloned())
    }

    fn slot(&self, key: TypeKey) -> Slot {
        Arc::clone(&self.instances.entry(key).or_default())
    }

    fn describe(&self, key: TypeKey) -> DependencyNode {
        if self.cached(key).is_some() {
            return DependencyNode::Cached;
        }
        self.factories
            .get(&key)
            .map_or(DependencyNode::Missing, |factory| {
                DependencyNode::Factory(factory.dependencies())
            })
    }
}

impl Default for SingletonRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("instances", &self.keys())
            .field("factories", &self.factories.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn downcast<T: Any + Send + Sync>(key: TypeKey, instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| Error::internal(format!("registry entry for {key} has a foreign type")))
}
