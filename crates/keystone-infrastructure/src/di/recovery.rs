//! Validate-or-recreate access to registry resources
//!
//! A [`RecoveryWrapper`] sits in front of one resource kind. Every
//! [`acquire`](RecoveryWrapper::acquire) checks the cached instance with a
//! liveness probe and, when the probe reports it dead (or fails), evicts it
//! and lets the registry's factory build a replacement.
//!
//! ```text
//! acquire() ─▶ registry.get::<T>() ─▶ probe ──alive──▶ instance
//!                                       │dead / error
//!                                       ▼
//!                     remove_if_current(dead) ─▶ get::<T>() ─▶ probe
//!                                       ▲                        │dead
//!                                       └──── fixed delay ◀──────┘  (max_attempts)
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread;

use keystone_domain::error::{Error, Result};
use keystone_domain::key::TypeKey;
use keystone_domain::ports::resource::{LivenessProbe, ManagedResource, ResourceLiveness};
use tracing::{debug, info, warn};

use crate::config::types::RecoveryPolicy;
use crate::di::registry::SingletonRegistry;

/// Recovery policy applied to one resource kind `T`
pub struct RecoveryWrapper<T> {
    registry: Arc<SingletonRegistry>,
    probe: Arc<dyn LivenessProbe<T>>,
    policy: RecoveryPolicy,
}

impl<T: Any + Send + Sync> RecoveryWrapper<T> {
    /// Wrapper using `probe` and the registry's configured recovery policy
    pub fn new<P>(registry: Arc<SingletonRegistry>, probe: P) -> Self
    where
        P: LivenessProbe<T> + 'static,
    {
        let policy = registry.config().recovery;
        Self {
            registry,
            probe: Arc::new(probe),
            policy,
        }
    }

    /// Override the recovery policy
    #[must_use]
    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Policy in effect
    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    /// Return a usable instance of `T`, rebuilding it if the cached one is dead
    ///
    /// A first-time construction failure is returned as is. Once a dead
    /// instance has been evicted, failing to obtain a live replacement within
    /// the policy's attempts yields [`Error::Recovery`] carrying the last
    /// underlying error.
    pub fn acquire(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        let current = self.registry.get::<T>()?;
        if self.is_alive(key, &current) {
            return Ok(current);
        }

        warn!(resource = %key, "Cached instance is dead, recreating");
        self.registry.remove_if_current(&current);
        drop(current);

        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                thread::sleep(self.policy.retry_delay());
            }
            match self.registry.get::<T>() {
                Ok(fresh) if self.is_alive(key, &fresh) => {
                    info!(resource = %key, attempt, "Recovered instance");
                    return Ok(fresh);
                }
                Ok(fresh) => {
                    self.registry.remove_if_current(&fresh);
                    last_error = Some(Error::resource(format!(
                        "fresh {key} instance failed liveness check"
                    )));
                }
                Err(e) => {
                    warn!(resource = %key, attempt, error = %e, "Recreation attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(Error::recovery(key.to_string(), attempts, last_error))
    }

    fn is_alive(&self, key: TypeKey, instance: &T) -> bool {
        match self.probe.is_alive(instance) {
            Ok(true) => true,
            Ok(false) => {
                debug!(resource = %key, "Liveness check reported dead instance");
                false
            }
            Err(e) => {
                warn!(resource = %key, error = %e, "Liveness check failed, treating instance as dead");
                false
            }
        }
    }
}

impl<T: ManagedResource> RecoveryWrapper<T> {
    /// Wrapper probing through [`ManagedResource::is_alive`]
    pub fn managed(registry: Arc<SingletonRegistry>) -> Self {
        Self::new(registry, ResourceLiveness)
    }

    /// Evict the cached instance and close it
    ///
    /// Fails with [`Error::NotFound`] when no instance is cached.
    pub fn release(&self) -> Result<()> {
        let instance = self.registry.remove::<T>()?;
        instance.close()
    }
}

impl<T> Clone for RecoveryWrapper<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            probe: Arc::clone(&self.probe),
            policy: self.policy,
        }
    }
}

impl<T: Any> fmt::Debug for RecoveryWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryWrapper")
            .field("resource", &TypeKey::of::<T>())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
