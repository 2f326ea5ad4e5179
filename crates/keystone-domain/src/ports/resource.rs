//! Managed resource port
//!
//! Liveness and release contract shared by every recoverable resource kind.

use crate::error::Result;

/// A resource whose liveness can be checked and which can be closed
pub trait ManagedResource: Send + Sync + 'static {
    /// Whether the instance is still usable
    ///
    /// An `Err` is treated as "dead" by the recovery wrapper.
    fn is_alive(&self) -> Result<bool>;

    /// Close the underlying connection
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Liveness predicate for instances of `T`
pub trait LivenessProbe<T: ?Sized>: Send + Sync {
    /// Whether `resource` is still usable
    fn is_alive(&self, resource: &T) -> Result<bool>;
}

impl<T: ?Sized, F> LivenessProbe<T> for F
where
    F: Fn(&T) -> Result<bool> + Send + Sync,
{
    fn is_alive(&self, resource: &T) -> Result<bool> {
        self(resource)
    }
}

/// Probe delegating to [`ManagedResource::is_alive`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLiveness;

impl<T: ManagedResource> LivenessProbe<T> for ResourceLiveness {
    fn is_alive(&self, resource: &T) -> Result<bool> {
        resource.is_alive()
    }
}
