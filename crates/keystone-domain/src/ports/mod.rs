//! Domain Port Interfaces
//!
//! Boundary contracts between the registry core and the resource adapters.
//!
//! - **factory** - how a resource kind is produced and which kinds it needs
//! - **resource** - liveness and release of produced resources
//! - **lifecycle** - shutdown coordination for background work

/// Resource factory port
pub mod factory;
/// Shutdown coordination port
pub mod lifecycle;
/// Managed resource port
pub mod resource;

pub use factory::{ResourceFactory, Resolve};
pub use lifecycle::{OwnerCheck, ShutdownAction, ShutdownCoordinator};
pub use resource::{LivenessProbe, ManagedResource, ResourceLiveness};
