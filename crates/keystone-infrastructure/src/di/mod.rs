//! Singleton registry and recovery
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | Type-keyed singleton map with factory-driven construction |
//! | [`recovery`] | Validate-or-recreate wrapper per resource kind |
//! | [`factory`] | Closure-backed factories |
//!
//! Dependency graph validation and the resolution context handed to
//! factories are internal to this module.

mod context;
pub mod factory;
mod graph;
pub mod recovery;
pub mod registry;

pub use factory::FnFactory;
pub use recovery::RecoveryWrapper;
pub use registry::SingletonRegistry;
