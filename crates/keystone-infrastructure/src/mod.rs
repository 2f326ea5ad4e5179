//! # Infrastructure Layer
//!
//! Registry machinery and cross-cutting technical concerns used by the
//! resource adapters and the application facade.
//!
//! ### Registry
//! | Module | Description |
//! |--------|-------------|
//! | [`di`] | Singleton registry, recovery wrapper, closure factories |
//! | [`lifecycle`] | Shutdown coordination and background workers |
//!
//! ### Configuration
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | YAML / properties / TOML discovery with environment overrides |
//! | [`constants`] | Centralized configuration constants |
//!
//! ### Observability
//! | Module | Description |
//! |--------|-------------|
//! | [`logging`] | Structured logging with tracing |

pub mod config;
pub mod constants;
pub mod di;
pub mod error_ext;
pub mod lifecycle;
pub mod logging;

pub use di::{FnFactory, RecoveryWrapper, SingletonRegistry};
pub use error_ext::ErrorContext;
pub use lifecycle::{BackgroundWorker, DefaultShutdownCoordinator};
