//! # Keystone
//!
//! Application bootstrap keeping exactly one live instance of each resource
//! kind (configuration, datasource connection, broker client, cache client)
//! and replacing an instance transparently when it has died.
//!
//! ## Example
//!
//! ```ignore
//! use keystone::Application;
//!
//! let app = Application::configure().run()?;
//! let config = app.config()?;
//! app.broker_template()?.publish_str("orders/created", "{\"id\":42}")?;
//! app.shutdown();
//! ```
//!
//! ## Architecture
//!
//! - `domain` - resource keys, factory and liveness ports, errors, configuration
//! - `infrastructure` - singleton registry, recovery wrapper, configuration
//!   loading, logging, lifecycle
//! - `providers` - PostgreSQL, MQTT and Redis factories and templates

mod application;
mod context;

/// Domain layer - core types and ports
///
/// Re-exports from the domain crate for convenience
pub mod domain {
    pub use keystone_domain::*;
}

/// Infrastructure layer - registry, configuration and logging
///
/// Re-exports from the infrastructure crate for convenience
pub mod infrastructure {
    pub use keystone_infrastructure::*;
}

/// Resource adapters
///
/// Re-exports from the providers crate for convenience
pub mod providers {
    pub use keystone_providers::*;
}

pub use application::Application;
pub use context::{AppContext, ResourceCheck};
pub use keystone_domain::{Error, FactoryErrorKind, Result, SystemConfig};
pub use keystone_infrastructure::config::ConfigLoader;
