//! # Keystone - Resource Adapters
//!
//! Factories and handles for the resource kinds the registry manages. Each
//! factory resolves [`SystemConfig`](keystone_domain::SystemConfig) as its only
//! declared dependency, reads its own section and connects through the
//! client crate. Each handle implements
//! [`ManagedResource`](keystone_domain::ManagedResource) so a
//! [`RecoveryWrapper`](keystone_infrastructure::RecoveryWrapper) can probe and
//! rebuild it.
//!
//! | Kind | Factory | Handle | Template | Client |
//! |------|---------|--------|----------|--------|
//! | Datasource | [`DatasourceFactory`] | [`DatasourceConnection`] | [`DatasourceTemplate`] | `postgres` |
//! | Broker | [`BrokerFactory`] | [`BrokerClient`] | [`BrokerTemplate`] | `rumqttc` |
//! | Cache | [`CacheFactory`] | [`CacheClient`] | [`CacheTemplate`] | `redis` |
//!
//! ## Usage
//!
//! ```ignore
//! registry.register(CacheFactory::default());
//! let cache = CacheTemplate::new(Arc::clone(&registry));
//! cache.put("session:42", &session, 300)?;
//! ```

pub use keystone_domain::error::{Error, Result};

/// Provider-specific constants
pub mod constants;

/// PostgreSQL datasource
pub mod datasource;

/// MQTT broker client
pub mod broker;

/// Redis cache client
pub mod cache;

pub use broker::{BrokerClient, BrokerFactory, BrokerTemplate, MessageHandler, QoS, SubscriptionId};
pub use cache::{CacheClient, CacheFactory, CacheTemplate, ExpiredKeyHandler};
pub use datasource::{DatasourceConnection, DatasourceFactory, DatasourceTemplate};
