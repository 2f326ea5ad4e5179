//! Broker adapter
//!
//! | Type | Role |
//! |------|------|
//! | [`BrokerFactory`] | Connects to the `mqtt` section's broker |
//! | [`BrokerClient`] | Client handle with a managed event loop |
//! | [`BrokerTemplate`] | Recovery-wrapped publish / subscribe |
//! | [`Subscriptions`] | Topic-filter handler table (`+`, `#` wildcards) |

pub mod mqtt;
pub mod subscriptions;
pub mod template;

pub use mqtt::{BrokerClient, BrokerFactory};
pub use rumqttc::QoS;
pub use subscriptions::{MessageHandler, SubscriptionId, Subscriptions};
pub use template::{BrokerTemplate, DEFAULT_PUBLISH_QOS};
