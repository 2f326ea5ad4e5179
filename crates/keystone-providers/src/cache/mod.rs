//! Cache adapter
//!
//! | Type | Role |
//! |------|------|
//! | [`CacheFactory`] | Connects to the `redis` section's server |
//! | [`CacheClient`] | Shared connection, liveness via `PING` |
//! | [`CacheTemplate`] | Recovery-wrapped JSON get / put / delete |
//! | [`ExpiredKeyHandler`] | Receiver of key expiration events |

pub mod listener;
pub mod redis;
pub mod template;

pub use self::redis::{CacheClient, CacheFactory};
pub use listener::{ExpiredKeyHandler, LoggingExpiredKeyHandler};
pub use template::CacheTemplate;
