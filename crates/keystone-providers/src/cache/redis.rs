//! Redis cache client
//!
//! One synchronous connection per registry, guarded by a mutex. When the
//! `redis.subscribe` flag is set the client also owns a key expiration
//! listener running on its own connection.
//!
//! ## Example
//!
//! ```ignore
//! registry.register(CacheFactory::default().with_expired_key_handler(|key: &str| {
//!     sessions.forget(key);
//! }));
//! let cache: Arc<CacheClient> = registry.get()?;
//! cache.set("session:42", "{}", 300)?;
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use keystone_domain::error::{Error, Result};
use keystone_domain::key::TypeKey;
use keystone_domain::ports::factory::{ResourceFactory, Resolve};
use keystone_domain::ports::resource::ManagedResource;
use keystone_domain::value_objects::{RedisConfig, SystemConfig};
use keystone_infrastructure::error_ext::ErrorContext;
use keystone_infrastructure::lifecycle::BackgroundWorker;
use redis::{Client, Commands, Connection, ConnectionLike, RedisError, RedisResult};
use tracing::{debug, info, warn};

use super::listener::{ExpiredKeyHandler, LoggingExpiredKeyHandler, spawn_listener};
use crate::constants::{LIVENESS_TIMEOUT, REDIS_COMMAND_TIMEOUT};

/// Factory connecting to the `redis` section's server
#[derive(Clone)]
pub struct CacheFactory {
    expired_keys: Arc<dyn ExpiredKeyHandler>,
}

impl CacheFactory {
    /// Factory with the tracing expiration handler
    pub fn new() -> Self {
        Self {
            expired_keys: Arc::new(LoggingExpiredKeyHandler),
        }
    }

    /// Handler receiving expired keys when `redis.subscribe` is set
    #[must_use]
    pub fn with_expired_key_handler<H>(mut self, handler: H) -> Self
    where
        H: ExpiredKeyHandler + 'static,
    {
        self.expired_keys = Arc::new(handler);
        self
    }
}

impl Default for CacheFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheFactory").finish_non_exhaustive()
    }
}

impl ResourceFactory for CacheFactory {
    type Resource = CacheClient;

    fn name(&self) -> &'static str {
        "cache"
    }

    fn dependencies(&self) -> Vec<TypeKey> {
        vec![TypeKey::of::<SystemConfig>()]
    }

    fn produce(&self, resolver: &dyn Resolve) -> Result<CacheClient> {
        let config = resolver.get::<SystemConfig>()?;
        let redis = config.redis()?;
        let handler = redis.subscribe.then(|| Arc::clone(&self.expired_keys));
        let client = CacheClient::connect(redis, resolver.remaining(), handler)?;
        if let Some(listener) = &client.listener {
            listener.stop_on_shutdown(resolver.shutdown_coordinator().as_ref());
        }
        Ok(client)
    }
}

/// Shared handle on a single Redis connection
pub struct CacheClient {
    connection: Mutex<Option<Connection>>,
    listener: Option<Arc<BackgroundWorker>>,
    target: String,
}

impl CacheClient {
    /// Connect within `timeout`; starts the expiration listener when a
    /// handler is given
    pub fn connect(
        redis: &RedisConfig,
        timeout: Duration,
        expired_keys: Option<Arc<dyn ExpiredKeyHandler>>,
    ) -> Result<Self> {
        let target = format!("{}:{}", redis.url, redis.port);
        let client = Client::open(connection_url(redis))
            .map_err(|e| classify(&target, e))?;

        debug!(target = %target, "Connecting to cache");
        let connection = client
            .get_connection_with_timeout(timeout)
            .map_err(|e| classify(&target, e))?;
        connection
            .set_read_timeout(Some(REDIS_COMMAND_TIMEOUT))
            .and_then(|()| connection.set_write_timeout(Some(REDIS_COMMAND_TIMEOUT)))
            .connect_context(format!("Cannot configure cache connection {target}"))?;
        info!(target = %target, "Cache connected");

        let listener = match expired_keys {
            Some(handler) => Some(Arc::new(spawn_listener(client, &target, handler)?)),
            None => None,
        };

        Ok(Self {
            connection: Mutex::new(Some(connection)),
            listener,
            target,
        })
    }

    /// `host:port` this handle points at
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the key expiration listener is running
    pub fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| listener.is_running())
    }

    /// Store `value` under `key`, expiring after `ttl_secs` (0 keeps it forever)
    pub fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.with_connection(|connection| {
            if ttl_secs > 0 {
                connection.set_ex(key, value, ttl_secs)
            } else {
                connection.set(key, value)
            }
        })
        .context(format!("Cache SET {key} failed"))
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|connection| connection.get(key))
            .context(format!("Cache GET {key} failed"))
    }

    /// Delete `key`; returns whether it existed
    pub fn delete(&self, key: &str) -> Result<bool> {
        let removed: i64 = self
            .with_connection(|connection| connection.del(key))
            .context(format!("Cache DEL {key} failed"))?;
        Ok(removed > 0)
    }

    /// Run `f` against the underlying connection
    pub fn with_connection<R, F>(&self, f: F) -> RedisResult<R>
    where
        F: FnOnce(&mut Connection) -> RedisResult<R>,
    {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(connection) => f(connection),
            None => Err(RedisError::from(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                format!("cache {} is closed", self.target),
            ))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ManagedResource for CacheClient {
    fn is_alive(&self) -> Result<bool> {
        let mut guard = self.lock();
        let Some(connection) = guard.as_mut() else {
            return Ok(false);
        };
        if !connection.is_open() {
            return Ok(false);
        }
        connection
            .set_read_timeout(Some(LIVENESS_TIMEOUT))
            .context("Cannot bound cache liveness check")?;
        let pong: RedisResult<String> = redis::cmd("PING").query(connection);
        let restored = connection.set_read_timeout(Some(REDIS_COMMAND_TIMEOUT));
        let pong = pong.context(format!("Cache {} did not answer PING", self.target))?;
        if let Err(e) = restored {
            warn!(target = %self.target, error = %e, "Cannot restore cache read timeout");
        }
        Ok(pong == "PONG")
    }

    fn close(&self) -> Result<()> {
        info!(target = %self.target, "Closing cache client");
        if let Some(listener) = &self.listener {
            listener.stop();
        }
        drop(self.lock().take());
        Ok(())
    }
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("target", &self.target)
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

/// Connection URL for `redis`, with the password percent-encoded
fn connection_url(redis: &RedisConfig) -> String {
    match redis.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => format!(
            "redis://:{}@{}:{}",
            urlencoding::encode(password),
            redis.url,
            redis.port
        ),
        None => format!("redis://{}:{}", redis.url, redis.port),
    }
}

fn classify(target: &str, error: RedisError) -> Error {
    if matches!(error.kind(), redis::ErrorKind::AuthenticationFailed) {
        warn!(target = %target, "Cache rejected credentials");
        Error::authentication_with_source(format!("Cache {target} rejected credentials"), error)
    } else {
        Error::connect_with_source(format!("Cannot connect to cache {target}"), error)
    }
}
