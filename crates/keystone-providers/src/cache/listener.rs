//! Key expiration listener
//!
//! Pattern-subscribes to `__keyevent@*__:expired` on a dedicated connection
//! and hands every expired key to an [`ExpiredKeyHandler`]. The connection is
//! read with a short timeout so the worker notices cancellation; failures are
//! logged and the subscription is re-established after a fixed delay.

use std::sync::Arc;

use keystone_domain::error::Result;
use keystone_infrastructure::constants::WORKER_POLL_INTERVAL;
use keystone_infrastructure::lifecycle::{BackgroundWorker, sleep_unless_cancelled};
use redis::{Client, Connection, RedisResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::constants::{
    REDIS_COMMAND_TIMEOUT, REDIS_KEY_EXPIRED_PATTERN, REDIS_LISTENER_RETRY_DELAY,
    REDIS_NOTIFY_KEYSPACE_EVENTS,
};

/// Receives keys removed by expiration
pub trait ExpiredKeyHandler: Send + Sync {
    /// Called once per expired key
    fn on_expired(&self, key: &str);
}

impl<F> ExpiredKeyHandler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_expired(&self, key: &str) {
        self(key);
    }
}

/// Handler that only traces expired keys
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExpiredKeyHandler;

impl ExpiredKeyHandler for LoggingExpiredKeyHandler {
    fn on_expired(&self, key: &str) {
        trace!(key, "Cache key expired");
    }
}

/// Start the listener for the server behind `client`
pub(crate) fn spawn_listener(
    client: Client,
    target: &str,
    handler: Arc<dyn ExpiredKeyHandler>,
) -> Result<BackgroundWorker> {
    let name = format!("redis-expired-{target}");
    let target = target.to_string();
    BackgroundWorker::spawn(name, CancellationToken::new(), move |token| {
        while !token.is_cancelled() {
            match listen(&client, handler.as_ref(), &token) {
                Ok(()) => break,
                Err(e) => {
                    warn!(target = %target, error = %e, "Key expiration listener failed");
                    if !sleep_unless_cancelled(&token, REDIS_LISTENER_RETRY_DELAY) {
                        break;
                    }
                }
            }
        }
    })
}

fn listen(
    client: &Client,
    handler: &dyn ExpiredKeyHandler,
    token: &CancellationToken,
) -> RedisResult<()> {
    let mut connection = client.get_connection_with_timeout(REDIS_COMMAND_TIMEOUT)?;
    enable_notifications(&mut connection);
    connection.set_read_timeout(Some(WORKER_POLL_INTERVAL))?;

    let mut pubsub = connection.as_pubsub();
    pubsub.psubscribe(REDIS_KEY_EXPIRED_PATTERN)?;
    info!(pattern = REDIS_KEY_EXPIRED_PATTERN, "Listening for expired keys");

    while !token.is_cancelled() {
        match pubsub.get_message() {
            Ok(message) => {
                let key: String = message.get_payload()?;
                handler.on_expired(&key);
            }
            Err(e) if e.is_timeout() => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Best effort: managed servers often forbid `CONFIG SET`
fn enable_notifications(connection: &mut Connection) {
    let result: RedisResult<()> = redis::cmd("CONFIG")
        .arg("SET")
        .arg("notify-keyspace-events")
        .arg(REDIS_NOTIFY_KEYSPACE_EVENTS)
        .query(connection);
    if let Err(e) = result {
        debug!(error = %e, "Cannot enable keyspace notifications, relying on server settings");
    }
}
