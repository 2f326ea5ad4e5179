//! Provider-specific constants

use std::time::Duration;

// ============================================================================
// LIVENESS CONSTANTS
// ============================================================================

/// Upper bound for a single liveness round trip (`SELECT 1`, `PING`)
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// BROKER CONSTANTS
// ============================================================================

/// Capacity of the request channel between broker client and event loop
pub const MQTT_REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Transports the broker adapter accepts
pub const MQTT_SUPPORTED_PROTOCOLS: [&str; 2] = ["tcp", "mqtt"];

// ============================================================================
// CACHE CONSTANTS
// ============================================================================

/// Read / write timeout applied to the cache connection
pub const REDIS_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Pattern matching key expiration events on every database
pub const REDIS_KEY_EXPIRED_PATTERN: &str = "__keyevent@*__:expired";

/// `notify-keyspace-events` flags enabling expiration events
pub const REDIS_NOTIFY_KEYSPACE_EVENTS: &str = "Ex";

/// Delay before the expiration listener reconnects after a failure
pub const REDIS_LISTENER_RETRY_DELAY: Duration = Duration::from_secs(5);
