//! Domain layer constants
//!
//! Defaults for the system configuration sections. Registry and loader
//! constants live in `keystone_infrastructure::constants`.

// ============================================================================
// BROKER (MQTT) DEFAULTS
// ============================================================================

/// Default MQTT transport
pub const MQTT_DEFAULT_PROTOCOL: &str = "tcp";

/// Default MQTT port
pub const MQTT_DEFAULT_PORT: u16 = 1883;

/// Default MQTT keep-alive interval in seconds
pub const MQTT_DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// Default maximum number of in-flight MQTT messages
pub const MQTT_DEFAULT_MAX_INFLIGHT: u16 = 200;

/// Default delay before the event loop retries a lost broker connection
pub const MQTT_DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

// ============================================================================
// DATASOURCE DEFAULTS
// ============================================================================

/// Default PostgreSQL port
pub const DATABASE_DEFAULT_PORT: u16 = 5432;

// ============================================================================
// CACHE (REDIS) DEFAULTS
// ============================================================================

/// Default Redis port
pub const REDIS_DEFAULT_PORT: u16 = 6379;

// ============================================================================
// SHARED DEFAULTS
// ============================================================================

/// Default host for every external service
pub const DEFAULT_HOST: &str = "localhost";

/// Default log level
pub const LOG_DEFAULT_LEVEL: &str = "info";

/// Placeholder printed instead of secrets
pub const REDACTED: &str = "********";
