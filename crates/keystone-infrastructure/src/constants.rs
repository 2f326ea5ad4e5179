//! Infrastructure layer constants
//!
//! Registry, recovery, configuration discovery and logging defaults.

use std::time::Duration;

// ============================================================================
// REGISTRY CONSTANTS
// ============================================================================

/// Default overall budget for constructing a kind and its dependencies
pub const DEFAULT_CONSTRUCTION_TIMEOUT_SECS: u64 = 30;

/// Deepest dependency chain the registry will resolve
pub const MAX_RESOLUTION_DEPTH: usize = 64;

// ============================================================================
// RECOVERY CONSTANTS
// ============================================================================

/// Default number of rebuild attempts after a failed liveness check
pub const RECOVERY_DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between rebuild attempts in milliseconds
pub const RECOVERY_DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

// ============================================================================
// CONFIGURATION CONSTANTS
// ============================================================================

/// Environment variable naming the configuration directory
pub const CONFIG_DIR_ENV: &str = "KEYSTONE_CONFIG_DIR";

/// Directory searched when [`CONFIG_DIR_ENV`] is unset
pub const DEFAULT_CONFIG_DIR: &str = ".";

/// Prefix of environment overrides, e.g. `KEYSTONE__REDIS__PORT`
pub const CONFIG_ENV_PREFIX: &str = "KEYSTONE__";

/// Separator between nested keys in environment overrides
pub const CONFIG_ENV_SEPARATOR: &str = "__";

/// Table holding registry settings inside the configuration document
pub const REGISTRY_CONFIG_KEY: &str = "registry";

/// Optional root table wrapping every section of the configuration document
pub const CONFIG_ROOT_KEY: &str = "core4etc";

// ============================================================================
// LOGGING CONSTANTS
// ============================================================================

/// Environment variable overriding the log filter
pub const LOG_ENV_FILTER: &str = "KEYSTONE_LOG";

/// Log file prefix when none is configured
pub const LOG_DEFAULT_FILE_PREFIX: &str = "keystone";

// ============================================================================
// WORKER CONSTANTS
// ============================================================================

/// How often background workers poll their cancellation token
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(250);
