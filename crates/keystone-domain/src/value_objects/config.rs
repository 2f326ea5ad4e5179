//! System configuration value objects
//!
//! The parsed configuration is itself a registry resource: adapters resolve
//! [`SystemConfig`] as a dependency and read their own section from it.
//! Resource sections are optional; an adapter whose section is absent fails
//! with [`Error::ConfigMissing`](crate::error::Error::ConfigMissing).

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Application identity
    pub application: ApplicationConfig,
    /// Message broker connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttConfig>,
    /// SQL datasource connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
    /// Cache connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
    /// Logging output
    pub log: LogConfig,
}

impl SystemConfig {
    /// Broker section or [`Error::ConfigMissing`]
    pub fn mqtt(&self) -> Result<&MqttConfig> {
        self.mqtt
            .as_ref()
            .ok_or_else(|| Error::config_missing("mqtt section is not configured"))
    }

    /// Datasource section or [`Error::ConfigMissing`]
    pub fn database(&self) -> Result<&DatabaseConfig> {
        self.database
            .as_ref()
            .ok_or_else(|| Error::config_missing("database section is not configured"))
    }

    /// Cache section or [`Error::ConfigMissing`]
    pub fn redis(&self) -> Result<&RedisConfig> {
        self.redis
            .as_ref()
            .ok_or_else(|| Error::config_missing("redis section is not configured"))
    }

    /// Copy with every password replaced by a placeholder
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let hide = |secret: &mut Option<String>| {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        };
        if let Some(mqtt) = copy.mqtt.as_mut() {
            hide(&mut mqtt.password);
        }
        if let Some(database) = copy.database.as_mut() {
            hide(&mut database.password);
        }
        if let Some(redis) = copy.redis.as_mut() {
            hide(&mut redis.password);
        }
        copy
    }
}

/// Application identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name, used as MQTT client id prefix
    pub name: String,
}

/// MQTT broker connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host
    pub url: String,
    /// Transport, only `tcp` / `mqtt` are supported
    pub protocol: String,
    /// Broker port
    pub port: u16,
    /// Optional user name
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// Maximum in-flight messages
    pub max_inflight: u16,
    /// Whether the broker should discard the session on reconnect
    pub clean_session: bool,
    /// Fixed delay before retrying a lost connection
    pub reconnect_delay_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HOST.to_string(),
            protocol: MQTT_DEFAULT_PROTOCOL.to_string(),
            port: MQTT_DEFAULT_PORT,
            username: None,
            password: None,
            keep_alive_secs: MQTT_DEFAULT_KEEP_ALIVE_SECS,
            max_inflight: MQTT_DEFAULT_MAX_INFLIGHT,
            clean_session: false,
            reconnect_delay_secs: MQTT_DEFAULT_RECONNECT_DELAY_SECS,
        }
    }
}

/// PostgreSQL datasource settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database host
    pub url: String,
    /// Database port
    pub port: u16,
    /// Database name
    pub name: String,
    /// User name
    pub username: String,
    /// Optional password
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HOST.to_string(),
            port: DATABASE_DEFAULT_PORT,
            name: String::new(),
            username: String::new(),
            password: None,
        }
    }
}

/// Redis cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis host
    pub url: String,
    /// Redis port
    pub port: u16,
    /// Optional password
    pub password: Option<String>,
    /// Listen for key expiration events
    pub subscribe: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HOST.to_string(),
            port: REDIS_DEFAULT_PORT,
            password: None,
            subscribe: false,
        }
    }
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
    /// Optional rolling log file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<LogFileConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LOG_DEFAULT_LEVEL.to_string(),
            json: false,
            file: None,
        }
    }
}

/// Rolling log file location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFileConfig {
    /// File name prefix
    pub name: String,
    /// Directory holding the log files
    pub path: String,
}
