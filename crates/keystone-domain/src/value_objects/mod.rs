//! Value objects

/// System configuration document
pub mod config;

pub use config::{
    ApplicationConfig, DatabaseConfig, LogConfig, LogFileConfig, MqttConfig, RedisConfig,
    SystemConfig,
};
