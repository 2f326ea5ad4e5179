//! Configuration management
//!
//! Discovery and loading of the system configuration (YAML, properties or
//! TOML with environment overrides) and the registry's own settings.

pub mod factory;
pub mod loader;
pub mod properties;
pub mod types;

pub use factory::SystemConfigFactory;
pub use loader::{ConfigFormat, ConfigLoader, LoadedConfig, discover_config_file};
pub use properties::Properties;
pub use types::{RecoveryPolicy, RegistryConfig};
