//! Configuration loader
//!
//! Discovers the configuration file and merges it with defaults and
//! environment overrides through Figment.
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. Default values from [`SystemConfig::default`] / [`RegistryConfig::default`]
//! 2. The first supported file found below the configuration directory
//! 3. Environment variables, e.g. `KEYSTONE__REDIS__PORT=6380`
//!
//! Sections may sit at the top level of the file or below a single
//! `core4etc` root table (`core4etc.redis.port`); environment overrides
//! always address the sections directly.
//!
//! The configuration directory comes from [`ConfigLoader::with_config_dir`],
//! else from `KEYSTONE_CONFIG_DIR`, else the current directory. It is walked
//! recursively in file-name order and the first `.yaml`, `.yml`,
//! `.properties` or `.toml` file wins.

use std::env;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use keystone_domain::error::{Error, Result};
use keystone_domain::value_objects::SystemConfig;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::properties::Properties;
use crate::config::types::RegistryConfig;
use crate::constants::*;
use crate::error_ext::ErrorContext;

/// Serialization formats understood by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.properties`, flat keys with dot-delimited nesting
    Properties,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Format for `path` judged by its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("properties") => Ok(Self::Properties),
            Some("toml") => Ok(Self::Toml),
            _ => Err(Error::unsupported_format(path.display().to_string())),
        }
    }

    /// Whether `path` has a supported extension
    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }
}

/// Result of a configuration load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    /// File the configuration was read from
    pub source: PathBuf,
    /// Application configuration
    pub system: SystemConfig,
    /// Registry settings (`registry` table)
    pub registry: RegistryConfig,
}

/// Configuration loader service
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Directory searched for a configuration file
    config_dir: Option<PathBuf>,

    /// Explicit configuration file, skips discovery
    config_path: Option<PathBuf>,

    /// Environment prefix
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    pub fn new() -> Self {
        Self {
            config_dir: None,
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    /// Set the directory searched for a configuration file
    pub fn with_config_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Use this file instead of searching a directory
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Directory that will be searched
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(|| {
            env::var_os(CONFIG_DIR_ENV)
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR), PathBuf::from)
        })
    }

    /// Load configuration from all sources
    pub fn load(&self) -> Result<LoadedConfig> {
        let source = self.resolve_source()?;
        let format = ConfigFormat::from_path(&source)?;

        let mut file = match format {
            ConfigFormat::Yaml => Figment::from(Yaml::file(&source)),
            ConfigFormat::Toml => Figment::from(Toml::file(&source)),
            ConfigFormat::Properties => Figment::from(Properties::file(&source)),
        };
        if file.contains(CONFIG_ROOT_KEY) {
            debug!(root = CONFIG_ROOT_KEY, "Reading sections below the root table");
            file = file.focus(CONFIG_ROOT_KEY);
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(SystemConfig::default()))
            .merge(file)
            .merge(Env::prefixed(&self.env_prefix).split(CONFIG_ENV_SEPARATOR));

        let system: SystemConfig = figment
            .extract_lossy()
            .config_context(format!("Failed to read {}", source.display()))?;

        let registry: RegistryConfig = if figment.contains(REGISTRY_CONFIG_KEY) {
            figment
                .extract_inner_lossy(REGISTRY_CONFIG_KEY)
                .config_context("Failed to read registry settings")?
        } else {
            RegistryConfig::default()
        };

        info!(path = %source.display(), ?format, "Configuration loaded");
        Ok(LoadedConfig {
            source,
            system,
            registry,
        })
    }

    fn resolve_source(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config_path {
            if !path.is_file() {
                return Err(Error::config_missing(format!(
                    "configuration file {} does not exist",
                    path.display()
                )));
            }
            return Ok(path.clone());
        }
        discover_config_file(&self.config_dir())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// First supported configuration file below `root`, in file-name order
pub fn discover_config_file(root: &Path) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(Error::config_missing(format!(
            "configuration directory {} does not exist",
            root.display()
        )));
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable configuration entry");
                continue;
            }
        };
        if entry.file_type().is_file() && ConfigFormat::is_supported(entry.path()) {
            debug!(path = %entry.path().display(), "Found configuration file");
            return Ok(entry.into_path());
        }
    }

    Err(Error::config_missing(format!(
        "no configuration files found in {}",
        root.display()
    )))
}
