//! Configuration Loader Tests

use std::fs;
use std::path::Path;
use std::time::Duration;

use figment::Jail;
use keystone_domain::error::{Error, Result};
use keystone_domain::value_objects::SystemConfig;
use keystone_infrastructure::config::{
    ConfigFormat, ConfigLoader, LoadedConfig, RegistryConfig, SystemConfigFactory, discover_config_file,
};
use keystone_infrastructure::di::SingletonRegistry;
use tempfile::TempDir;

const YAML: &str = r#"
application:
  name: demo
redis:
  url: cache.local
  port: "6380"
  subscribe: true
database:
  url: db.local
  name: orders
  username: app
  password: secret
registry:
  construction_timeout_secs: 5
  recovery:
    max_attempts: 2
"#;

const PROPERTIES: &str = "\
# broker settings
application.name=demo
mqtt.url=broker.local
mqtt.port=1884
mqtt.clean_session=true
log.level=debug
registry.recovery.retry_delay_ms=250
";

const TOML: &str = r#"
[application]
name = "demo"

[redis]
url = "cache.local"
"#;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Loader isolated from overrides set by the `Jail` tests running in parallel
fn isolated_loader() -> ConfigLoader {
    ConfigLoader::new().with_env_prefix("KEYSTONE_ISOLATED__")
}

fn load_from(dir: &Path) -> Result<LoadedConfig> {
    isolated_loader().with_config_dir(dir).load()
}

#[test]
fn test_yaml_config_loaded() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "application.yaml", YAML);

    let loaded = load_from(dir.path()).unwrap();

    assert_eq!(loaded.source, dir.path().join("application.yaml"));
    assert_eq!(loaded.system.application.name, "demo");
    let redis = loaded.system.redis().unwrap();
    assert_eq!(redis.url, "cache.local");
    assert_eq!(redis.port, 6380);
    assert!(redis.subscribe);
    assert_eq!(loaded.system.database().unwrap().name, "orders");
    assert!(loaded.system.mqtt.is_none());
    assert_eq!(loaded.registry.construction_timeout(), Duration::from_secs(5));
    assert_eq!(loaded.registry.recovery.max_attempts, 2);
    assert_eq!(
        loaded.registry.recovery.retry_delay(),
        RegistryConfig::default().recovery.retry_delay()
    );
}

#[test]
fn test_properties_config_loaded() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "application.properties", PROPERTIES);

    let loaded = load_from(dir.path()).unwrap();

    let mqtt = loaded.system.mqtt().unwrap();
    assert_eq!(mqtt.url, "broker.local");
    assert_eq!(mqtt.port, 1884);
    assert!(mqtt.clean_session);
    assert_eq!(mqtt.protocol, "tcp");
    assert_eq!(loaded.system.log.level, "debug");
    assert_eq!(loaded.registry.recovery.retry_delay(), Duration::from_millis(250));
}

#[test]
fn test_sections_below_root_table_loaded() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "application.yaml",
        "core4etc:\n  application:\n    name: orders\n  redis:\n    url: cache.local\n    port: 6381\n  registry:\n    construction_timeout_secs: 2\n",
    );

    let loaded = load_from(dir.path()).unwrap();

    assert_eq!(loaded.system.application.name, "orders");
    let redis = loaded.system.redis.as_ref().unwrap();
    assert_eq!(redis.url, "cache.local");
    assert_eq!(redis.port, 6381);
    assert!(loaded.system.mqtt.is_none());
    assert_eq!(loaded.registry.construction_timeout(), Duration::from_secs(2));
}

#[test]
fn test_properties_below_root_table_loaded() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "application.properties",
        "core4etc.application.name=orders\ncore4etc.mqtt.url=broker.local\n",
    );

    let loaded = load_from(dir.path()).unwrap();

    assert_eq!(loaded.system.application.name, "orders");
    assert_eq!(loaded.system.mqtt().unwrap().url, "broker.local");
}

#[test]
fn test_toml_config_loaded() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "application.toml", TOML);

    let loaded = load_from(dir.path()).unwrap();

    assert_eq!(loaded.system.redis().unwrap().url, "cache.local");
    assert_eq!(loaded.system.redis().unwrap().port, 6379);
    assert_eq!(loaded.registry, RegistryConfig::default());
}

#[test]
fn test_discovery_walks_in_name_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "notes.txt", "not a config");
    write(dir.path(), "b.yaml", YAML);
    write(dir.path(), "a/z.toml", TOML);

    let found = discover_config_file(dir.path()).unwrap();

    assert_eq!(found, dir.path().join("a").join("z.toml"));
}

#[test]
fn test_missing_directory_is_config_missing() {
    let dir = TempDir::new().unwrap();

    let result = load_from(&dir.path().join("absent"));

    assert!(matches!(result, Err(Error::ConfigMissing { .. })));
}

#[test]
fn test_directory_without_config_is_config_missing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "readme.md", "# nothing here");

    let result = load_from(dir.path());

    assert!(matches!(result, Err(Error::ConfigMissing { .. })));
}

#[test]
fn test_explicit_unsupported_file_rejected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "config.json", "{}");

    let result = ConfigLoader::new()
        .with_config_path(dir.path().join("config.json"))
        .load();

    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn test_explicit_missing_file_is_config_missing() {
    let dir = TempDir::new().unwrap();

    let result = ConfigLoader::new()
        .with_config_path(dir.path().join("application.yaml"))
        .load();

    assert!(matches!(result, Err(Error::ConfigMissing { .. })));
}

#[test]
fn test_format_from_extension() {
    assert_eq!(
        ConfigFormat::from_path(Path::new("a.YML")).unwrap(),
        ConfigFormat::Yaml
    );
    assert_eq!(
        ConfigFormat::from_path(Path::new("a.properties")).unwrap(),
        ConfigFormat::Properties
    );
    assert!(!ConfigFormat::is_supported(Path::new("a.ini")));
}

#[test]
fn test_env_overrides_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file("application.yaml", YAML)?;
        jail.set_env("KEYSTONE__REDIS__PORT", "6390");
        jail.set_env("KEYSTONE__MQTT__URL", "broker.env");

        let loaded = ConfigLoader::new()
            .with_config_dir(jail.directory())
            .load()
            .map_err(|e| e.to_string())?;

        assert_eq!(loaded.system.redis().map_err(|e| e.to_string())?.port, 6390);
        assert_eq!(loaded.system.redis().map_err(|e| e.to_string())?.url, "cache.local");
        assert_eq!(loaded.system.mqtt().map_err(|e| e.to_string())?.url, "broker.env");
        Ok(())
    });
}

#[test]
fn test_config_dir_taken_from_environment() {
    Jail::expect_with(|jail| {
        fs::create_dir_all(jail.directory().join("conf")).map_err(|e| e.to_string())?;
        jail.create_file("conf/app.toml", TOML)?;
        jail.set_env("KEYSTONE_CONFIG_DIR", jail.directory().join("conf").display());

        let loader = ConfigLoader::new();
        assert_eq!(loader.config_dir(), jail.directory().join("conf"));
        let loaded = loader.load().map_err(|e| e.to_string())?;
        assert_eq!(loaded.system.application.name, "demo");
        Ok(())
    });
}

#[test]
fn test_system_config_factory_reloads_after_removal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "application.yaml", YAML);
    let registry = SingletonRegistry::default();
    registry.register(SystemConfigFactory::new(
        isolated_loader().with_config_dir(dir.path()),
    ));

    let first = registry.get::<SystemConfig>().unwrap();
    registry.remove::<SystemConfig>().unwrap();
    let second = registry.get::<SystemConfig>().unwrap();

    assert_eq!(first.application.name, "demo");
    assert_eq!(*first, *second);
}
