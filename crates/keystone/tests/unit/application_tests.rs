//! Application Bootstrap Tests
//!
//! Boots the application from temporary configuration directories. No
//! resource server is needed: resources are either unconfigured, pointed at
//! a closed port, or produced by failing test factories.

use std::fs;

use keystone::domain::key::TypeKey;
use keystone::domain::ports::factory::{ResourceFactory, Resolve};
use keystone::providers::CacheClient;
use keystone::{Application, ConfigLoader, Error, FactoryErrorKind, Result, SystemConfig};
use tempfile::TempDir;

const MINIMAL_YAML: &str = "\
application:
  name: orders
log:
  level: debug
";

const CLOSED_REDIS_YAML: &str = "\
application:
  name: orders
redis:
  url: 127.0.0.1
  port: 1
";

fn config_dir(yaml: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("application.yaml"), yaml).unwrap();
    dir
}

fn application(dir: &TempDir) -> Application {
    Application::configure()
        .with_system(
            ConfigLoader::new()
                .with_config_dir(dir.path())
                .with_env_prefix("KEYSTONE_APP_TEST__"),
        )
        .with_logging(false)
}

/// Cache factory that always fails with its own name
struct RefusingCache(&'static str);

impl ResourceFactory for RefusingCache {
    type Resource = CacheClient;

    fn name(&self) -> &'static str {
        self.0
    }

    fn dependencies(&self) -> Vec<TypeKey> {
        vec![TypeKey::of::<SystemConfig>()]
    }

    fn produce(&self, _resolver: &dyn Resolve) -> Result<CacheClient> {
        Err(Error::unsupported(format!("{} cannot build a cache", self.0)))
    }
}

#[test]
fn test_minimal_configuration_starts_nothing_else() {
    let dir = config_dir(MINIMAL_YAML);

    let app = application(&dir).run().unwrap();

    assert_eq!(app.config().unwrap().application.name, "orders");
    assert_eq!(app.config_source(), dir.path().join("application.yaml"));
    assert!(matches!(app.datasource(), Err(Error::NotFound { .. })));
    assert!(matches!(app.broker(), Err(Error::NotFound { .. })));
    assert!(matches!(app.cache(), Err(Error::NotFound { .. })));
    assert!(matches!(app.release_cache(), Err(Error::NotFound { .. })));
    assert!(app.check().is_empty());
    assert_eq!(app.registry().len(), 1);
}

#[test]
fn test_missing_configuration_is_fatal() {
    let dir = TempDir::new().unwrap();

    let error = application(&dir).run().err().unwrap();

    assert!(matches!(error, Error::ConfigMissing { .. }));
}

#[test]
fn test_configuration_reloads_after_removal() {
    let dir = config_dir(MINIMAL_YAML);
    let app = application(&dir).run().unwrap();
    let first = app.config().unwrap();

    app.registry().remove::<SystemConfig>().unwrap();
    let reloaded = app.config().unwrap();

    assert!(!std::sync::Arc::ptr_eq(&first, &reloaded));
    assert_eq!(*first, *reloaded);
}

#[test]
fn test_custom_factory_starts_without_section() {
    let dir = config_dir(MINIMAL_YAML);

    let error = application(&dir)
        .with_cache(RefusingCache("custom-cache"))
        .run()
        .err()
        .unwrap();

    assert!(matches!(error, Error::Construction { .. }));
    assert_eq!(error.factory_kind(), Some(FactoryErrorKind::Unsupported));
    assert!(error.to_string().contains("custom-cache"));
}

#[test]
fn test_if_absent_keeps_first_factory() {
    let dir = config_dir(MINIMAL_YAML);

    let error = application(&dir)
        .with_cache(RefusingCache("first-cache"))
        .with_cache_if_absent(RefusingCache("second-cache"))
        .run()
        .err()
        .unwrap();

    assert!(error.to_string().contains("first-cache"));
}

#[test]
fn test_if_absent_sets_missing_factory() {
    let dir = config_dir(MINIMAL_YAML);

    let error = application(&dir)
        .with_cache_if_absent(RefusingCache("fallback-cache"))
        .run()
        .err()
        .unwrap();

    assert!(error.to_string().contains("fallback-cache"));
}

#[test]
fn test_configured_section_uses_default_factory() {
    let dir = config_dir(CLOSED_REDIS_YAML);

    let error = application(&dir).run().err().unwrap();

    assert_eq!(error.factory_kind(), Some(FactoryErrorKind::ConnectFailed));
}

#[test]
fn test_shutdown_is_idempotent() {
    let dir = config_dir(MINIMAL_YAML);
    let app = application(&dir).run().unwrap();

    app.shutdown();
    app.shutdown();

    assert!(app.registry().is_shut_down());
    assert!(app.registry().is_empty());
}

#[test]
fn test_second_run_keeps_installed_log_subscriber() {
    let dir = config_dir(MINIMAL_YAML);

    let first = application(&dir).with_logging(true).run().unwrap();
    let second = application(&dir).with_logging(true).run().unwrap();

    assert_eq!(first.config().unwrap().application.name, "orders");
    assert_eq!(second.config().unwrap().application.name, "orders");
}
