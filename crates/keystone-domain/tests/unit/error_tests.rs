//! Error Tests

use keystone_domain::error::{Error, FactoryErrorKind};

#[test]
fn test_cycle_display_joins_path() {
    let error = Error::cycle(["A", "B", "A"]);

    assert_eq!(error.to_string(), "Dependency cycle detected: A -> B -> A");
}

#[test]
fn test_factory_kinds() {
    assert_eq!(
        Error::config_missing("mqtt").factory_kind(),
        Some(FactoryErrorKind::ConfigMissing)
    );
    assert_eq!(
        Error::connect("refused").factory_kind(),
        Some(FactoryErrorKind::ConnectFailed)
    );
    assert_eq!(
        Error::authentication("bad password").factory_kind(),
        Some(FactoryErrorKind::AuthFailed)
    );
    assert_eq!(
        Error::unsupported("websocket transport").factory_kind(),
        Some(FactoryErrorKind::Unsupported)
    );
    assert_eq!(Error::not_found("Cache").factory_kind(), None);
}

#[test]
fn test_factory_kind_seen_through_wrappers() {
    let construction =
        Error::construction_with_source("BrokerClient", "factory failed", Error::authentication("denied"));
    assert_eq!(construction.factory_kind(), Some(FactoryErrorKind::AuthFailed));

    let recovery = Error::recovery("BrokerClient", 3, Some(construction));
    assert_eq!(recovery.factory_kind(), Some(FactoryErrorKind::AuthFailed));

    assert_eq!(Error::recovery("BrokerClient", 3, None).factory_kind(), None);
}

#[test]
fn test_recovery_display_names_resource_and_attempts() {
    let error = Error::recovery("CacheClient", 3, Some(Error::connect("refused")));

    assert_eq!(error.to_string(), "Cannot recover CacheClient after 3 attempt(s)");
    assert!(std::error::Error::source(&error).is_some());
}

#[test]
fn test_string_conversion_is_internal() {
    let error: Error = "unexpected".into();

    assert!(matches!(error, Error::Internal { .. }));
}
