//! Error Extension Tests

use std::io;

use keystone_domain::error::{Error, FactoryErrorKind, Result};
use keystone_infrastructure::error_ext::ErrorContext;

fn refused() -> std::result::Result<(), io::Error> {
    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
}

#[test]
fn test_io_context() {
    let result: Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "file not found"))
        .io_context("failed to read file");

    match result {
        Err(Error::Io { message, source }) => {
            assert!(message.contains("failed to read file"));
            assert!(message.contains("file not found"));
            assert!(source.is_some());
        }
        other => panic!("Expected Io error, got {other:?}"),
    }
}

#[test]
fn test_connect_context_maps_to_factory_kind() {
    let error = refused().connect_context("redis at cache.local:6379").unwrap_err();

    assert!(matches!(error, Error::Connect { .. }));
    assert_eq!(error.factory_kind(), Some(FactoryErrorKind::ConnectFailed));
}

#[test]
fn test_auth_context_maps_to_factory_kind() {
    let error = refused().auth_context("broker rejected credentials").unwrap_err();

    assert_eq!(error.factory_kind(), Some(FactoryErrorKind::AuthFailed));
}

#[test]
fn test_lazy_context_is_resource_error() {
    let error = refused()
        .with_context(|| format!("ping {}", "cache"))
        .unwrap_err();

    match error {
        Error::Resource { message, .. } => assert_eq!(message, "ping cache: refused"),
        other => panic!("Expected Resource error, got {other:?}"),
    }
}
