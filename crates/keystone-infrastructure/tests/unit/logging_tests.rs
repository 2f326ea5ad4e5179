//! Logging Tests

use keystone_domain::error::Error;
use keystone_domain::value_objects::LogConfig;
use keystone_infrastructure::logging::{init_logging, parse_log_level};
use tracing::Level;

#[test]
fn test_parse_log_level() {
    assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
    assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
    assert_eq!(parse_log_level("INFO").unwrap(), Level::INFO);
    assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("error").unwrap(), Level::ERROR);

    assert!(parse_log_level("verbose").is_err());
}

#[test]
fn test_init_logging_rejects_unknown_level() {
    let config = LogConfig {
        level: "loud".to_string(),
        ..LogConfig::default()
    };

    assert!(matches!(
        init_logging(&config),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn test_init_logging_keeps_installed_subscriber() {
    let config = LogConfig::default();

    init_logging(&config).unwrap();

    assert!(init_logging(&config).is_ok());
    assert!(tracing::dispatcher::has_been_set());
}
