//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by the contextual variants
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for Keystone
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// I/O operation error (with context)
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// No cached entry exists for the requested resource
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Invalid argument provided to a function
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// A factory failed or a dependency could not be resolved
    #[error("Cannot construct {resource}: {message}")]
    Construction {
        /// Kind being constructed
        resource: String,
        /// What went wrong
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Declared dependencies form a cycle
    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    Cycle {
        /// Kinds along the cycle, first and last entries are the same kind
        path: Vec<String>,
    },

    /// Liveness-triggered rebuild failed
    #[error("Cannot recover {resource} after {attempts} attempt(s)")]
    Recovery {
        /// Kind being recovered
        resource: String,
        /// Number of rebuild attempts made
        attempts: u32,
        /// Last failure observed
        #[source]
        source: Option<BoxedSource>,
    },

    /// Required configuration section or value is absent
    #[error("Configuration missing: {message}")]
    ConfigMissing {
        /// What is missing
        message: String,
    },

    /// Configuration file extension is not supported
    #[error("Unsupported configuration format: {path}")]
    UnsupportedFormat {
        /// Offending file
        path: String,
    },

    /// Configuration-related error (with source)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Establishing a connection to an external service failed
    #[error("Connect error: {message}")]
    Connect {
        /// Description of the connect error
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// The external service rejected the supplied credentials
    #[error("Authentication error: {message}")]
    Authentication {
        /// Description of the authentication error
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Requested option is not supported by the adapter
    #[error("Unsupported: {message}")]
    Unsupported {
        /// Description of the unsupported option
        message: String,
    },

    /// Operation on a live resource failed
    #[error("Resource error: {message}")]
    Resource {
        /// Description of the failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Basic error creation methods
impl Error {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// Registry error creation methods
impl Error {
    /// Create a construction error
    pub fn construction<R: Into<String>, S: Into<String>>(resource: R, message: S) -> Self {
        Self::Construction {
            resource: resource.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a construction error wrapping the factory failure
    pub fn construction_with_source<R, S, E>(resource: R, message: S, source: E) -> Self
    where
        R: Into<String>,
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Construction {
            resource: resource.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cycle error from the offending path
    pub fn cycle<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Cycle {
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a recovery error
    pub fn recovery<R: Into<String>>(resource: R, attempts: u32, source: Option<Error>) -> Self {
        Self::Recovery {
            resource: resource.into(),
            attempts,
            source: source.map(|e| Box::new(e) as BoxedSource),
        }
    }
}

// Configuration error creation methods
impl Error {
    /// Create a missing configuration error
    pub fn config_missing<S: Into<String>>(message: S) -> Self {
        Self::ConfigMissing {
            message: message.into(),
        }
    }

    /// Create an unsupported format error
    pub fn unsupported_format<S: Into<String>>(path: S) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Adapter error creation methods
impl Error {
    /// Create a connect error
    pub fn connect<S: Into<String>>(message: S) -> Self {
        Self::Connect {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connect error with source
    pub fn connect_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Connect {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an authentication error
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// Create an authentication error with source
    pub fn authentication_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Authentication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an unsupported option error
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Create a resource operation error
    pub fn resource<S: Into<String>>(message: S) -> Self {
        Self::Resource {
            message: message.into(),
            source: None,
        }
    }

    /// Create a resource operation error with source
    pub fn resource_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Resource {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl Error {
    /// Classify the error against the factory contract
    ///
    /// Returns `None` for errors that are not produced by factories.
    pub fn factory_kind(&self) -> Option<FactoryErrorKind> {
        match self {
            Self::ConfigMissing { .. } => Some(FactoryErrorKind::ConfigMissing),
            Self::Connect { .. } => Some(FactoryErrorKind::ConnectFailed),
            Self::Authentication { .. } => Some(FactoryErrorKind::AuthFailed),
            Self::Unsupported { .. } | Self::UnsupportedFormat { .. } => {
                Some(FactoryErrorKind::Unsupported)
            }
            Self::Construction {
                source: Some(source),
                ..
            }
            | Self::Recovery {
                source: Some(source),
                ..
            } => source
                .downcast_ref::<Error>()
                .and_then(Error::factory_kind),
            _ => None,
        }
    }
}

/// Failure kinds a resource factory reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryErrorKind {
    /// Required configuration is absent
    ConfigMissing,
    /// The external service could not be reached
    ConnectFailed,
    /// The external service rejected the credentials
    AuthFailed,
    /// The requested option is not supported
    Unsupported,
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::internal(s)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::internal(s)
    }
}
