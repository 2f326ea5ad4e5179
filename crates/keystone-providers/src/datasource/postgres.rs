//! PostgreSQL datasource
//!
//! One synchronous `postgres::Client` per registry, guarded by a mutex so
//! the handle can be shared across threads.
//!
//! ## Example
//!
//! ```ignore
//! registry.register(DatasourceFactory);
//! let connection: Arc<DatasourceConnection> = registry.get()?;
//! let count: i64 = connection.with_client(|client| {
//!     client.query_one("SELECT count(*) FROM orders", &[]).map(|row| row.get(0))
//! })?;
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use keystone_domain::error::{Error, Result};
use keystone_domain::key::TypeKey;
use keystone_domain::ports::factory::{ResourceFactory, Resolve};
use keystone_domain::ports::resource::ManagedResource;
use keystone_domain::value_objects::{DatabaseConfig, SystemConfig};
use keystone_infrastructure::error_ext::ErrorContext;
use postgres::error::SqlState;
use postgres::{Client, Config, NoTls};
use tracing::{debug, info, warn};

use crate::constants::LIVENESS_TIMEOUT;

/// Factory connecting to the `database` section's server
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasourceFactory;

impl ResourceFactory for DatasourceFactory {
    type Resource = DatasourceConnection;

    fn name(&self) -> &'static str {
        "datasource"
    }

    fn dependencies(&self) -> Vec<TypeKey> {
        vec![TypeKey::of::<SystemConfig>()]
    }

    fn produce(&self, resolver: &dyn Resolve) -> Result<DatasourceConnection> {
        let config = resolver.get::<SystemConfig>()?;
        DatasourceConnection::connect(config.database()?, resolver.remaining())
    }
}

/// Shared handle on a single PostgreSQL connection
pub struct DatasourceConnection {
    client: Mutex<Option<Client>>,
    target: String,
}

impl DatasourceConnection {
    /// Open a connection, failing if it cannot be established within `timeout`
    pub fn connect(database: &DatabaseConfig, timeout: std::time::Duration) -> Result<Self> {
        let target = format!("{}:{}/{}", database.url, database.port, database.name);
        let mut config = Config::new();
        config
            .host(&database.url)
            .port(database.port)
            .dbname(&database.name)
            .user(&database.username)
            .connect_timeout(timeout);
        if let Some(password) = &database.password {
            config.password(password);
        }

        debug!(target = %target, "Connecting to datasource");
        let client = config.connect(NoTls).map_err(|e| classify(&target, e))?;
        info!(target = %target, "Datasource connected");
        Ok(Self {
            client: Mutex::new(Some(client)),
            target,
        })
    }

    /// `host:port/database` this handle points at
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Run `f` against the underlying client
    ///
    /// Calls from several threads are serialized.
    pub fn with_client<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Client) -> std::result::Result<R, postgres::Error>,
    {
        let mut guard = self.lock();
        let client = guard
            .as_mut()
            .ok_or_else(|| Error::resource(format!("datasource {} is closed", self.target)))?;
        f(client).context(format!("Datasource operation on {} failed", self.target))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ManagedResource for DatasourceConnection {
    fn is_alive(&self) -> Result<bool> {
        let mut guard = self.lock();
        let Some(client) = guard.as_mut() else {
            return Ok(false);
        };
        if client.is_closed() {
            return Ok(false);
        }
        client
            .is_valid(LIVENESS_TIMEOUT)
            .context(format!("Datasource {} failed validity check", self.target))?;
        Ok(true)
    }

    fn close(&self) -> Result<()> {
        let Some(client) = self.lock().take() else {
            return Ok(());
        };
        info!(target = %self.target, "Closing datasource");
        client
            .close()
            .context(format!("Failed to close datasource {}", self.target))
    }
}

impl fmt::Debug for DatasourceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasourceConnection")
            .field("target", &self.target)
            .field("open", &self.lock().is_some())
            .finish()
    }
}

fn classify(target: &str, error: postgres::Error) -> Error {
    let rejected = matches!(
        error.code(),
        Some(code) if *code == SqlState::INVALID_PASSWORD
            || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION
    );
    if rejected {
        warn!(target = %target, "Datasource rejected credentials");
        Error::authentication_with_source(format!("Datasource {target} rejected credentials"), error)
    } else {
        Error::connect_with_source(format!("Cannot connect to datasource {target}"), error)
    }
}
