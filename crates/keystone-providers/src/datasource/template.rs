//! Recovered access to the datasource

use std::sync::Arc;

use keystone_domain::error::Result;
use keystone_infrastructure::di::{RecoveryWrapper, SingletonRegistry};
use postgres::Client;

use super::postgres::DatasourceConnection;

/// Runs work against a datasource connection that is validated, and rebuilt
/// if needed, on every call
#[derive(Debug, Clone)]
pub struct DatasourceTemplate {
    connection: RecoveryWrapper<DatasourceConnection>,
}

impl DatasourceTemplate {
    /// Template over the registry's datasource
    pub fn new(registry: Arc<SingletonRegistry>) -> Self {
        Self {
            connection: RecoveryWrapper::managed(registry),
        }
    }

    /// Live connection handle
    pub fn connection(&self) -> Result<Arc<DatasourceConnection>> {
        self.connection.acquire()
    }

    /// Run `f` against a live client
    pub fn with_client<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Client) -> std::result::Result<R, postgres::Error>,
    {
        self.connection.acquire()?.with_client(f)
    }

    /// Evict and close the connection; the next call reconnects
    pub fn close(&self) -> Result<()> {
        self.connection.release()
    }
}
