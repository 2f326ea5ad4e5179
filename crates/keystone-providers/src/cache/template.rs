//! Recovered access to the cache

use std::sync::Arc;

use keystone_domain::error::Result;
use keystone_infrastructure::di::{RecoveryWrapper, SingletonRegistry};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::redis::CacheClient;

/// JSON cache operations on a client that is validated, and rebuilt if
/// needed, on every call
#[derive(Debug, Clone)]
pub struct CacheTemplate {
    client: RecoveryWrapper<CacheClient>,
}

impl CacheTemplate {
    /// Template over the registry's cache client
    pub fn new(registry: Arc<SingletonRegistry>) -> Self {
        Self {
            client: RecoveryWrapper::managed(registry),
        }
    }

    /// Live client handle
    pub fn client(&self) -> Result<Arc<CacheClient>> {
        self.client.acquire()
    }

    /// Store `value` as JSON, expiring after `ttl_secs` (0 keeps it forever)
    pub fn put<V>(&self, key: &str, value: &V, ttl_secs: u64) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let json = serde_json::to_string(value)?;
        self.client.acquire()?.set(key, &json, ttl_secs)
    }

    /// Raw value stored under `key`
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.client.acquire()?.get(key)
    }

    /// Value stored under `key`, decoded from JSON
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Delete `key`; returns whether it existed
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.client.acquire()?.delete(key)
    }

    /// Evict and close the client; the next call reconnects
    pub fn close(&self) -> Result<()> {
        self.client.release()
    }
}
