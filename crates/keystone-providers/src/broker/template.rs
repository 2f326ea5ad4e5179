//! Recovered access to the broker

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use keystone_domain::error::Result;
use keystone_infrastructure::di::{RecoveryWrapper, SingletonRegistry};
use rumqttc::QoS;

use super::mqtt::BrokerClient;
use super::subscriptions::{MessageHandler, SubscriptionId, Subscriptions};

/// Publish/subscribe operations on a broker client that is validated, and
/// rebuilt if needed, on every call
///
/// The template owns the handler table. Whenever recovery hands out a
/// different client, the table is attached to it and every filter is
/// subscribed again, so handlers outlive the client they were made on.
/// Clones share the table.
#[derive(Debug, Clone)]
pub struct BrokerTemplate {
    client: RecoveryWrapper<BrokerClient>,
    subscriptions: Arc<Subscriptions>,
    bound: Arc<Binding<BrokerClient>>,
}

impl BrokerTemplate {
    /// Template over the registry's broker client
    pub fn new(registry: Arc<SingletonRegistry>) -> Self {
        Self {
            client: RecoveryWrapper::managed(registry),
            subscriptions: Arc::new(Subscriptions::new()),
            bound: Arc::new(Binding::new()),
        }
    }

    /// Live client handle
    pub fn client(&self) -> Result<Arc<BrokerClient>> {
        let client = self.client.acquire()?;
        self.bound
            .bind(&client, |client| client.attach(&self.subscriptions).map(drop))?;
        Ok(client)
    }

    /// Publish raw bytes
    pub fn publish(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
        qos: QoS,
        retained: bool,
    ) -> Result<()> {
        self.client()?.publish(topic, payload, qos, retained)
    }

    /// Publish UTF-8 text at least once, not retained
    pub fn publish_str(&self, topic: &str, payload: &str) -> Result<()> {
        self.publish(topic, payload.as_bytes().to_vec(), DEFAULT_PUBLISH_QOS, false)
    }

    /// Register `handler` for messages matching `filter`
    pub fn subscribe<H>(&self, filter: &str, qos: QoS, handler: H) -> Result<SubscriptionId>
    where
        H: MessageHandler + 'static,
    {
        self.client()?.subscribe(filter, qos, handler)
    }

    /// Remove one handler, or every handler of `filter`
    pub fn unsubscribe(&self, filter: &str, id: Option<SubscriptionId>) -> Result<usize> {
        self.client()?.unsubscribe(filter, id)
    }

    /// Handlers registered through this template
    pub fn subscription_count(&self) -> Result<usize> {
        Ok(self.client()?.subscription_count())
    }

    /// Client identifier of the live client
    pub fn client_id(&self) -> Result<String> {
        Ok(self.client()?.client_id().to_string())
    }

    /// Whether the live client is connected
    pub fn is_connected(&self) -> Result<bool> {
        Ok(self.client()?.is_connected())
    }

    /// Evict and disconnect the client; the next call reconnects and
    /// restores the subscriptions
    pub fn close(&self) -> Result<()> {
        self.client.release()
    }
}

/// QoS of [`BrokerTemplate::publish_str`]
pub const DEFAULT_PUBLISH_QOS: QoS = QoS::AtLeastOnce;

/// Remembers the instance a shared table was last attached to
struct Binding<T> {
    last: Mutex<Weak<T>>,
}

impl<T> Binding<T> {
    fn new() -> Self {
        Self {
            last: Mutex::new(Weak::new()),
        }
    }

    /// Run `attach` unless `current` is the instance bound last
    ///
    /// Returns whether `attach` ran. A failed attach leaves the binding
    /// unchanged so the next call tries again.
    fn bind<F>(&self, current: &Arc<T>, attach: F) -> Result<bool>
    where
        F: FnOnce(&T) -> Result<()>,
    {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last
            .upgrade()
            .is_some_and(|previous| Arc::ptr_eq(&previous, current))
        {
            return Ok(false);
        }
        attach(current)?;
        *last = Arc::downgrade(current);
        Ok(true)
    }
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .strong_count()
            > 0;
        f.debug_struct("Binding").field("bound", &bound).finish()
    }
}
