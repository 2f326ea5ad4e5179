//! Topic subscriptions and message dispatch

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use keystone_domain::error::{Error, Result};
use rumqttc::QoS;
use tracing::trace;

/// Callback receiving messages for a subscribed topic filter
pub trait MessageHandler: Send + Sync {
    /// Handle one message published on `topic`
    fn on_message(&self, topic: &str, payload: &[u8]);
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &[u8]) + Send + Sync,
{
    fn on_message(&self, topic: &str, payload: &[u8]) {
        self(topic, payload);
    }
}

/// Identifier of one handler registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscription {
    qos: QoS,
    handlers: Vec<(SubscriptionId, Arc<dyn MessageHandler>)>,
}

/// Handlers per topic filter
///
/// Several handlers may share a filter; the filter stays subscribed at the
/// broker until its last handler is removed.
#[derive(Default)]
pub struct Subscriptions {
    filters: DashMap<String, Subscription>,
    next_id: AtomicU64,
}

/// Outcome of [`Subscriptions::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Handlers removed
    pub removed: usize,
    /// Whether the filter has no handlers left
    pub filter_empty: bool,
}

impl Subscriptions {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `filter`; returns its id and whether the filter is new
    pub fn add(
        &self,
        filter: &str,
        qos: QoS,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(SubscriptionId, bool)> {
        if !rumqttc::valid_filter(filter) {
            return Err(Error::invalid_argument(format!(
                "invalid topic filter `{filter}`"
            )));
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut created = false;
        let mut entry = self.filters.entry(filter.to_string()).or_insert_with(|| {
            created = true;
            Subscription {
                qos,
                handlers: Vec::new(),
            }
        });
        entry.handlers.push((id, handler));
        Ok((id, created))
    }

    /// Remove one handler (`Some(id)`) or every handler of `filter`
    pub fn remove(&self, filter: &str, id: Option<SubscriptionId>) -> Removal {
        let Some(mut entry) = self.filters.get_mut(filter) else {
            return Removal {
                removed: 0,
                filter_empty: true,
            };
        };
        let before = entry.handlers.len();
        match id {
            Some(id) => entry.handlers.retain(|(existing, _)| *existing != id),
            None => entry.handlers.clear(),
        }
        let removed = before - entry.handlers.len();
        let filter_empty = entry.handlers.is_empty();
        drop(entry);
        if filter_empty {
            self.filters.remove_if(filter, |_, sub| sub.handlers.is_empty());
        }
        Removal {
            removed,
            filter_empty,
        }
    }

    /// Subscribed filters with their QoS
    pub fn filters(&self) -> Vec<(String, QoS)> {
        self.filters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().qos))
            .collect()
    }

    /// Request every filter again through `subscribe`
    ///
    /// Stops at the first failure. Returns the number of filters requested.
    pub fn restore<F>(&self, mut subscribe: F) -> Result<usize>
    where
        F: FnMut(&str, QoS) -> Result<()>,
    {
        let filters = self.filters();
        for (filter, qos) in &filters {
            subscribe(filter, *qos)?;
        }
        Ok(filters.len())
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.filters
            .iter()
            .map(|entry| entry.value().handlers.len())
            .sum()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Deliver a message to every handler whose filter matches `topic`
    ///
    /// Returns the number of handlers invoked. Handlers run without any table
    /// lock held and may subscribe or unsubscribe.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .filters
            .iter()
            .filter(|entry| rumqttc::matches(topic, entry.key()))
            .flat_map(|entry| {
                entry
                    .value()
                    .handlers
                    .iter()
                    .map(|(_, handler)| Arc::clone(handler))
                    .collect::<Vec<_>>()
            })
            .collect();
        trace!(topic, handlers = handlers.len(), "Dispatching message");
        for handler in &handlers {
            handler.on_message(topic, payload);
        }
        handlers.len()
    }
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions")
            .field("filters", &self.filters())
            .field("handlers", &self.len())
            .finish()
    }
}
