//! MQTT broker client
//!
//! Wraps a synchronous `rumqttc` client. The factory waits for the broker's
//! `CONNACK` within the construction deadline, then hands the connection to
//! a [`BackgroundWorker`] that drives the event loop:
//!
//! ```text
//!  BrokerClient::publish/subscribe ──requests──▶ rumqttc::Connection
//!                                                     │ (event loop worker)
//!        Subscriptions::dispatch ◀──Publish───────────┤
//!        connected = true/false  ◀──ConnAck / error───┘
//! ```
//!
//! A dropped connection is retried by the event loop after the configured
//! reconnect delay; filters are subscribed again when the broker did not keep
//! the session. A client rebuilt by the registry starts with an empty handler
//! table until a shared table is [attached](BrokerClient::attach).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use keystone_domain::error::{Error, Result};
use keystone_domain::key::TypeKey;
use keystone_domain::ports::factory::{ResourceFactory, Resolve};
use keystone_domain::ports::resource::ManagedResource;
use keystone_domain::value_objects::{MqttConfig, SystemConfig};
use keystone_infrastructure::constants::WORKER_POLL_INTERVAL;
use keystone_infrastructure::error_ext::ErrorContext;
use keystone_infrastructure::lifecycle::{BackgroundWorker, sleep_unless_cancelled};
use rumqttc::{
    Client, ConnAck, ConnectReturnCode, Connection, ConnectionError, Event, MqttOptions, Packet,
    QoS, RecvTimeoutError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::subscriptions::{MessageHandler, SubscriptionId, Subscriptions};
use crate::constants::{MQTT_REQUEST_CHANNEL_CAPACITY, MQTT_SUPPORTED_PROTOCOLS};

/// Factory connecting to the `mqtt` section's broker
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokerFactory;

impl ResourceFactory for BrokerFactory {
    type Resource = BrokerClient;

    fn name(&self) -> &'static str {
        "broker"
    }

    fn dependencies(&self) -> Vec<TypeKey> {
        vec![TypeKey::of::<SystemConfig>()]
    }

    fn produce(&self, resolver: &dyn Resolve) -> Result<BrokerClient> {
        let config = resolver.get::<SystemConfig>()?;
        let client = BrokerClient::connect(
            config.mqtt()?,
            &config.application.name,
            resolver.deadline(),
        )?;
        let coordinator = resolver.shutdown_coordinator();
        client.worker.stop_on_shutdown(coordinator.as_ref());
        Ok(client)
    }
}

/// State shared between the client handle and its event loop
struct BrokerState {
    client_id: String,
    connected: AtomicBool,
    subscriptions: RwLock<Arc<Subscriptions>>,
}

impl BrokerState {
    fn subscriptions(&self) -> Arc<Subscriptions> {
        Arc::clone(&self.subscriptions.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Connected MQTT client
pub struct BrokerClient {
    client: Client,
    state: Arc<BrokerState>,
    worker: Arc<BackgroundWorker>,
    target: String,
}

impl BrokerClient {
    /// Connect and wait for the broker's acknowledgement until `deadline`
    pub fn connect(mqtt: &MqttConfig, application: &str, deadline: Instant) -> Result<Self> {
        let protocol = mqtt.protocol.to_ascii_lowercase();
        if !MQTT_SUPPORTED_PROTOCOLS.contains(&protocol.as_str()) {
            return Err(Error::unsupported(format!(
                "MQTT transport `{}` is not supported",
                mqtt.protocol
            )));
        }

        let client_id = client_id(application);
        let target = format!("{}://{}:{}", protocol, mqtt.url, mqtt.port);
        let mut options = MqttOptions::new(client_id.clone(), mqtt.url.clone(), mqtt.port);
        options
            .set_keep_alive(Duration::from_secs(mqtt.keep_alive_secs.max(1)))
            .set_clean_session(mqtt.clean_session)
            .set_inflight(mqtt.max_inflight.max(1));
        if let Some(username) = &mqtt.username {
            options.set_credentials(username.clone(), mqtt.password.clone().unwrap_or_default());
        }

        debug!(target = %target, client_id = %client_id, "Connecting to broker");
        let (client, mut connection) = Client::new(options, MQTT_REQUEST_CHANNEL_CAPACITY);
        await_connack(&mut connection, &target, deadline)?;
        info!(target = %target, client_id = %client_id, "Broker connected");

        let state = Arc::new(BrokerState {
            client_id,
            connected: AtomicBool::new(true),
            subscriptions: RwLock::new(Arc::new(Subscriptions::new())),
        });
        let reconnect_delay = Duration::from_secs(mqtt.reconnect_delay_secs);
        let loop_state = Arc::clone(&state);
        let loop_client = client.clone();
        let worker = BackgroundWorker::spawn(
            format!("mqtt-{}", state.client_id),
            CancellationToken::new(),
            move |token| run_event_loop(connection, &loop_client, &loop_state, reconnect_delay, &token),
        )?;

        Ok(Self {
            client,
            state,
            worker: Arc::new(worker),
            target,
        })
    }

    /// Client identifier announced to the broker
    pub fn client_id(&self) -> &str {
        &self.state.client_id
    }

    /// `protocol://host:port` of the broker
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the event loop currently holds an acknowledged connection
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// Queue a message for publication
    pub fn publish(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
        qos: QoS,
        retained: bool,
    ) -> Result<()> {
        if !rumqttc::valid_topic(topic) {
            return Err(Error::invalid_argument(format!("invalid topic `{topic}`")));
        }
        self.client
            .publish(topic, qos, retained, payload)
            .context(format!("Failed to publish to {topic}"))
    }

    /// Register `handler` for messages matching `filter`
    ///
    /// The broker subscription is only requested for the first handler of a
    /// filter.
    pub fn subscribe<H>(&self, filter: &str, qos: QoS, handler: H) -> Result<SubscriptionId>
    where
        H: MessageHandler + 'static,
    {
        let table = self.state.subscriptions();
        let (id, created) = table.add(filter, qos, Arc::new(handler))?;
        if created {
            if let Err(e) = self
                .client
                .subscribe(filter, qos)
                .context(format!("Failed to subscribe to {filter}"))
            {
                table.remove(filter, Some(id));
                return Err(e);
            }
            debug!(filter, ?qos, "Subscribed");
        }
        Ok(id)
    }

    /// Remove one handler, or all handlers of `filter` when `id` is `None`
    ///
    /// Returns the number of handlers removed. The broker subscription is
    /// dropped once no handler is left.
    pub fn unsubscribe(&self, filter: &str, id: Option<SubscriptionId>) -> Result<usize> {
        let removal = self.state.subscriptions().remove(filter, id);
        if removal.removed > 0 && removal.filter_empty {
            self.client
                .unsubscribe(filter)
                .context(format!("Failed to unsubscribe from {filter}"))?;
            debug!(filter, "Unsubscribed");
        }
        Ok(removal.removed)
    }

    /// Number of registered handlers
    pub fn subscription_count(&self) -> usize {
        self.state.subscriptions().len()
    }

    /// Dispatch messages to `table` from now on and subscribe every filter it
    /// holds
    ///
    /// Returns the number of filters requested. Handlers of the table used
    /// before are not carried over.
    pub fn attach(&self, table: &Arc<Subscriptions>) -> Result<usize> {
        *self
            .state
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(table);
        let restored = table.restore(|filter, qos| {
            self.client
                .subscribe(filter, qos)
                .context(format!("Failed to subscribe to {filter}"))
        })?;
        if restored > 0 {
            info!(client_id = %self.client_id(), restored, "Subscriptions restored on client");
        }
        Ok(restored)
    }
}

impl ManagedResource for BrokerClient {
    fn is_alive(&self) -> Result<bool> {
        Ok(self.is_connected() && self.worker.is_running())
    }

    fn close(&self) -> Result<()> {
        info!(target = %self.target, client_id = %self.client_id(), "Closing broker client");
        let disconnected = self.client.disconnect();
        self.worker.stop();
        self.state.connected.store(false, Ordering::SeqCst);
        if let Err(e) = disconnected {
            debug!(error = %e, "Disconnect request not delivered");
        }
        Ok(())
    }
}

impl Drop for BrokerClient {
    fn drop(&mut self) {
        if self.worker.is_running() {
            let _ = self.client.try_disconnect();
        }
    }
}

impl fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerClient")
            .field("target", &self.target)
            .field("client_id", &self.state.client_id)
            .field("connected", &self.is_connected())
            .field("subscriptions", &self.state.subscriptions())
            .finish()
    }
}

fn client_id(application: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    if application.is_empty() {
        suffix
    } else {
        format!("{application}-{suffix}")
    }
}

fn await_connack(connection: &mut Connection, target: &str, deadline: Instant) -> Result<()> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::connect(format!(
                "Timed out waiting for broker {target}"
            )));
        }
        match connection.recv_timeout(remaining) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(ConnAck { code, .. })))) => {
                return match code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(refused(target, code)),
                };
            }
            Ok(Ok(event)) => debug!(?event, "Waiting for broker acknowledgement"),
            Ok(Err(ConnectionError::ConnectionRefused(code))) => return Err(refused(target, code)),
            Ok(Err(e)) => {
                return Err(Error::connect_with_source(
                    format!("Cannot connect to broker {target}"),
                    e,
                ));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::connect(format!(
                    "Broker event loop for {target} closed before connecting"
                )));
            }
        }
    }
}

fn refused(target: &str, code: ConnectReturnCode) -> Error {
    match code {
        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
            Error::authentication(format!("Broker {target} rejected credentials: {code:?}"))
        }
        code => Error::connect(format!("Broker {target} refused connection: {code:?}")),
    }
}

fn run_event_loop(
    mut connection: Connection,
    client: &Client,
    state: &BrokerState,
    reconnect_delay: Duration,
    token: &CancellationToken,
) {
    while !token.is_cancelled() {
        match connection.recv_timeout(WORKER_POLL_INTERVAL) {
            Ok(Ok(event)) => handle_event(event, client, state),
            Ok(Err(e)) => {
                if state.connected.swap(false, Ordering::SeqCst) {
                    warn!(client_id = %state.client_id, error = %e, "Broker connection lost");
                } else {
                    debug!(client_id = %state.client_id, error = %e, "Broker reconnect failed");
                }
                if !sleep_unless_cancelled(token, reconnect_delay) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                state.connected.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
    state.connected.store(false, Ordering::SeqCst);
    debug!(client_id = %state.client_id, "Broker event loop finished");
}

fn handle_event(event: Event, client: &Client, state: &BrokerState) {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => {
            state.connected.store(true, Ordering::SeqCst);
            info!(client_id = %state.client_id, "Broker connection restored");
            if !ack.session_present {
                for (filter, qos) in state.subscriptions().filters() {
                    if let Err(e) = client.try_subscribe(filter.clone(), qos) {
                        warn!(filter = %filter, error = %e, "Failed to restore subscription");
                    }
                }
            }
        }
        Event::Incoming(Packet::Publish(publish)) => {
            state.subscriptions().dispatch(&publish.topic, &publish.payload);
        }
        Event::Incoming(Packet::Disconnect) => {
            state.connected.store(false, Ordering::SeqCst);
        }
        _ => {}
    }
}
