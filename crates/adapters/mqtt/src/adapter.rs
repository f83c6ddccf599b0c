//! MQTT protocol adapter built on `rumqttc`.
//!
//! A connected adapter owns one broker session: an [`AsyncClient`] used for
//! publishing and subscribing, and a listener task polling the session's
//! [`EventLoop`]. The listener routes status and discovery publishes and,
//! when the event loop fails, hands over to the shared reconnect loop.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter,
};
use serde_json::{Map, Value, json};
use synhome_app::ports::{ProtocolAdapter, StatusCallback};
use synhome_app::reconnect::{ReconnectOutcome, ReconnectState, run_reconnect};
use synhome_domain::discovery::{DeviceDescriptor, DiscoveryChunk};
use synhome_domain::error::SynHomeError;
use synhome_domain::id::AdapterId;
use synhome_domain::operation::Operation;
use synhome_domain::reconnect::ConnectionState;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::MqttConfig;
use crate::error::MqttError;

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 10;

/// MQTT adapter; cheap to clone, clones share the session.
#[derive(Clone)]
pub struct MqttAdapter {
    inner: Arc<Inner>,
}

struct Session {
    client: AsyncClient,
    listener: JoinHandle<()>,
}

struct Inner {
    id: AdapterId,
    config: MqttConfig,
    client_id: String,
    state: Mutex<ConnectionState>,
    session: Mutex<Option<Session>>,
    subscriptions: Mutex<BTreeSet<String>>,
    callback: RwLock<Option<StatusCallback>>,
    discovery: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    reconnect: ReconnectState,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MqttAdapter {
    #[must_use]
    pub fn new(id: AdapterId, config: MqttConfig) -> Self {
        let client_id = config.client_id_for(&id);
        Self {
            inner: Arc::new(Inner {
                id,
                config,
                client_id,
                state: Mutex::new(ConnectionState::Disconnected),
                session: Mutex::new(None),
                subscriptions: Mutex::new(BTreeSet::new()),
                callback: RwLock::new(None),
                discovery: Mutex::new(None),
                reconnect: ReconnectState::default(),
                reconnect_task: Mutex::new(None),
                shutdown: watch::Sender::new(false),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MqttConfig {
        &self.inner.config
    }

    /// Topics currently subscribed on the broker session.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.inner.subscriptions).iter().cloned().collect()
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *lock(&self.state), state);
        if previous != state {
            tracing::debug!(adapter_id = %self.id, from = %previous, to = %state, "connection state changed");
        }
    }

    fn client(&self) -> Result<AsyncClient, MqttError> {
        if !lock(&self.state).is_connected() {
            return Err(MqttError::NotConnected(self.id.to_string()));
        }
        lock(&self.session)
            .as_ref()
            .map(|session| session.client.clone())
            .ok_or_else(|| MqttError::NotConnected(self.id.to_string()))
    }

    /// Open a broker session, restore subscriptions and start the listener.
    async fn establish(self: &Arc<Self>) -> Result<(), MqttError> {
        let config = &self.config;
        let mut options = MqttOptions::new(&self.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(config.keep_alive());
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        tokio::time::timeout(config.connect_timeout(), wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| MqttError::Timeout)??;

        // One request for every tracked topic: the request channel only
        // drains once the listener polls the event loop.
        let filters = {
            let mut subscriptions = lock(&self.subscriptions);
            subscriptions.insert(config.status_wildcard());
            subscriptions.insert(config.discovery_response_topic());
            subscriptions
                .iter()
                .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtLeastOnce))
                .collect::<Vec<_>>()
        };
        let count = filters.len();
        client
            .subscribe_many(filters)
            .await
            .map_err(MqttError::Client)?;
        tracing::debug!(adapter_id = %self.id, count, "subscribed to tracked topics");

        {
            // The listener may tear the session down as soon as it runs.
            let mut session = lock(&self.session);
            self.set_state(ConnectionState::Connected);
            let listener = self.spawn_listener(eventloop);
            *session = Some(Session { client, listener });
        }
        tracing::info!(
            adapter_id = %self.id,
            broker = %format!("{}:{}", config.broker_host, config.broker_port),
            "connected to MQTT broker"
        );
        Ok(())
    }

    /// Drop the current session without a clean DISCONNECT.
    fn teardown(&self) {
        let session = lock(&self.session).take();
        if let Some(session) = session {
            session.listener.abort();
        }
    }

    fn spawn_listener(self: &Arc<Self>, mut eventloop: EventLoop) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!(adapter_id = %inner.id, "listener stopped");
                            return;
                        }
                    }
                    event = eventloop.poll() => match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            inner.route(&publish.topic, &publish.payload);
                        }
                        Ok(_) => {}
                        Err(err) => {
                            if *shutdown.borrow() {
                                return;
                            }
                            tracing::warn!(adapter_id = %inner.id, error = %err, "MQTT connection lost");
                            inner.connection_lost();
                            return;
                        }
                    },
                }
            }
        })
    }

    /// Dispatch one inbound publish to discovery or the status callback.
    fn route(&self, topic: &str, payload: &[u8]) {
        if topic == self.config.discovery_response_topic() {
            match serde_json::from_slice::<Value>(payload) {
                Ok(message) => {
                    let delivered = lock(&self.discovery)
                        .as_ref()
                        .is_some_and(|sender| sender.send(message).is_ok());
                    if !delivered {
                        tracing::debug!(adapter_id = %self.id, "discovery response outside a discovery window");
                    }
                }
                Err(err) => {
                    let err = MqttError::PayloadParse(err);
                    tracing::warn!(adapter_id = %self.id, topic, error = %err, "invalid discovery response");
                }
            }
            return;
        }

        let Some(device_id) = self.config.device_id_from_status_topic(topic) else {
            tracing::trace!(adapter_id = %self.id, topic, "ignoring publish on unknown topic");
            return;
        };
        let status = match serde_json::from_slice::<Map<String, Value>>(payload) {
            Ok(status) => status,
            Err(err) => {
                let err = MqttError::PayloadParse(err);
                tracing::warn!(adapter_id = %self.id, topic, error = %err, "invalid status payload");
                return;
            }
        };
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match callback {
            Some(callback) => callback(device_id, self.config.status_map.apply(status)),
            None => tracing::debug!(adapter_id = %self.id, device_id, "no status callback registered"),
        }
    }

    /// React to a broken session: reconnect in the background when allowed.
    fn connection_lost(self: &Arc<Self>) {
        if !self.config.reconnect.auto_reconnect {
            self.teardown();
            self.set_state(ConnectionState::Disconnected);
            return;
        }
        if !self.reconnect.try_begin() {
            return;
        }
        self.set_state(ConnectionState::Reconnecting);

        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = run_reconnect(
                &inner.id,
                &inner.config.reconnect,
                &inner.reconnect,
                inner.shutdown.subscribe(),
                || {
                    let inner = Arc::clone(&inner);
                    async move {
                        inner.teardown();
                        inner.establish().await.map_err(MqttError::into_domain)
                    }
                },
            )
            .await;
            inner.reconnect.finish();
            if outcome == ReconnectOutcome::Exhausted {
                inner.teardown();
                inner.set_state(ConnectionState::Disconnected);
            }
        });
        *lock(&self.reconnect_task) = Some(task);
    }

    async fn stop_reconnect(&self) {
        let task = lock(&self.reconnect_task).take();
        if let Some(task) = task {
            task.abort();
            match task.await {
                Err(err) if !err.is_cancelled() => {
                    tracing::warn!(adapter_id = %self.id, error = %err, "reconnect task failed");
                }
                _ => {}
            }
        }
        self.reconnect.finish();
    }

    async fn subscribe_device(&self, client: &AsyncClient, device_id: &str) -> Result<(), MqttError> {
        let topic = self.config.status_topic_for(device_id);
        if lock(&self.subscriptions).contains(&topic) {
            return Ok(());
        }
        client
            .subscribe(topic.as_str(), QoS::AtLeastOnce)
            .await
            .map_err(MqttError::Client)?;
        tracing::debug!(adapter_id = %self.id, %topic, "subscribed to device status");
        lock(&self.subscriptions).insert(topic);
        Ok(())
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), MqttError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) =
            eventloop.poll().await.map_err(MqttError::Connection)?
        {
            if ack.code == ConnectReturnCode::Success {
                return Ok(());
            }
            return Err(MqttError::Refused(ack.code));
        }
    }
}

impl ProtocolAdapter for MqttAdapter {
    fn id(&self) -> &AdapterId {
        &self.inner.id
    }

    fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    #[tracing::instrument(skip(self), fields(adapter_id = %self.inner.id))]
    async fn connect(&self) -> Result<(), SynHomeError> {
        if self.is_connected() {
            return Ok(());
        }
        self.inner.stop_reconnect().await;
        self.inner.teardown();
        self.inner.shutdown.send_replace(false);
        self.inner.reconnect.reset();
        self.inner.set_state(ConnectionState::Connecting);

        match self.inner.establish().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.teardown();
                self.inner.set_state(ConnectionState::Disconnected);
                tracing::error!(error = %err, "failed to connect to MQTT broker");
                Err(err.into_domain())
            }
        }
    }

    #[tracing::instrument(skip(self), fields(adapter_id = %self.inner.id))]
    async fn disconnect(&self) -> Result<(), SynHomeError> {
        self.inner.shutdown.send_replace(true);
        self.inner.stop_reconnect().await;

        let session = lock(&self.inner.session).take();
        if let Some(session) = session {
            if let Err(err) = session.client.disconnect().await {
                tracing::debug!(error = %err, "MQTT disconnect request failed");
            }
            match session.listener.await {
                Err(err) if !err.is_cancelled() => {
                    tracing::warn!(error = %err, "MQTT listener ended abnormally");
                }
                _ => {}
            }
        }

        lock(&self.inner.subscriptions).clear();
        lock(&self.inner.discovery).take();
        self.inner.set_state(ConnectionState::Disconnected);
        tracing::info!("disconnected from MQTT broker");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(adapter_id = %self.inner.id))]
    async fn discover_devices(&self) -> Result<Vec<DeviceDescriptor>, SynHomeError> {
        let client = self.inner.client()?;
        let (sender, mut responses) = mpsc::unbounded_channel();
        *lock(&self.inner.discovery) = Some(sender);

        let request = json!({
            "adapter_id": self.inner.id,
            "timestamp": chrono::Utc::now().timestamp(),
        });
        if let Err(err) = client
            .publish(
                self.inner.config.discovery_request_topic(),
                QoS::AtLeastOnce,
                false,
                request.to_string(),
            )
            .await
        {
            lock(&self.inner.discovery).take();
            return Err(MqttError::Client(err).into());
        }

        let deadline = tokio::time::Instant::now() + self.inner.config.discovery_timeout();
        let mut devices: Vec<DeviceDescriptor> = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, responses.recv()).await {
                Ok(Some(message)) => {
                    let chunk = DiscoveryChunk::from_value(message);
                    for descriptor in chunk.devices {
                        if !devices.iter().any(|d| d.device_id == descriptor.device_id) {
                            devices.push(descriptor);
                        }
                    }
                    if chunk.complete {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!("discovery window elapsed");
                    break;
                }
            }
        }
        lock(&self.inner.discovery).take();

        for descriptor in &devices {
            if let Err(err) = self.inner.subscribe_device(&client, &descriptor.device_id).await {
                tracing::warn!(
                    device_id = %descriptor.device_id,
                    error = %err,
                    "failed to subscribe to device status"
                );
            }
        }
        tracing::info!(count = devices.len(), "MQTT discovery finished");
        Ok(devices)
    }

    async fn send_command(&self, device_id: &str, operation: &Operation) -> Result<(), SynHomeError> {
        let client = self.inner.client()?;
        let config = &self.inner.config;
        let topic = config.command_topic_for(device_id);
        let payload = config
            .command_template
            .render(device_id, &operation.command, &operation.params)
            .to_string();

        tracing::debug!(adapter_id = %self.inner.id, %topic, command = %operation.command, "publishing command");
        if let Err(err) = client.publish(topic, QoS::AtLeastOnce, false, payload).await {
            tracing::warn!(adapter_id = %self.inner.id, error = %err, "command publish failed");
            self.inner.connection_lost();
            return Err(MqttError::Client(err).into());
        }
        Ok(())
    }

    fn register_status_callback(&self, callback: StatusCallback) {
        *self
            .inner
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }
}
