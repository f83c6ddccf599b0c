//! WebSocket protocol adapter built on `tokio-tungstenite`.
//!
//! A connected adapter owns one split WebSocket stream. The write half sits
//! behind an async mutex shared by command sends, discovery requests and the
//! keep-alive task; the read half belongs to the listener task, which routes
//! status and discovery messages and hands over to the shared reconnect loop
//! when the connection drops. After a reconnect, discovery runs again.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use synhome_app::ports::{ProtocolAdapter, StatusCallback};
use synhome_app::reconnect::{ReconnectOutcome, ReconnectState, run_reconnect};
use synhome_domain::discovery::{DeviceDescriptor, DiscoveryChunk};
use synhome_domain::error::SynHomeError;
use synhome_domain::id::AdapterId;
use synhome_domain::operation::Operation;
use synhome_domain::reconnect::ConnectionState;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::config::WsConfig;
use crate::error::WsError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = Arc<AsyncMutex<SplitSink<WsStream, Message>>>;
type WsSource = SplitStream<WsStream>;

const DISCOVERY_RESPONSE: &str = "discovery_response";

/// WebSocket adapter; cheap to clone, clones share the session.
#[derive(Clone)]
pub struct WebSocketAdapter {
    inner: Arc<Inner>,
}

struct Session {
    sink: WsSink,
    listener: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

struct Inner {
    id: AdapterId,
    config: WsConfig,
    state: Mutex<ConnectionState>,
    session: Mutex<Option<Session>>,
    devices: Mutex<BTreeSet<String>>,
    callback: RwLock<Option<StatusCallback>>,
    discovery: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    reconnect: ReconnectState,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WebSocketAdapter {
    #[must_use]
    pub fn new(id: AdapterId, config: WsConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                session: Mutex::new(None),
                devices: Mutex::new(BTreeSet::new()),
                callback: RwLock::new(None),
                discovery: Mutex::new(None),
                reconnect: ReconnectState::default(),
                reconnect_task: Mutex::new(None),
                shutdown: watch::Sender::new(false),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.inner.config
    }

    /// Remote device ids learned through discovery.
    #[must_use]
    pub fn known_devices(&self) -> Vec<String> {
        lock(&self.inner.devices).iter().cloned().collect()
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *lock(&self.state), state);
        if previous != state {
            tracing::debug!(adapter_id = %self.id, from = %previous, to = %state, "connection state changed");
        }
    }

    fn sink(&self) -> Result<WsSink, WsError> {
        if !lock(&self.state).is_connected() {
            return Err(WsError::NotConnected(self.id.to_string()));
        }
        lock(&self.session)
            .as_ref()
            .map(|session| Arc::clone(&session.sink))
            .ok_or_else(|| WsError::NotConnected(self.id.to_string()))
    }

    /// Open the connection, authenticate and start the background tasks.
    async fn establish(self: &Arc<Self>) -> Result<(), WsError> {
        let config = &self.config;
        let mut request = config
            .url
            .as_str()
            .into_client_request()
            .map_err(WsError::connect)?;
        if let Some(bearer) = config.auth.bearer_header() {
            let value = HeaderValue::from_str(&bearer).map_err(|_| WsError::InvalidHeader)?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _) = tokio::time::timeout(config.timeout(), connect_async(request))
            .await
            .map_err(|_| WsError::Timeout)?
            .map_err(WsError::connect)?;
        let (mut sink, mut source) = stream.split();

        if let Some(auth) = config.auth.message() {
            sink.send(Message::Text(auth.to_string()))
                .await
                .map_err(WsError::send)?;
            tokio::time::timeout(config.timeout(), await_auth_reply(&mut source))
                .await
                .map_err(|_| WsError::Timeout)??;
            tracing::debug!(adapter_id = %self.id, "authenticated");
        }

        let sink = Arc::new(AsyncMutex::new(sink));
        {
            // The listener may tear the session down as soon as it runs.
            let mut session = lock(&self.session);
            self.set_state(ConnectionState::Connected);
            let listener = self.spawn_listener(source);
            let keepalive = self.spawn_keepalive(Arc::clone(&sink));
            *session = Some(Session {
                sink,
                listener,
                keepalive,
            });
        }
        tracing::info!(adapter_id = %self.id, url = %config.url, "connected to WebSocket server");
        Ok(())
    }

    /// Drop the current session without a close handshake.
    fn teardown(&self) {
        let session = lock(&self.session).take();
        if let Some(session) = session {
            session.listener.abort();
            session.keepalive.abort();
        }
    }

    fn spawn_listener(self: &Arc<Self>, mut source: WsSource) -> JoinHandle<()> {
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
                    message = source.next() => match message {
                        Some(Ok(Message::Text(text))) => inner.route(&text),
                        Some(Ok(Message::Close(frame))) => {
                            if !*shutdown.borrow() {
                                tracing::warn!(adapter_id = %inner.id, ?frame, "server closed the connection");
                                inner.connection_lost();
                            }
                            return;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            if !*shutdown.borrow() {
                                tracing::warn!(adapter_id = %inner.id, error = %err, "WebSocket connection lost");
                                inner.connection_lost();
                            }
                            return;
                        }
                        None => {
                            if !*shutdown.borrow() {
                                tracing::warn!(adapter_id = %inner.id, "WebSocket stream ended");
                                inner.connection_lost();
                            }
                            return;
                        }
                    },
                }
            }
        })
    }

    fn spawn_keepalive(&self, sink: WsSink) -> JoinHandle<()> {
        let id = self.id.clone();
        let period = self.config.ping_interval();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = sink.lock().await.send(Message::Ping(Vec::new())).await {
                            tracing::debug!(adapter_id = %id, error = %err, "keep-alive ping failed");
                            return;
                        }
                    }
                }
            }
        })
    }

    /// Dispatch one inbound text message by its `type`.
    fn route(&self, text: &str) {
        let message = match serde_json::from_str::<Value>(text) {
            Ok(message) => message,
            Err(err) => {
                let err = WsError::PayloadParse(err);
                tracing::warn!(adapter_id = %self.id, error = %err, "invalid message");
                return;
            }
        };
        let kind = message.get("type").and_then(Value::as_str).unwrap_or_default();

        if kind == self.config.status_message_type {
            self.deliver_status(message);
        } else if kind == DISCOVERY_RESPONSE {
            let delivered = lock(&self.discovery)
                .as_ref()
                .is_some_and(|sender| sender.send(message).is_ok());
            if !delivered {
                tracing::debug!(adapter_id = %self.id, "discovery response outside a discovery window");
            }
        } else {
            tracing::trace!(adapter_id = %self.id, kind, "ignoring message");
        }
    }

    fn deliver_status(&self, mut message: Value) {
        let Some(device_id) = message
            .get("device_id")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            tracing::warn!(adapter_id = %self.id, "status message without device_id");
            return;
        };
        let status = match message.get_mut("status").map(Value::take) {
            Some(Value::Object(status)) => status,
            _ => {
                tracing::warn!(adapter_id = %self.id, device_id, "status message without status object");
                return;
            }
        };
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match callback {
            Some(callback) => callback(&device_id, self.config.status_map.apply(status)),
            None => tracing::debug!(adapter_id = %self.id, device_id, "no status callback registered"),
        }
    }

    /// React to a broken session: reconnect in the background when allowed,
    /// then run discovery again.
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
                        inner.establish().await.map_err(WsError::into_domain)
                    }
                },
            )
            .await;
            inner.reconnect.finish();
            match outcome {
                ReconnectOutcome::Reconnected => match inner.discover().await {
                    Ok(devices) => tracing::info!(
                        adapter_id = %inner.id,
                        count = devices.len(),
                        "rediscovered devices after reconnect"
                    ),
                    Err(err) => tracing::warn!(
                        adapter_id = %inner.id,
                        error = %err,
                        "discovery after reconnect failed"
                    ),
                },
                ReconnectOutcome::Exhausted => {
                    inner.teardown();
                    inner.set_state(ConnectionState::Disconnected);
                }
                ReconnectOutcome::Cancelled => {}
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

    async fn send(self: &Arc<Self>, sink: &WsSink, message: &Value) -> Result<(), WsError> {
        let sent = sink.lock().await.send(Message::Text(message.to_string())).await;
        if let Err(err) = sent {
            tracing::warn!(adapter_id = %self.id, error = %err, "send failed");
            self.connection_lost();
            return Err(WsError::send(err));
        }
        Ok(())
    }

    async fn discover(self: &Arc<Self>) -> Result<Vec<DeviceDescriptor>, WsError> {
        let sink = self.sink()?;
        let (sender, mut responses) = mpsc::unbounded_channel();
        *lock(&self.discovery) = Some(sender);

        let request = json!({"type": "discovery", "adapter_id": self.id});
        if let Err(err) = self.send(&sink, &request).await {
            lock(&self.discovery).take();
            return Err(err);
        }

        let deadline = tokio::time::Instant::now() + self.config.timeout();
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
                    tracing::debug!(adapter_id = %self.id, "discovery window elapsed");
                    break;
                }
            }
        }
        lock(&self.discovery).take();

        lock(&self.devices).extend(devices.iter().map(|d| d.device_id.clone()));
        Ok(devices)
    }
}

async fn await_auth_reply(source: &mut WsSource) -> Result<(), WsError> {
    while let Some(message) = source.next().await {
        match message.map_err(WsError::connect)? {
            Message::Text(text) => {
                let reply: Value = serde_json::from_str(&text).map_err(WsError::PayloadParse)?;
                if reply.get("success").and_then(Value::as_bool) == Some(true) {
                    return Ok(());
                }
                let reason = reply
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("no reason given");
                return Err(WsError::AuthRejected(reason.to_string()));
            }
            Message::Close(_) => return Err(WsError::Closed),
            _ => {}
        }
    }
    Err(WsError::Closed)
}

impl ProtocolAdapter for WebSocketAdapter {
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
                tracing::error!(error = %err, "failed to connect to WebSocket server");
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
            if let Err(err) = session.sink.lock().await.close().await {
                tracing::debug!(error = %err, "WebSocket close failed");
            }
            for (task, handle) in [("listener", session.listener), ("keep-alive", session.keepalive)] {
                match handle.await {
                    Err(err) if !err.is_cancelled() => {
                        tracing::warn!(task, error = %err, "WebSocket task ended abnormally");
                    }
                    _ => {}
                }
            }
        }

        lock(&self.inner.devices).clear();
        lock(&self.inner.discovery).take();
        self.inner.set_state(ConnectionState::Disconnected);
        tracing::info!("disconnected from WebSocket server");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(adapter_id = %self.inner.id))]
    async fn discover_devices(&self) -> Result<Vec<DeviceDescriptor>, SynHomeError> {
        let devices = self.inner.discover().await?;
        tracing::info!(count = devices.len(), "WebSocket discovery finished");
        Ok(devices)
    }

    async fn send_command(&self, device_id: &str, operation: &Operation) -> Result<(), SynHomeError> {
        let sink = self.inner.sink()?;
        let message = self
            .inner
            .config
            .command_template
            .render(device_id, &operation.command, &operation.params);
        tracing::debug!(adapter_id = %self.inner.id, device_id, command = %operation.command, "sending command");
        self.inner.send(&sink, &message).await?;
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

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use synhome_domain::status_map::StatusMap;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    use super::*;
    use crate::config::WsAuth;

    type Received = Arc<Mutex<Vec<(String, Map<String, Value>)>>>;
    type ServerStream = WebSocketStream<TcpStream>;

    fn adapter(config: WsConfig) -> (WebSocketAdapter, Received) {
        let adapter = WebSocketAdapter::new(AdapterId::new("ws"), config);
        let received: Received = Arc::default();
        let sink = Arc::clone(&received);
        adapter.register_status_callback(Arc::new(move |device_id: &str, status| {
            sink.lock().unwrap().push((device_id.to_string(), status));
        }));
        (adapter, received)
    }

    async fn server() -> (TcpListener, WsConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = WsConfig {
            url: format!("ws://{}", listener.local_addr().unwrap()),
            timeout_secs: 2,
            ..WsConfig::default()
        };
        (listener, config)
    }

    async fn accept(listener: &TcpListener) -> ServerStream {
        let (tcp, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(tcp).await.unwrap()
    }

    async fn next_json(ws: &mut ServerStream) -> Value {
        loop {
            if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn reply(ws: &mut ServerStream, message: Value) {
        ws.send(Message::Text(message.to_string())).await.unwrap();
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn should_route_status_messages_through_status_map() {
        let config = WsConfig {
            status_map: StatusMap::new().rename("temp", "temperature"),
            ..WsConfig::default()
        };
        let (adapter, received) = adapter(config);

        adapter.inner.route(
            r#"{"type": "status", "device_id": "ac-01", "status": {"temp": 21, "mode": "heat"}}"#,
        );
        adapter.inner.route(r#"{"type": "status", "status": {"temp": 21}}"#);
        adapter.inner.route(r#"{"type": "pong"}"#);
        adapter.inner.route("not json");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "ac-01");
        assert_eq!(received[0].1["temperature"], 21);
        assert_eq!(received[0].1["mode"], "heat");
    }

    #[tokio::test]
    async fn should_reject_commands_while_disconnected() {
        let (adapter, _) = adapter(WsConfig::default());
        let err = adapter
            .send_command("lamp", &Operation::new("turn_on"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynHomeError::NotConnected(id) if id == "ws"));
    }

    #[tokio::test]
    async fn should_authenticate_discover_and_exchange_messages() {
        let (listener, config) = server().await;
        let config = WsConfig {
            auth: WsAuth::ApiKey {
                api_key: "secret".to_string(),
            },
            ..config
        };
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let auth = next_json(&mut ws).await;
            assert_eq!(auth, json!({"type": "auth", "api_key": "secret"}));
            reply(&mut ws, json!({"success": true})).await;

            let discovery = next_json(&mut ws).await;
            assert_eq!(discovery, json!({"type": "discovery", "adapter_id": "ws"}));
            reply(
                &mut ws,
                json!({"type": "discovery_response", "devices": [{"device_id": "lamp", "type": "light"}], "complete": false}),
            )
            .await;
            reply(
                &mut ws,
                json!({"type": "discovery_response", "devices": [{"device_id": "fan"}], "complete": true}),
            )
            .await;

            let command = next_json(&mut ws).await;
            reply(
                &mut ws,
                json!({"type": "status", "device_id": "lamp", "status": {"power": "on"}}),
            )
            .await;
            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    break;
                }
            }
            command
        });

        let (adapter, received) = adapter(config);
        adapter.connect().await.unwrap();
        assert!(adapter.is_connected());

        let devices = adapter.discover_devices().await.unwrap();
        let ids: Vec<_> = devices.iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["lamp", "fan"]);
        assert_eq!(adapter.known_devices(), vec!["fan", "lamp"]);

        adapter
            .send_command("lamp", &Operation::new("turn_on"))
            .await
            .unwrap();
        eventually(|| !received.lock().unwrap().is_empty()).await;
        assert_eq!(received.lock().unwrap()[0].1["power"], "on");

        adapter.disconnect().await.unwrap();
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
        assert!(adapter.known_devices().is_empty());

        let command = server.await.unwrap();
        assert_eq!(
            command,
            json!({"type": "command", "device_id": "lamp", "command": "turn_on", "params": {}})
        );
    }

    #[tokio::test]
    async fn should_send_bearer_token_on_upgrade() {
        let (listener, config) = server().await;
        let config = WsConfig {
            auth: WsAuth::Token {
                token: "abc".to_string(),
            },
            ..config
        };
        let seen: Arc<Mutex<Option<String>>> = Arc::default();
        let header = Arc::clone(&seen);
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_hdr_async(tcp, move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                *header.lock().unwrap() = request
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                Ok(response)
            })
            .await
            .unwrap();
            while ws.next().await.is_some() {}
        });

        let (adapter, _) = adapter(config);
        adapter.connect().await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer abc"));
        adapter.disconnect().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn should_fail_connect_when_auth_is_rejected() {
        let (listener, config) = server().await;
        let config = WsConfig {
            auth: WsAuth::Basic {
                username: "hub".to_string(),
                password: "wrong".to_string(),
            },
            ..config
        };
        tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            next_json(&mut ws).await;
            reply(&mut ws, json!({"success": false, "message": "bad credentials"})).await;
        });

        let (adapter, _) = adapter(config);
        let err = adapter.connect().await.unwrap_err();
        assert!(err.to_string().contains("transport error"));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn should_reconnect_and_rediscover_after_server_drop() {
        let (listener, config) = server().await;
        let config = WsConfig {
            reconnect: synhome_domain::reconnect::ReconnectConfig {
                auto_reconnect: true,
                reconnect_delay_secs: 0,
                max_reconnect_attempts: 3,
            },
            ..config
        };
        let server = tokio::spawn(async move {
            let first = accept(&listener).await;
            drop(first);

            let mut second = accept(&listener).await;
            let discovery = next_json(&mut second).await;
            reply(
                &mut second,
                json!({"type": "discovery_response", "devices": [{"device_id": "lamp"}], "complete": true}),
            )
            .await;
            while second.next().await.is_some() {}
            discovery
        });

        let (adapter, _) = adapter(config);
        adapter.connect().await.unwrap();
        eventually(|| adapter.known_devices() == vec!["lamp".to_string()]).await;
        assert!(adapter.is_connected());
        assert_eq!(adapter.inner.reconnect.attempts(), 0);

        adapter.disconnect().await.unwrap();
        let discovery = server.await.unwrap();
        assert_eq!(discovery["type"], "discovery");
    }

    #[tokio::test]
    async fn should_give_up_after_reconnect_attempts_are_exhausted() {
        let (listener, config) = server().await;
        let config = WsConfig {
            reconnect: synhome_domain::reconnect::ReconnectConfig {
                auto_reconnect: true,
                reconnect_delay_secs: 0,
                max_reconnect_attempts: 2,
            },
            ..config
        };
        let server = tokio::spawn(async move {
            let ws = accept(&listener).await;
            drop(ws);
            drop(listener);
        });

        let (adapter, _) = adapter(config);
        adapter.connect().await.unwrap();
        server.await.unwrap();

        eventually(|| adapter.state() == ConnectionState::Disconnected).await;
        eventually(|| !adapter.inner.reconnect.is_running()).await;
        assert!(matches!(
            adapter.send_command("lamp", &Operation::new("turn_on")).await,
            Err(SynHomeError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn should_stay_disconnected_after_drop_without_auto_reconnect() {
        let (listener, config) = server().await;
        let config = WsConfig {
            reconnect: synhome_domain::reconnect::ReconnectConfig {
                auto_reconnect: false,
                ..synhome_domain::reconnect::ReconnectConfig::default()
            },
            ..config
        };
        tokio::spawn(async move {
            let ws = accept(&listener).await;
            drop(ws);
        });

        let (adapter, _) = adapter(config);
        adapter.connect().await.unwrap();
        eventually(|| !adapter.is_connected()).await;
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
        assert!(!adapter.inner.reconnect.is_running());
    }
}
