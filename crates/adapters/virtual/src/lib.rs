//! # synhome-adapter-virtual
//!
//! Virtual protocol adapter: an in-process endpoint holding simulated
//! devices, for testing and demonstration.
//!
//! ## Provided devices (default configuration)
//!
//! | Remote id | Type | Initial status |
//! |-----------|------|----------------|
//! | `virtual_light` | light | `power = off`, `brightness = 100` |
//! | `virtual_thermostat` | thermostat | `power = off`, `temperature = 24`, `mode = auto` |
//! | `virtual_socket` | socket | `power = off` |
//!
//! Commands are queued to a listener task which applies them and pushes the
//! resulting status through the registered callback, like a remote endpoint
//! echoing its state.
//!
//! ## Dependency rule
//!
//! Depends on `synhome-app` (port traits) and `synhome-domain` only.

pub mod config;
mod device;
pub mod error;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use synhome_app::ports::{ProtocolAdapter, StatusCallback};
use synhome_domain::discovery::DeviceDescriptor;
use synhome_domain::error::SynHomeError;
use synhome_domain::id::AdapterId;
use synhome_domain::operation::Operation;
use synhome_domain::reconnect::ConnectionState;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use config::{SimulatedDeviceConfig, VirtualConfig};
pub use error::VirtualError;

use device::SimulatedDevice;

type Command = (String, Operation);

struct Session {
    commands: mpsc::UnboundedSender<Command>,
    listener: JoinHandle<()>,
}

struct Inner {
    id: AdapterId,
    devices: Mutex<BTreeMap<String, SimulatedDevice>>,
    callback: RwLock<Option<StatusCallback>>,
    session: Mutex<Option<Session>>,
    shutdown: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Virtual adapter; cheap to clone, clones share the simulated devices.
#[derive(Clone)]
pub struct VirtualAdapter {
    inner: Arc<Inner>,
}

impl VirtualAdapter {
    #[must_use]
    pub fn new(id: AdapterId, config: &VirtualConfig) -> Self {
        let devices = config
            .devices
            .iter()
            .map(|d| (d.device_id.clone(), SimulatedDevice::from_config(d)))
            .collect();
        Self {
            inner: Arc::new(Inner {
                id,
                devices: Mutex::new(devices),
                callback: RwLock::new(None),
                session: Mutex::new(None),
                shutdown: watch::Sender::new(false),
            }),
        }
    }

    /// Current status of a simulated device.
    #[must_use]
    pub fn status(&self, device_id: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        lock(&self.inner.devices)
            .get(device_id)
            .map(|d| d.status().clone())
    }
}

impl Inner {
    fn spawn_listener(self: &Arc<Self>, mut commands: mpsc::UnboundedReceiver<Command>) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return;
                        }
                    }
                    command = commands.recv() => match command {
                        Some((device_id, operation)) => inner.execute(&device_id, &operation),
                        None => return,
                    },
                }
            }
        })
    }

    fn execute(&self, device_id: &str, operation: &Operation) {
        let status = {
            let mut devices = lock(&self.devices);
            let Some(device) = devices.get_mut(device_id) else {
                return;
            };
            if let Err(err) = device.apply(operation) {
                tracing::warn!(adapter_id = %self.id, device_id, error = %err, "simulated command failed");
                return;
            }
            device.status().clone()
        };
        tracing::debug!(adapter_id = %self.id, device_id, command = %operation.command, "simulated command applied");

        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(device_id, status);
        }
    }
}

impl ProtocolAdapter for VirtualAdapter {
    fn id(&self) -> &AdapterId {
        &self.inner.id
    }

    fn state(&self) -> ConnectionState {
        if lock(&self.inner.session).is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn connect(&self) -> Result<(), SynHomeError> {
        let mut session = lock(&self.inner.session);
        if session.is_some() {
            return Ok(());
        }
        self.inner.shutdown.send_replace(false);
        let (commands, receiver) = mpsc::unbounded_channel();
        let listener = self.inner.spawn_listener(receiver);
        *session = Some(Session { commands, listener });
        tracing::info!(adapter_id = %self.inner.id, "virtual adapter connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SynHomeError> {
        self.inner.shutdown.send_replace(true);
        let session = lock(&self.inner.session).take();
        if let Some(session) = session {
            drop(session.commands);
            if let Err(err) = session.listener.await {
                tracing::warn!(adapter_id = %self.inner.id, error = %err, "virtual listener ended abnormally");
            }
        }
        tracing::info!(adapter_id = %self.inner.id, "virtual adapter disconnected");
        Ok(())
    }

    async fn discover_devices(&self) -> Result<Vec<DeviceDescriptor>, SynHomeError> {
        if !self.is_connected() {
            return Err(VirtualError::NotConnected(self.inner.id.to_string()).into());
        }
        Ok(lock(&self.inner.devices)
            .iter()
            .map(|(device_id, device)| device.descriptor(device_id))
            .collect())
    }

    async fn send_command(&self, device_id: &str, operation: &Operation) -> Result<(), SynHomeError> {
        let commands = lock(&self.inner.session)
            .as_ref()
            .map(|session| session.commands.clone())
            .ok_or_else(|| VirtualError::NotConnected(self.inner.id.to_string()))?;
        if !lock(&self.inner.devices).contains_key(device_id) {
            return Err(VirtualError::UnknownDevice(device_id.to_string()).into());
        }
        SimulatedDevice::accepts(operation)?;
        commands
            .send((device_id.to_string(), operation.clone()))
            .map_err(|_| VirtualError::ListenerStopped)?;
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
