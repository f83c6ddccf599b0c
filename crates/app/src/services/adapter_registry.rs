//! Adapter registry: adapter lifecycle and status fan-in.
//!
//! Owns every protocol adapter by id. Status pushes from all adapters are
//! funnelled back to the configured device bound to the reporting
//! `(adapter, remote device)` pair; commands for adapter-backed devices are
//! forwarded to the bound adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use synhome_domain::device::CommandSink;
use synhome_domain::discovery::DeviceDescriptor;
use synhome_domain::error::{NotFoundError, SynHomeError};
use synhome_domain::id::AdapterId;
use synhome_domain::operation::Operation;

use crate::ports::{DeviceDriver, ProtocolAdapter, StatusCallback};
use crate::services::device_registry::DeviceRegistry;

/// Registry of protocol adapters of one concrete type.
///
/// Heterogeneous adapters are combined by the composition root into a
/// single enum implementing [`ProtocolAdapter`].
pub struct AdapterRegistry<A> {
    adapters: BTreeMap<AdapterId, A>,
    devices: Arc<DeviceRegistry>,
}

impl<A: ProtocolAdapter> AdapterRegistry<A> {
    /// Create an empty registry delivering status to `devices`.
    pub fn new(devices: Arc<DeviceRegistry>) -> Self {
        Self {
            adapters: BTreeMap::new(),
            devices,
        }
    }

    /// Add an adapter, replacing any previous adapter with the same id.
    pub fn insert(&mut self, adapter: A) {
        let id = adapter.id().clone();
        if self.adapters.insert(id.clone(), adapter).is_some() {
            tracing::warn!(adapter_id = %id, "adapter replaced");
        }
    }

    #[must_use]
    pub fn get(&self, id: &AdapterId) -> Option<&A> {
        self.adapters.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.adapters.values()
    }

    /// Register on every adapter a callback that applies status pushes to
    /// the bound device.
    pub fn bind_status_callbacks(&self) {
        for adapter in self.adapters.values() {
            adapter.register_status_callback(status_fan_in(
                adapter.id().clone(),
                Arc::clone(&self.devices),
            ));
        }
    }

    /// Connect every adapter; one failure never prevents the others.
    pub async fn connect_all(&self) -> Vec<(AdapterId, Result<(), SynHomeError>)> {
        let mut results = Vec::with_capacity(self.adapters.len());
        for (id, adapter) in &self.adapters {
            let result = adapter.connect().await;
            match &result {
                Ok(()) => tracing::info!(adapter_id = %id, "adapter connected"),
                Err(err) => tracing::error!(adapter_id = %id, error = %err, "adapter failed to connect"),
            }
            results.push((id.clone(), result));
        }
        results
    }

    /// Run discovery on every connected adapter.
    ///
    /// Remote devices that no configured device is bound to are logged.
    pub async fn discover_all(&self) -> Vec<(AdapterId, Vec<DeviceDescriptor>)> {
        let mut discovered = Vec::new();
        for (id, adapter) in &self.adapters {
            if !adapter.is_connected() {
                tracing::debug!(adapter_id = %id, "skipping discovery on disconnected adapter");
                continue;
            }
            match adapter.discover_devices().await {
                Ok(descriptors) => {
                    tracing::info!(adapter_id = %id, count = descriptors.len(), "discovery finished");
                    for descriptor in &descriptors {
                        if self.devices.find_by_binding(id, &descriptor.device_id).is_none() {
                            tracing::info!(
                                adapter_id = %id,
                                remote_device_id = %descriptor.device_id,
                                device_type = ?descriptor.device_type,
                                "remote device is not bound to any configured device"
                            );
                        }
                    }
                    discovered.push((id.clone(), descriptors));
                }
                Err(err) => tracing::warn!(adapter_id = %id, error = %err, "discovery failed"),
            }
        }
        discovered
    }

    /// Disconnect every adapter; failures are logged and reported.
    pub async fn disconnect_all(&self) -> Vec<(AdapterId, Result<(), SynHomeError>)> {
        let mut results = Vec::with_capacity(self.adapters.len());
        for (id, adapter) in &self.adapters {
            let result = adapter.disconnect().await;
            if let Err(err) = &result {
                tracing::warn!(adapter_id = %id, error = %err, "adapter disconnect failed");
            }
            results.push((id.clone(), result));
        }
        results
    }
}

fn status_fan_in(adapter_id: AdapterId, devices: Arc<DeviceRegistry>) -> StatusCallback {
    Arc::new(move |remote_device_id: &str, status: Map<String, Value>| {
        let Some(device) = devices.find_by_binding(&adapter_id, remote_device_id) else {
            tracing::debug!(
                adapter_id = %adapter_id,
                remote_device_id,
                "status for unbound remote device dropped"
            );
            return;
        };
        let report = device.with(|d| d.apply_status(&status));
        tracing::debug!(
            adapter_id = %adapter_id,
            device_id = %device.id(),
            applied = ?report.applied,
            skipped = ?report.skipped,
            "status applied"
        );
    })
}

impl<A: ProtocolAdapter> DeviceDriver for AdapterRegistry<A> {
    async fn forward(&self, sink: &CommandSink, operation: &Operation) -> Result<(), SynHomeError> {
        match sink {
            CommandSink::Local => Ok(()),
            CommandSink::Http { base_url } => Err(SynHomeError::transport(format!(
                "HTTP device driver not configured for {base_url}"
            ))),
            CommandSink::Adapter {
                adapter_id,
                physical_device_id,
            } => {
                let adapter = self.adapters.get(adapter_id).ok_or_else(|| NotFoundError {
                    entity: "Adapter",
                    id: adapter_id.to_string(),
                })?;
                adapter.send_command(physical_device_id, operation).await
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;
    use synhome_domain::device::DeviceConfig;
    use synhome_domain::reconnect::ConnectionState;

    use super::*;

    /// In-memory adapter recording commands and exposing its callback.
    pub(crate) struct FakeAdapter {
        id: AdapterId,
        connected: AtomicBool,
        fail_connect: bool,
        pub(crate) sent: Mutex<Vec<(String, Operation)>>,
        callback: Mutex<Option<StatusCallback>>,
        remote: Vec<DeviceDescriptor>,
    }

    impl FakeAdapter {
        pub(crate) fn new(id: &str) -> Self {
            Self {
                id: AdapterId::new(id),
                connected: AtomicBool::new(false),
                fail_connect: false,
                sent: Mutex::new(Vec::new()),
                callback: Mutex::new(None),
                remote: Vec::new(),
            }
        }

        fn failing(id: &str) -> Self {
            Self {
                fail_connect: true,
                ..Self::new(id)
            }
        }

        fn with_remote(mut self, device_id: &str) -> Self {
            self.remote
                .push(DeviceDescriptor::from_value(json!({"device_id": device_id})).unwrap());
            self
        }

        fn push(&self, device_id: &str, status: serde_json::Value) {
            let callback = self.callback.lock().unwrap().clone().unwrap();
            callback(device_id, status.as_object().cloned().unwrap());
        }
    }

    impl ProtocolAdapter for FakeAdapter {
        fn id(&self) -> &AdapterId {
            &self.id
        }

        fn state(&self) -> ConnectionState {
            if self.connected.load(Ordering::SeqCst) {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            }
        }

        async fn connect(&self) -> Result<(), SynHomeError> {
            if self.fail_connect {
                return Err(SynHomeError::transport("connection refused"));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), SynHomeError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn discover_devices(&self) -> Result<Vec<DeviceDescriptor>, SynHomeError> {
            Ok(self.remote.clone())
        }

        async fn send_command(&self, device_id: &str, operation: &Operation) -> Result<(), SynHomeError> {
            if !self.is_connected() {
                return Err(SynHomeError::NotConnected(self.id.to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((device_id.to_string(), operation.clone()));
            Ok(())
        }

        fn register_status_callback(&self, callback: StatusCallback) {
            *self.callback.lock().unwrap() = Some(callback);
        }
    }

    fn devices() -> Arc<DeviceRegistry> {
        let config: DeviceConfig = serde_json::from_value(json!({
            "id": "bedroom_ac", "name": "卧室空调", "type": "thermostat",
            "capabilities": [
                {"name": "power", "type": "switch"},
                {"name": "temperature", "type": "number", "min": 16, "max": 30}
            ],
            "sink": {"kind": "adapter", "adapter_id": "mqtt", "physical_device_id": "ac-01"}
        }))
        .unwrap();
        Arc::new(DeviceRegistry::from_configs([config]).unwrap())
    }

    #[tokio::test]
    async fn should_apply_status_push_to_bound_device() {
        let devices = devices();
        let mut registry = AdapterRegistry::new(Arc::clone(&devices));
        registry.insert(FakeAdapter::new("mqtt"));
        registry.bind_status_callbacks();

        let adapter = registry.get(&AdapterId::new("mqtt")).unwrap();
        adapter.push("ac-01", json!({"temperature": 22, "power": "on"}));
        adapter.push("unknown", json!({"temperature": 25}));

        let device = devices.get("bedroom_ac").unwrap().snapshot();
        assert_eq!(
            device.capability("temperature").unwrap().value().as_number(),
            Some(22.0)
        );
        assert_eq!(device.state().to_string(), "ON");
    }

    #[tokio::test]
    async fn should_forward_adapter_sink_to_bound_adapter() {
        let mut registry = AdapterRegistry::new(devices());
        registry.insert(FakeAdapter::new("mqtt"));
        registry.connect_all().await;

        let sink = CommandSink::Adapter {
            adapter_id: AdapterId::new("mqtt"),
            physical_device_id: "ac-01".to_string(),
        };
        registry.forward(&sink, &Operation::new("turn_on")).await.unwrap();

        let adapter = registry.get(&AdapterId::new("mqtt")).unwrap();
        let sent = adapter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ac-01");
        assert_eq!(sent[0].1.command, "turn_on");
    }

    #[tokio::test]
    async fn should_fail_forward_when_adapter_is_disconnected_or_unknown() {
        let mut registry = AdapterRegistry::new(devices());
        registry.insert(FakeAdapter::new("mqtt"));

        let sink = CommandSink::Adapter {
            adapter_id: AdapterId::new("mqtt"),
            physical_device_id: "ac-01".to_string(),
        };
        let err = registry.forward(&sink, &Operation::new("turn_on")).await.unwrap_err();
        assert!(matches!(err, SynHomeError::NotConnected(_)));

        let sink = CommandSink::Adapter {
            adapter_id: AdapterId::new("zigbee"),
            physical_device_id: "x".to_string(),
        };
        let err = registry.forward(&sink, &Operation::new("turn_on")).await.unwrap_err();
        assert!(matches!(err, SynHomeError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_fail_forward_to_http_sink_without_driver() {
        let registry: AdapterRegistry<FakeAdapter> = AdapterRegistry::new(devices());
        let sink = CommandSink::Http {
            base_url: "http://127.0.0.1:8080".to_string(),
        };
        let err = registry.forward(&sink, &Operation::new("turn_on")).await.unwrap_err();
        assert!(matches!(err, SynHomeError::Transport(_)));
        assert!(registry.forward(&CommandSink::Local, &Operation::new("turn_on")).await.is_ok());
    }

    #[tokio::test]
    async fn should_keep_connecting_remaining_adapters_after_failure() {
        let mut registry = AdapterRegistry::new(devices());
        registry.insert(FakeAdapter::failing("a_broken"));
        registry.insert(FakeAdapter::new("mqtt").with_remote("ac-01").with_remote("fan-9"));

        let results = registry.connect_all().await;
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());

        let discovered = registry.discover_all().await;
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].1.len(), 2);

        registry.disconnect_all().await;
        assert!(registry.iter().all(|a| !a.is_connected()));
    }
}
