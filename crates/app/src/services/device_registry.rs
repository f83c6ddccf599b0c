//! Device registry: the configured devices and their lookups.
//!
//! The registry is built once by the composition root and shared through an
//! `Arc`. Each device sits behind its own mutex so that dispatch and status
//! fan-in serialize per device; the lock is only held for synchronous
//! mutation, never across an `.await`.

use std::sync::{Arc, Mutex, PoisonError};

use synhome_domain::device::{CommandSink, Device, DeviceConfig};
use synhome_domain::error::{SynHomeError, ValidationError};
use synhome_domain::id::{AdapterId, DeviceId};

/// A registered device: immutable identity plus the lockable state.
#[derive(Debug, Clone)]
pub struct RegisteredDevice {
    id: DeviceId,
    name: String,
    device_type: String,
    sink: CommandSink,
    inner: Arc<Mutex<Device>>,
}

impl RegisteredDevice {
    fn new(device: Device) -> Self {
        Self {
            id: device.id().clone(),
            name: device.name().to_string(),
            device_type: device.device_type().to_string(),
            sink: device.sink().clone(),
            inner: Arc::new(Mutex::new(device)),
        }
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    #[must_use]
    pub fn sink(&self) -> &CommandSink {
        &self.sink
    }

    /// Run `f` with exclusive access to the device.
    pub fn with<R>(&self, f: impl FnOnce(&mut Device) -> R) -> R {
        let mut device = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut device)
    }

    /// Copy of the current device state.
    #[must_use]
    pub fn snapshot(&self) -> Device {
        self.with(|device| device.clone())
    }

    fn is_bound_to(&self, adapter_id: &AdapterId, physical_device_id: &str) -> bool {
        matches!(
            &self.sink,
            CommandSink::Adapter { adapter_id: a, physical_device_id: p }
                if a == adapter_id && p == physical_device_id
        )
    }
}

/// All configured devices, in configuration order.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<RegisteredDevice>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from device declarations.
    ///
    /// # Errors
    ///
    /// Returns [`SynHomeError::Validation`] when a declaration is invalid or
    /// two devices share an id.
    pub fn from_configs(configs: impl IntoIterator<Item = DeviceConfig>) -> Result<Self, SynHomeError> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(Device::from_config(config)?)?;
        }
        Ok(registry)
    }

    /// Add a device.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateDevice`] when the id is taken.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id()))]
    pub fn register(&mut self, device: Device) -> Result<(), SynHomeError> {
        if self.get(device.id().as_str()).is_some() {
            return Err(ValidationError::DuplicateDevice(device.id().to_string()).into());
        }
        tracing::debug!(device_type = device.device_type(), "device registered");
        self.devices.push(RegisteredDevice::new(device));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredDevice> {
        self.devices.iter()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RegisteredDevice> {
        self.devices.iter().find(|d| d.id.as_str() == id)
    }

    /// First device of the given type, in configuration order.
    #[must_use]
    pub fn first_of_type(&self, device_type: &str) -> Option<&RegisteredDevice> {
        self.devices.iter().find(|d| d.device_type == device_type)
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&RegisteredDevice> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Device bound to a remote device of an adapter.
    #[must_use]
    pub fn find_by_binding(
        &self,
        adapter_id: &AdapterId,
        physical_device_id: &str,
    ) -> Option<&RegisteredDevice> {
        self.devices
            .iter()
            .find(|d| d.is_bound_to(adapter_id, physical_device_id))
    }

    /// Distinct device types, in order of first appearance.
    #[must_use]
    pub fn device_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for device in &self.devices {
            if !types.contains(&device.device_type) {
                types.push(device.device_type.clone());
            }
        }
        types
    }

    #[must_use]
    pub fn device_names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }
}
