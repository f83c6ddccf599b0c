//! Virtual adapter configuration.

use serde::Deserialize;
use serde_json::{Map, Value, json};

/// One simulated remote device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatedDeviceConfig {
    pub device_id: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Initial status reported by the device.
    #[serde(default)]
    pub status: Map<String, Value>,
}

/// Configuration for one virtual adapter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    pub devices: Vec<SimulatedDeviceConfig>,
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            devices: vec![
                simulated("virtual_light", "light", "Virtual Light", json!({"power": "off", "brightness": 100})),
                simulated(
                    "virtual_thermostat",
                    "thermostat",
                    "Virtual Thermostat",
                    json!({"power": "off", "temperature": 24, "mode": "auto"}),
                ),
                simulated("virtual_socket", "socket", "Virtual Socket", json!({"power": "off"})),
            ],
        }
    }
}

fn simulated(device_id: &str, device_type: &str, name: &str, status: Value) -> SimulatedDeviceConfig {
    SimulatedDeviceConfig {
        device_id: device_id.to_string(),
        device_type: device_type.to_string(),
        name: Some(name.to_string()),
        status: match status {
            Value::Object(status) => status,
            _ => Map::new(),
        },
    }
}
