//! Simulated remote device: a status object mutated by commands.

use serde_json::{Map, Value};
use synhome_domain::discovery::DeviceDescriptor;
use synhome_domain::operation::Operation;

use crate::config::SimulatedDeviceConfig;
use crate::error::VirtualError;

const POWER: &str = "power";
const STATE: &str = "state";

#[derive(Debug, Clone)]
pub(crate) struct SimulatedDevice {
    device_type: String,
    name: Option<String>,
    status: Map<String, Value>,
}

impl SimulatedDevice {
    pub(crate) fn from_config(config: &SimulatedDeviceConfig) -> Self {
        Self {
            device_type: config.device_type.clone(),
            name: config.name.clone(),
            status: config.status.clone(),
        }
    }

    pub(crate) fn descriptor(&self, device_id: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            device_id: device_id.to_string(),
            device_type: Some(self.device_type.clone()),
            name: self.name.clone(),
            extra: Map::new(),
        }
    }

    pub(crate) fn status(&self) -> &Map<String, Value> {
        &self.status
    }

    /// Check a command without applying it.
    pub(crate) fn accepts(operation: &Operation) -> Result<(), VirtualError> {
        match operation.command.as_str() {
            "on" | "turn_on" | "power_on" | "off" | "turn_off" | "power_off" | "start"
            | "start_cooking" | "stop" | "stop_cooking" | "cancel" => Ok(()),
            command if command.starts_with("set_") && !operation.params.is_empty() => Ok(()),
            command => Err(VirtualError::UnsupportedCommand(command.to_string())),
        }
    }

    /// Apply a command to the simulated status.
    pub(crate) fn apply(&mut self, operation: &Operation) -> Result<(), VirtualError> {
        Self::accepts(operation)?;
        match operation.command.as_str() {
            "on" | "turn_on" | "power_on" => self.set(POWER, "on"),
            "off" | "turn_off" | "power_off" => self.set(POWER, "off"),
            "start" | "start_cooking" => {
                self.merge(&operation.params);
                self.set(POWER, "on");
                self.set(STATE, "RUNNING");
            }
            "stop" | "stop_cooking" | "cancel" => {
                self.set(POWER, "off");
                self.set(STATE, "OFF");
            }
            command => {
                let target = command.trim_start_matches("set_");
                let value = operation.params.get(target).or_else(|| {
                    (operation.params.len() == 1)
                        .then(|| operation.params.values().next())
                        .flatten()
                });
                match value {
                    Some(value) => {
                        self.status.insert(target.to_string(), value.clone());
                    }
                    None => self.merge(&operation.params),
                }
            }
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) {
        self.status.insert(key.to_string(), Value::from(value));
    }

    fn merge(&mut self, params: &Map<String, Value>) {
        for (key, value) in params {
            self.status.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn cooker() -> SimulatedDevice {
        SimulatedDevice::from_config(&SimulatedDeviceConfig {
            device_id: "rc-1".to_string(),
            device_type: "rice_cooker".to_string(),
            name: None,
            status: json!({"power": "off"}).as_object().cloned().unwrap(),
        })
    }

    #[test]
    fn should_power_on_and_off() {
        let mut device = cooker();
        device.apply(&Operation::new("turn_on")).unwrap();
        assert_eq!(device.status()["power"], "on");
        device.apply(&Operation::new("off")).unwrap();
        assert_eq!(device.status()["power"], "off");
    }

    #[test]
    fn should_start_program_and_stop() {
        let mut device = cooker();
        device
            .apply(&Operation::new("start").with_param("program", "porridge"))
            .unwrap();
        assert_eq!(device.status()["power"], "on");
        assert_eq!(device.status()["state"], "RUNNING");
        assert_eq!(device.status()["program"], "porridge");

        device.apply(&Operation::new("cancel")).unwrap();
        assert_eq!(device.status()["state"], "OFF");
        assert_eq!(device.status()["power"], "off");
    }

    #[test]
    fn should_set_named_parameter_or_merge_all() {
        let mut device = cooker();
        device
            .apply(&Operation::new("set_temperature").with_param("temperature", 80))
            .unwrap();
        assert_eq!(device.status()["temperature"], 80);

        device
            .apply(
                &Operation::new("set_timer")
                    .with_param("hours", 1)
                    .with_param("minutes", 30),
            )
            .unwrap();
        assert_eq!(device.status()["hours"], 1);
        assert_eq!(device.status()["minutes"], 30);
        assert!(device.status().get("timer").is_none());
    }

    #[test]
    fn should_store_sole_parameter_under_command_target() {
        let mut device = cooker();
        device
            .apply(&Operation::new("set_mode").with_param("value", "keep_warm"))
            .unwrap();
        assert_eq!(device.status()["mode"], "keep_warm");
        assert!(device.status().get("value").is_none());
    }

    #[test]
    fn should_reject_unknown_commands_and_empty_sets() {
        assert!(matches!(
            SimulatedDevice::accepts(&Operation::new("dance")),
            Err(VirtualError::UnsupportedCommand(c)) if c == "dance"
        ));
        assert!(SimulatedDevice::accepts(&Operation::new("set_brightness")).is_err());
    }
}
