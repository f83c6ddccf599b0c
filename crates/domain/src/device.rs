//! Device: a controllable thing exposing a set of named capabilities.
//!
//! A device is created once from configuration and never removed at runtime.
//! Its coarse [`DeviceState`] follows the `power` capability and is set
//! explicitly by actions such as `start` and `stop`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::{Capability, CapabilityConfig, CapabilityInfo, CapabilityValue};
use crate::error::{RoutingError, SynHomeError, ValidationError};
use crate::id::{AdapterId, DeviceId};
use crate::operation::Operation;

/// Name of the switch capability that drives [`DeviceState::On`]/[`DeviceState::Off`].
pub const POWER: &str = "power";

/// Name of the enum capability selected by `start` actions.
pub const PROGRAM: &str = "program";

/// Coarse operational state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceState {
    #[default]
    Idle,
    On,
    Off,
    Running,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("IDLE"),
            Self::On => f.write_str("ON"),
            Self::Off => f.write_str("OFF"),
            Self::Running => f.write_str("RUNNING"),
        }
    }
}

impl FromStr for DeviceState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Ok(Self::Idle),
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            "RUNNING" => Ok(Self::Running),
            _ => Err(ValidationError::InvalidChoice {
                capability: "state".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Where accepted operations of a device are forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CommandSink {
    /// Simulated in process; nothing is forwarded.
    #[default]
    Local,
    /// Forwarded to an HTTP endpoint by an HTTP device driver.
    Http { base_url: String },
    /// Forwarded to the remote device `physical_device_id` through a protocol adapter.
    Adapter {
        adapter_id: AdapterId,
        physical_device_id: String,
    },
}

/// Device declaration as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: DeviceId,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityConfig>,
    #[serde(default)]
    pub sink: CommandSink,
}

/// Context handed to the interpretation service for one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceContext {
    pub id: DeviceId,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub state: DeviceState,
    pub capabilities: Vec<CapabilityInfo>,
}

/// Outcome of applying an inbound status push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusApplication {
    /// Keys that were applied.
    pub applied: Vec<String>,
    /// Keys that were unknown or carried a rejected value.
    pub skipped: Vec<String>,
}

/// A configured device with its capabilities.
#[derive(Debug, Clone)]
pub struct Device {
    id: DeviceId,
    name: String,
    device_type: String,
    state: DeviceState,
    capabilities: Vec<Capability>,
    sink: CommandSink,
}

impl Device {
    /// Build a device from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SynHomeError::Validation`] when the id, name or type is
    /// empty, a capability is declared twice, or a capability declaration is
    /// itself invalid.
    pub fn from_config(config: DeviceConfig) -> Result<Self, SynHomeError> {
        if config.id.is_blank() {
            return Err(ValidationError::EmptyId.into());
        }
        if config.name.trim().is_empty() || config.device_type.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let mut capabilities: Vec<Capability> = Vec::with_capacity(config.capabilities.len());
        for declaration in config.capabilities {
            let capability = Capability::from_config(declaration)?;
            if capabilities.iter().any(|c| c.name() == capability.name()) {
                return Err(ValidationError::DuplicateCapability(capability.name().to_string()).into());
            }
            capabilities.push(capability);
        }
        Ok(Self {
            id: config.id,
            name: config.name,
            device_type: config.device_type,
            state: DeviceState::default(),
            capabilities,
            sink: config.sink,
        })
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
    pub fn state(&self) -> DeviceState {
        self.state
    }

    #[must_use]
    pub fn sink(&self) -> &CommandSink {
        &self.sink
    }

    pub fn set_state(&mut self, state: DeviceState) {
        self.state = state;
    }

    /// Look up a capability by name.
    #[must_use]
    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name() == name)
    }

    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capability(name).is_some()
    }

    /// Capability names in declaration order.
    pub fn capability_names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(Capability::name)
    }

    /// Describe every capability in declaration order.
    #[must_use]
    pub fn describe(&self) -> Vec<CapabilityInfo> {
        self.capabilities.iter().map(Capability::describe).collect()
    }

    /// Build the context handed to the interpretation service.
    #[must_use]
    pub fn context(&self) -> DeviceContext {
        DeviceContext {
            id: self.id.clone(),
            name: self.name.clone(),
            device_type: self.device_type.clone(),
            state: self.state,
            capabilities: self.describe(),
        }
    }

    /// Validate and assign a capability value.
    ///
    /// Setting the `power` switch to `on`/`off` also moves the device state
    /// to [`DeviceState::On`]/[`DeviceState::Off`].
    ///
    /// # Errors
    ///
    /// Returns [`SynHomeError::Validation`] when the capability is unknown or
    /// the value is rejected; nothing is mutated in that case.
    pub fn set_capability(&mut self, name: &str, raw: &Value) -> Result<(), SynHomeError> {
        let value = self.parse_capability(name, raw)?;
        self.assign(name, value);
        Ok(())
    }

    /// Apply one interpreted operation.
    ///
    /// Supported shapes:
    /// - `on`, `off`, `turn_on`, `turn_off`, `power_on`, `power_off`
    /// - `set_<capability>` (powers the device on first)
    /// - `start`, `start_cooking` with an optional `program` parameter
    /// - `stop`, `stop_cooking`, `cancel`
    ///
    /// # Errors
    ///
    /// Returns [`SynHomeError::Routing`] for commands that map to nothing and
    /// [`SynHomeError::Validation`] for rejected values.
    pub fn apply(&mut self, operation: &Operation) -> Result<(), SynHomeError> {
        let command = operation.command.trim().to_ascii_lowercase();
        match command.as_str() {
            "on" | "turn_on" | "power_on" => self.set_capability(POWER, &Value::from("on")),
            "off" | "turn_off" | "power_off" => self.set_capability(POWER, &Value::from("off")),
            "start" | "start_cooking" => self.start(&operation.params),
            "stop" | "stop_cooking" | "cancel" => self.stop(),
            other => match other.strip_prefix("set_") {
                Some(target) if !target.is_empty() => self.apply_set(&command, target, &operation.params),
                _ => Err(RoutingError::Unsupported {
                    command: command.clone(),
                }
                .into()),
            },
        }
    }

    /// Apply a status push coming from a remote device.
    ///
    /// Each key is applied independently: known capabilities are validated
    /// and set, a `state` key holding a device state name sets the state,
    /// anything else is reported as skipped.
    pub fn apply_status(&mut self, status: &Map<String, Value>) -> StatusApplication {
        let mut report = StatusApplication::default();
        for (key, raw) in status {
            let applied = if self.has_capability(key) {
                self.set_capability(key, raw).is_ok()
            } else if key == "state" {
                match raw.as_str().map(str::parse::<DeviceState>) {
                    Some(Ok(state)) => {
                        self.state = state;
                        true
                    }
                    _ => false,
                }
            } else {
                false
            };
            if applied {
                report.applied.push(key.clone());
            } else {
                report.skipped.push(key.clone());
            }
        }
        report
    }

    fn parse_capability(&self, name: &str, raw: &Value) -> Result<CapabilityValue, SynHomeError> {
        let capability = self
            .capability(name)
            .ok_or_else(|| ValidationError::UnknownCapability(name.to_string()))?;
        Ok(capability.parse(raw)?)
    }

    fn assign(&mut self, name: &str, value: CapabilityValue) {
        if name == POWER {
            match value.as_text() {
                Some(text) if text.eq_ignore_ascii_case("on") => self.state = DeviceState::On,
                Some(text) if text.eq_ignore_ascii_case("off") => self.state = DeviceState::Off,
                _ => {}
            }
        }
        if let Some(capability) = self.capabilities.iter_mut().find(|c| c.name() == name) {
            capability.assign(value);
        }
    }

    fn power_on_if_needed(&mut self) -> Result<(), SynHomeError> {
        let is_off = self.capability(POWER).is_some_and(|power| {
            !power
                .value()
                .as_text()
                .is_some_and(|text| text.eq_ignore_ascii_case("on"))
        });
        if is_off {
            self.set_capability(POWER, &Value::from("on"))?;
        }
        Ok(())
    }

    fn apply_set(
        &mut self,
        command: &str,
        target: &str,
        params: &Map<String, Value>,
    ) -> Result<(), SynHomeError> {
        let updates: Vec<(String, CapabilityValue)> = if let Some(raw) = params.get(target) {
            vec![(target.to_string(), self.parse_capability(target, raw)?)]
        } else if let (true, Some(raw)) = (self.has_capability(target), single_value(params)) {
            vec![(target.to_string(), self.parse_capability(target, raw)?)]
        } else {
            let mut updates = Vec::new();
            for (key, raw) in params {
                if self.has_capability(key) {
                    updates.push((key.clone(), self.parse_capability(key, raw)?));
                }
            }
            updates
        };
        if updates.is_empty() {
            return Err(RoutingError::NoMatchingParameter {
                command: command.to_string(),
            }
            .into());
        }
        if updates.iter().any(|(name, _)| name != POWER) {
            self.power_on_if_needed()?;
        }
        for (name, value) in updates {
            self.assign(&name, value);
        }
        Ok(())
    }

    fn start(&mut self, params: &Map<String, Value>) -> Result<(), SynHomeError> {
        let program = match params.get(PROGRAM) {
            Some(raw) if self.has_capability(PROGRAM) => Some(self.parse_capability(PROGRAM, raw)?),
            _ => None,
        };
        self.power_on_if_needed()?;
        if let Some(program) = program {
            self.assign(PROGRAM, program);
        }
        self.state = DeviceState::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SynHomeError> {
        if self.has_capability(POWER) {
            self.set_capability(POWER, &Value::from("off"))?;
        }
        self.state = DeviceState::Off;
        Ok(())
    }
}

fn single_value(params: &Map<String, Value>) -> Option<&Value> {
    if params.len() == 1 {
        params.values().next()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn light() -> Device {
        let config: DeviceConfig = serde_json::from_value(json!({
            "id": "living_room_light",
            "name": "客厅灯",
            "type": "light",
            "capabilities": [
                {"name": "power", "type": "switch"},
                {"name": "brightness", "type": "number", "min": 0, "max": 100, "unit": "%"},
                {"name": "color", "type": "enum", "values": ["white", "warm", "blue"]}
            ]
        }))
        .unwrap();
        Device::from_config(config).unwrap()
    }

    fn rice_cooker() -> Device {
        let config: DeviceConfig = serde_json::from_value(json!({
            "id": "kitchen_cooker",
            "name": "电饭煲",
            "type": "rice_cooker",
            "capabilities": [
                {"name": "power", "type": "switch"},
                {"name": "program", "type": "enum", "values": ["rice", "porridge", "soup"]}
            ]
        }))
        .unwrap();
        Device::from_config(config).unwrap()
    }

    fn op(value: Value) -> Operation {
        serde_json::from_value(value).unwrap()
    }

    fn number(device: &Device, name: &str) -> Option<f64> {
        device.capability(name).and_then(|c| c.value().as_number())
    }

    fn text<'a>(device: &'a Device, name: &str) -> Option<&'a str> {
        device.capability(name).and_then(|c| c.value().as_text())
    }

    #[test]
    fn should_start_idle_with_local_sink() {
        let device = light();
        assert_eq!(device.state(), DeviceState::Idle);
        assert_eq!(device.sink(), &CommandSink::Local);
    }

    #[test]
    fn should_follow_power_capability_in_device_state() {
        let mut device = light();
        device.set_capability(POWER, &json!("on")).unwrap();
        assert_eq!(device.state(), DeviceState::On);
        device.set_capability(POWER, &json!("off")).unwrap();
        assert_eq!(device.state(), DeviceState::Off);
    }

    #[test]
    fn should_reject_unknown_capability() {
        let mut device = light();
        let err = device.set_capability("volume", &json!(3)).unwrap_err();
        assert!(matches!(
            err,
            SynHomeError::Validation(ValidationError::UnknownCapability(name)) if name == "volume"
        ));
    }

    #[test]
    fn should_reject_duplicate_capability_declaration() {
        let config: DeviceConfig = serde_json::from_value(json!({
            "id": "x", "name": "x", "type": "light",
            "capabilities": [
                {"name": "power", "type": "switch"},
                {"name": "power", "type": "switch"}
            ]
        }))
        .unwrap();
        assert!(matches!(
            Device::from_config(config),
            Err(SynHomeError::Validation(ValidationError::DuplicateCapability(_)))
        ));
    }

    #[test]
    fn should_parse_adapter_sink_from_config() {
        let config: DeviceConfig = serde_json::from_value(json!({
            "id": "bedroom_ac", "name": "卧室空调", "type": "thermostat",
            "sink": {"kind": "adapter", "adapter_id": "mqtt_main", "physical_device_id": "ac-01"}
        }))
        .unwrap();
        assert_eq!(
            config.sink,
            CommandSink::Adapter {
                adapter_id: AdapterId::new("mqtt_main"),
                physical_device_id: "ac-01".to_string(),
            }
        );
    }

    #[test]
    fn should_apply_turn_on_and_turn_off() {
        let mut device = light();
        device.apply(&Operation::new("turn_on")).unwrap();
        assert_eq!(text(&device, POWER), Some("on"));
        device.apply(&Operation::new("off")).unwrap();
        assert_eq!(device.state(), DeviceState::Off);
    }

    #[test]
    fn should_power_on_before_setting_capability() {
        let mut device = light();
        device
            .apply(&op(json!({"command": "set_brightness", "params": {"brightness": "30%"}})))
            .unwrap();
        assert_eq!(number(&device, "brightness"), Some(30.0));
        assert_eq!(device.state(), DeviceState::On);
    }

    #[test]
    fn should_track_power_declared_in_upper_case() {
        let config: DeviceConfig = serde_json::from_value(json!({
            "id": "hall_lamp", "name": "走廊灯", "type": "light",
            "capabilities": [
                {"name": "power", "type": "switch", "states": ["ON", "OFF"]},
                {"name": "brightness", "type": "number", "min": 0, "max": 100}
            ]
        }))
        .unwrap();
        let mut device = Device::from_config(config).unwrap();
        assert_eq!(text(&device, POWER), Some("OFF"));

        device
            .apply(&op(json!({"command": "set_brightness", "params": {"brightness": 40}})))
            .unwrap();
        assert_eq!(text(&device, POWER), Some("ON"));
        assert_eq!(device.state(), DeviceState::On);

        device.apply(&Operation::new("turn_off")).unwrap();
        assert_eq!(device.state(), DeviceState::Off);
        device.apply(&Operation::new("turn_on")).unwrap();
        assert_eq!(device.state(), DeviceState::On);
    }

    #[test]
    fn should_use_sole_parameter_when_key_differs() {
        let mut device = light();
        device
            .apply(&op(json!({"command": "set_brightness", "params": {"value": 55}})))
            .unwrap();
        assert_eq!(number(&device, "brightness"), Some(55.0));
    }

    #[test]
    fn should_set_every_matching_parameter_when_target_is_not_a_capability() {
        let mut device = light();
        device
            .apply(&op(json!({
                "command": "set_light",
                "params": {"brightness": 80, "color": "warm", "mood": "cozy"}
            })))
            .unwrap();
        assert_eq!(number(&device, "brightness"), Some(80.0));
        assert_eq!(text(&device, "color"), Some("warm"));
    }

    #[test]
    fn should_fail_set_without_matching_parameter() {
        let mut device = light();
        let err = device
            .apply(&op(json!({"command": "set_volume", "params": {}})))
            .unwrap_err();
        assert!(matches!(
            err,
            SynHomeError::Routing(RoutingError::NoMatchingParameter { .. })
        ));
        assert_eq!(device.state(), DeviceState::Idle);
    }

    #[test]
    fn should_leave_device_untouched_when_set_value_is_rejected() {
        let mut device = light();
        device
            .apply(&op(json!({"command": "set_brightness", "params": {"brightness": 150}})))
            .unwrap_err();
        assert_eq!(number(&device, "brightness"), Some(0.0));
        assert_eq!(text(&device, POWER), Some("off"));
        assert_eq!(device.state(), DeviceState::Idle);
    }

    #[test]
    fn should_start_program_and_mark_running() {
        let mut device = rice_cooker();
        device
            .apply(&op(json!({"command": "start_cooking", "params": {"program": "porridge"}})))
            .unwrap();
        assert_eq!(device.state(), DeviceState::Running);
        assert_eq!(text(&device, POWER), Some("on"));
        assert_eq!(text(&device, PROGRAM), Some("porridge"));
    }

    #[test]
    fn should_power_off_on_cancel() {
        let mut device = rice_cooker();
        device.apply(&Operation::new("start")).unwrap();
        device.apply(&Operation::new("cancel")).unwrap();
        assert_eq!(device.state(), DeviceState::Off);
        assert_eq!(text(&device, POWER), Some("off"));
    }

    #[test]
    fn should_reject_unsupported_command() {
        let mut device = light();
        let err = device.apply(&Operation::new("dance")).unwrap_err();
        assert!(matches!(
            err,
            SynHomeError::Routing(RoutingError::Unsupported { command }) if command == "dance"
        ));
    }

    #[test]
    fn should_apply_status_keys_independently() {
        let mut device = light();
        let status = json!({"brightness": 42, "color": "purple", "state": "on", "rssi": -40});
        let report = device.apply_status(status.as_object().unwrap());
        assert_eq!(number(&device, "brightness"), Some(42.0));
        assert_eq!(text(&device, "color"), Some("white"));
        assert_eq!(device.state(), DeviceState::On);
        assert_eq!(report.applied, vec!["brightness".to_string(), "state".to_string()]);
        assert_eq!(report.skipped, vec!["color".to_string(), "rssi".to_string()]);
    }

    #[test]
    fn should_expose_capabilities_in_context() {
        let context = light().context();
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["type"], "light");
        assert_eq!(json["state"], "IDLE");
        assert_eq!(json["capabilities"][1]["name"], "brightness");
    }
}
