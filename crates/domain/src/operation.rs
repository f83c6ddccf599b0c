//! Operations produced by the interpretation service.
//!
//! Two output contracts are consumed:
//! - per-device interpretations: `{command, params}` or
//!   `{compound: true, operations: [{command, params}, …]}`
//! - standardized operations for multi-device commands:
//!   `{operation, parameters}`
//!
//! Interpretation output is repaired before use: a missing `command` is
//! recovered from a lone parameter or from top-level keys that name known
//! capabilities.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::Device;
use crate::error::RoutingError;

/// Keys that belong to the interpretation envelope rather than to parameters.
const ENVELOPE_KEYS: [&str; 4] = ["command", "params", "compound", "operations"];

/// A single command with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub command: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Operation {
    /// Create an operation without parameters.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Whether this operation switches the device on or off.
    #[must_use]
    pub fn is_power(&self) -> bool {
        matches!(
            self.command.trim().to_ascii_lowercase().as_str(),
            "on" | "off" | "turn_on" | "turn_off" | "power_on" | "power_off"
        )
    }

    /// A `set_<key>` operation carrying a single parameter.
    fn set(key: &str, value: Value) -> Self {
        Self::new(format!("set_{key}")).with_param(key, value)
    }
}

/// A repaired interpretation for one device.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Single(Operation),
    Compound(Vec<Operation>),
}

impl Interpretation {
    /// Parse and repair raw interpretation output.
    ///
    /// `capabilities` are the names the target device knows; they are used
    /// to recover a command from top-level keys.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Malformed`] for non-object output and
    /// [`RoutingError::MissingCommand`] when no command can be recovered.
    pub fn from_value(value: Value, capabilities: &[&str]) -> Result<Self, RoutingError> {
        let Value::Object(object) = value else {
            return Err(RoutingError::Malformed);
        };

        let compound = object.get("compound").and_then(Value::as_bool) == Some(true);
        if let (true, Some(Value::Array(entries))) = (compound, object.get("operations")) {
            let operations: Vec<Operation> = entries.iter().filter_map(repair_entry).collect();
            if operations.is_empty() {
                return Err(RoutingError::MissingCommand);
            }
            return Ok(Self::Compound(operations));
        }

        if let Some(command) = command_of(&object) {
            return Ok(Self::Single(Operation {
                command,
                params: params_of(&object),
            }));
        }

        let params = params_of(&object);
        if let Some((key, value)) = single_entry(&params) {
            return Ok(Self::Single(Operation::set(key, value.clone())));
        }

        let mut recovered: Vec<Operation> = object
            .iter()
            .filter(|(key, _)| !ENVELOPE_KEYS.contains(&key.as_str()))
            .filter(|(key, _)| capabilities.contains(&key.as_str()))
            .map(|(key, value)| Operation::set(key, value.clone()))
            .collect();
        match recovered.len() {
            0 => Err(RoutingError::MissingCommand),
            1 => Ok(Self::Single(recovered.remove(0))),
            _ => Ok(Self::Compound(recovered)),
        }
    }

    /// Flatten into execution order: power operations first, then the rest
    /// in their given order.
    #[must_use]
    pub fn ordered(self) -> Vec<Operation> {
        match self {
            Self::Single(operation) => vec![operation],
            Self::Compound(operations) => {
                let (mut power, rest): (Vec<_>, Vec<_>) =
                    operations.into_iter().partition(Operation::is_power);
                power.extend(rest);
                power
            }
        }
    }
}

fn command_of(object: &Map<String, Value>) -> Option<String> {
    object
        .get("command")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|command| !command.is_empty())
        .map(ToString::to_string)
}

fn params_of(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .get("params")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn single_entry(params: &Map<String, Value>) -> Option<(&String, &Value)> {
    if params.len() == 1 {
        params.iter().next()
    } else {
        None
    }
}

fn repair_entry(entry: &Value) -> Option<Operation> {
    let object = entry.as_object()?;
    let params = params_of(object);
    match command_of(object) {
        Some(command) => Some(Operation { command, params }),
        None => single_entry(&params).map(|(key, value)| Operation::set(key, value.clone())),
    }
}

/// A device-independent operation used for same-type multi-device commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedOperation {
    pub operation: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl StandardizedOperation {
    /// Parse raw standardization output.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Malformed`] when the output does not match the
    /// `{operation, parameters}` shape and [`RoutingError::MissingCommand`]
    /// when the operation is empty.
    pub fn from_value(value: Value) -> Result<Self, RoutingError> {
        let standardized: Self =
            serde_json::from_value(value).map_err(|_| RoutingError::Malformed)?;
        if standardized.operation.trim().is_empty() {
            return Err(RoutingError::MissingCommand);
        }
        Ok(standardized)
    }

    /// Rewrite this operation as an instruction for one concrete device.
    ///
    /// `power_on`/`power_off` become `turn on`/`turn off`; `set_<cap>`
    /// becomes `set <cap> to <value>` when the device has `<cap>` and the
    /// parameter is present. Anything else cannot be adapted.
    #[must_use]
    pub fn adapt_to(&self, device: &Device) -> Option<String> {
        match self.operation.trim() {
            "power_on" => Some("turn on".to_string()),
            "power_off" => Some("turn off".to_string()),
            other => {
                let capability = other.strip_prefix("set_")?;
                if !device.has_capability(capability) {
                    return None;
                }
                let value = match self.parameters.get(capability)? {
                    Value::String(text) => text.clone(),
                    value => value.to_string(),
                };
                Some(format!("set {capability} to {value}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::device::DeviceConfig;

    const LIGHT_CAPS: [&str; 3] = ["power", "brightness", "color"];

    fn thermostat() -> Device {
        let config: DeviceConfig = serde_json::from_value(json!({
            "id": "bedroom_ac", "name": "卧室空调", "type": "thermostat",
            "capabilities": [
                {"name": "power", "type": "switch"},
                {"name": "temperature", "type": "number", "min": 16, "max": 30}
            ]
        }))
        .unwrap();
        Device::from_config(config).unwrap()
    }

    #[test]
    fn should_parse_single_command_with_params() {
        let parsed = Interpretation::from_value(
            json!({"command": "set_brightness", "params": {"brightness": 50}}),
            &LIGHT_CAPS,
        )
        .unwrap();
        assert_eq!(
            parsed,
            Interpretation::Single(Operation::new("set_brightness").with_param("brightness", 50))
        );
    }

    #[test]
    fn should_recover_command_from_lone_parameter() {
        let parsed =
            Interpretation::from_value(json!({"params": {"color": "warm"}}), &LIGHT_CAPS).unwrap();
        assert_eq!(
            parsed,
            Interpretation::Single(Operation::new("set_color").with_param("color", "warm"))
        );
    }

    #[test]
    fn should_recover_compound_from_top_level_capability_keys() {
        let parsed =
            Interpretation::from_value(json!({"brightness": 80, "color": "blue", "mood": 1}), &LIGHT_CAPS)
                .unwrap();
        let Interpretation::Compound(operations) = parsed else {
            panic!("expected compound interpretation");
        };
        let commands: Vec<_> = operations.iter().map(|o| o.command.as_str()).collect();
        assert_eq!(commands, vec!["set_brightness", "set_color"]);
    }

    #[test]
    fn should_fail_when_no_command_can_be_recovered() {
        let result = Interpretation::from_value(json!({"mood": "cozy"}), &LIGHT_CAPS);
        assert_eq!(result, Err(RoutingError::MissingCommand));
        let result = Interpretation::from_value(json!("turn on"), &LIGHT_CAPS);
        assert_eq!(result, Err(RoutingError::Malformed));
    }

    #[test]
    fn should_repair_or_drop_compound_entries() {
        let parsed = Interpretation::from_value(
            json!({
                "compound": true,
                "operations": [
                    {"command": "turn_on"},
                    {"params": {"brightness": 30}},
                    {"params": {}}
                ]
            }),
            &LIGHT_CAPS,
        )
        .unwrap();
        let Interpretation::Compound(operations) = parsed else {
            panic!("expected compound interpretation");
        };
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[1].command, "set_brightness");
    }

    #[test]
    fn should_order_power_operations_first() {
        let ordered = Interpretation::Compound(vec![
            Operation::new("set_brightness").with_param("brightness", 30),
            Operation::new("set_color").with_param("color", "warm"),
            Operation::new("turn_on"),
        ])
        .ordered();
        let commands: Vec<_> = ordered.iter().map(|o| o.command.as_str()).collect();
        assert_eq!(commands, vec!["turn_on", "set_brightness", "set_color"]);
    }

    #[test]
    fn should_adapt_power_operations() {
        let device = thermostat();
        let op = StandardizedOperation::from_value(json!({"operation": "power_off"})).unwrap();
        assert_eq!(op.adapt_to(&device).as_deref(), Some("turn off"));
    }

    #[test]
    fn should_adapt_set_operation_when_device_has_capability() {
        let device = thermostat();
        let op = StandardizedOperation::from_value(
            json!({"operation": "set_temperature", "parameters": {"temperature": 25}}),
        )
        .unwrap();
        assert_eq!(op.adapt_to(&device).as_deref(), Some("set temperature to 25"));
    }

    #[test]
    fn should_not_adapt_set_operation_for_missing_capability_or_parameter() {
        let device = thermostat();
        let op = StandardizedOperation::from_value(
            json!({"operation": "set_brightness", "parameters": {"brightness": 25}}),
        )
        .unwrap();
        assert!(op.adapt_to(&device).is_none());
        let op = StandardizedOperation::from_value(json!({"operation": "set_temperature"})).unwrap();
        assert!(op.adapt_to(&device).is_none());
    }

    #[test]
    fn should_reject_empty_standardized_operation() {
        let result = StandardizedOperation::from_value(json!({"operation": " "}));
        assert_eq!(result, Err(RoutingError::MissingCommand));
    }
}
