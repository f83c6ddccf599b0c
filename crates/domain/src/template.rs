//! Structured command and topic templates.
//!
//! A [`CommandTemplate`] is a JSON tree whose string leaves may hold the
//! placeholders `{device_id}`, `{command}` and `{params}`. Rendering walks the
//! tree and substitutes values structurally, so parameters keep their JSON
//! types and the message is serialized exactly once by the transport.
//!
//! A [`TopicTemplate`] is a string such as `devices/{device_id}/status`; it
//! renders topics for a device and extracts the device id back from a topic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const DEVICE_ID: &str = "{device_id}";
const COMMAND: &str = "{command}";
const PARAMS: &str = "{params}";

/// JSON message template for outbound commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Value);

impl Default for CommandTemplate {
    fn default() -> Self {
        Self(json!({
            "type": "command",
            "device_id": DEVICE_ID,
            "command": COMMAND,
            "params": PARAMS,
        }))
    }
}

impl CommandTemplate {
    #[must_use]
    pub fn new(template: Value) -> Self {
        Self(template)
    }

    /// Substitute placeholders and return the message tree.
    ///
    /// A leaf equal to a placeholder is replaced by the value itself (so
    /// `{params}` becomes an object); a leaf merely containing `{device_id}`
    /// or `{command}` gets textual substitution.
    #[must_use]
    pub fn render(&self, device_id: &str, command: &str, params: &Map<String, Value>) -> Value {
        substitute(&self.0, device_id, command, params)
    }
}

fn substitute(node: &Value, device_id: &str, command: &str, params: &Map<String, Value>) -> Value {
    match node {
        Value::String(text) => match text.as_str() {
            DEVICE_ID => Value::from(device_id),
            COMMAND => Value::from(command),
            PARAMS => Value::Object(params.clone()),
            _ => Value::from(text.replace(DEVICE_ID, device_id).replace(COMMAND, command)),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute(item, device_id, command, params))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), substitute(value, device_id, command, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Topic pattern containing a single `{device_id}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicTemplate(String);

impl TopicTemplate {
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Topic for one device.
    #[must_use]
    pub fn render(&self, device_id: &str) -> String {
        self.0.replace(DEVICE_ID, device_id)
    }

    /// Topic with the placeholder replaced by a wildcard.
    #[must_use]
    pub fn wildcard(&self, wildcard: &str) -> String {
        self.render(wildcard)
    }

    /// Extract the device id from a concrete topic.
    ///
    /// Returns `None` when the topic does not match the pattern or the
    /// pattern has no placeholder.
    #[must_use]
    pub fn extract<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let (prefix, suffix) = self.0.split_once(DEVICE_ID)?;
        let device_id = topic.strip_prefix(prefix)?.strip_suffix(suffix)?;
        if device_id.is_empty() || device_id.contains('/') {
            return None;
        }
        Some(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Map<String, Value> {
        json!({"brightness": 30, "color": "warm"})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn should_render_default_template_structurally() {
        let message = CommandTemplate::default().render("lamp-1", "set_brightness", &params());
        assert_eq!(
            message,
            json!({
                "type": "command",
                "device_id": "lamp-1",
                "command": "set_brightness",
                "params": {"brightness": 30, "color": "warm"}
            })
        );
    }

    #[test]
    fn should_keep_quotes_in_values_intact() {
        let message = CommandTemplate::default().render("lamp\"1", "say", &Map::new());
        let text = serde_json::to_string(&message).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["device_id"], "lamp\"1");
    }

    #[test]
    fn should_substitute_inside_nested_strings_and_arrays() {
        let template = CommandTemplate::new(json!({
            "action": "call",
            "target": ["dev:{device_id}"],
            "payload": {"op": "{command}", "args": "{params}", "fixed": 1}
        }));
        let message = template.render("ac", "turn_on", &params());
        assert_eq!(message["target"][0], "dev:ac");
        assert_eq!(message["payload"]["op"], "turn_on");
        assert_eq!(message["payload"]["args"]["brightness"], 30);
        assert_eq!(message["payload"]["fixed"], 1);
    }

    #[test]
    fn should_render_and_extract_topics() {
        let template = TopicTemplate::new("synhome/devices/{device_id}/status");
        assert_eq!(template.render("lamp"), "synhome/devices/lamp/status");
        assert_eq!(template.wildcard("+"), "synhome/devices/+/status");
        assert_eq!(template.extract("synhome/devices/lamp/status"), Some("lamp"));
        assert_eq!(template.extract("synhome/devices/lamp/command"), None);
        assert_eq!(template.extract("synhome/devices/a/b/status"), None);
    }
}
