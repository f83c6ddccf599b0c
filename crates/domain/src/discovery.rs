//! Discovery records reported by protocol adapters.
//!
//! A remote endpoint answers a discovery request with either a batch
//! (`{"devices": [...], "complete": true}`) or one record per message
//! (`{"device_id": "...", "type": "..."}`). Batches may span several
//! messages; `complete` marks the last one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A remote device reported during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(alias = "id")]
    pub device_id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceDescriptor {
    /// Parse a discovery record; records without a device id are ignored.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value::<Self>(value)
            .ok()
            .filter(|descriptor| !descriptor.device_id.trim().is_empty())
    }
}

/// One discovery message, parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryChunk {
    pub devices: Vec<DeviceDescriptor>,
    /// Whether the remote side marked this message as the last one.
    pub complete: bool,
}

impl DiscoveryChunk {
    /// Parse a discovery message; unknown shapes yield an empty chunk.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Self::default();
        };
        let complete = object.get("complete").and_then(Value::as_bool) == Some(true);
        match object.remove("devices") {
            Some(Value::Array(records)) => Self {
                devices: records
                    .into_iter()
                    .filter_map(DeviceDescriptor::from_value)
                    .collect(),
                complete,
            },
            _ => Self {
                devices: DeviceDescriptor::from_value(Value::Object(object))
                    .into_iter()
                    .collect(),
                complete,
            },
        }
    }
}
