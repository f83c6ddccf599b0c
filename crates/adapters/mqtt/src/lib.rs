//! # synhome-adapter-mqtt
//!
//! MQTT adapter: bridges broker-connected devices into synhome.
//!
//! ## Topics
//!
//! Every topic is prefixed with `topic_prefix` (default `synhome/`):
//!
//! | Topic | Direction | Payload |
//! |-------|-----------|---------|
//! | `devices/{device_id}/command` | publish | rendered command template |
//! | `devices/{device_id}/status` | subscribe | JSON status object |
//! | `discovery/request` | publish | `{"adapter_id", "timestamp"}` |
//! | `discovery/response` | subscribe | batch or single device record |
//!
//! ## Dependency rule
//! Depends on `synhome-app` (port traits) and `synhome-domain` only.

mod adapter;
pub mod config;
pub mod error;

pub use adapter::MqttAdapter;
pub use config::MqttConfig;
pub use error::MqttError;
