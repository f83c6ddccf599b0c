//! MQTT adapter configuration.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use synhome_domain::id::AdapterId;
use synhome_domain::reconnect::ReconnectConfig;
use synhome_domain::status_map::StatusMap;
use synhome_domain::template::{CommandTemplate, TopicTemplate};

/// Configuration for one MQTT adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier; generated from the adapter id when unset.
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// How long to wait for the broker's CONNACK, in seconds.
    pub connect_timeout_secs: u64,
    /// Prefix prepended to every topic below.
    pub topic_prefix: String,
    pub command_topic: TopicTemplate,
    pub status_topic: TopicTemplate,
    /// Discovery base topic; `/request` and `/response` are appended.
    pub discovery_topic: String,
    /// How long to collect discovery responses, in seconds.
    pub discovery_timeout_secs: u64,
    pub command_template: CommandTemplate,
    pub status_map: StatusMap,
    #[serde(flatten)]
    pub reconnect: ReconnectConfig,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: 60,
            connect_timeout_secs: 10,
            topic_prefix: "synhome/".to_string(),
            command_topic: TopicTemplate::new("devices/{device_id}/command"),
            status_topic: TopicTemplate::new("devices/{device_id}/status"),
            discovery_topic: "discovery".to_string(),
            discovery_timeout_secs: 10,
            command_template: CommandTemplate::new(json!({
                "command": "{command}",
                "params": "{params}",
            })),
            status_map: StatusMap::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl MqttConfig {
    /// Client identifier presented to the broker.
    #[must_use]
    pub fn client_id_for(&self, adapter_id: &AdapterId) -> String {
        self.client_id.clone().unwrap_or_else(|| {
            format!("synhome_mqtt_{adapter_id}_{}", uuid::Uuid::new_v4().simple())
        })
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    #[must_use]
    pub fn command_topic_for(&self, device_id: &str) -> String {
        format!("{}{}", self.topic_prefix, self.command_topic.render(device_id))
    }

    #[must_use]
    pub fn status_topic_for(&self, device_id: &str) -> String {
        format!("{}{}", self.topic_prefix, self.status_topic.render(device_id))
    }

    /// Status topic of every device (`+` in place of the device id).
    #[must_use]
    pub fn status_wildcard(&self) -> String {
        format!("{}{}", self.topic_prefix, self.status_topic.wildcard("+"))
    }

    #[must_use]
    pub fn discovery_request_topic(&self) -> String {
        format!("{}{}/request", self.topic_prefix, self.discovery_topic)
    }

    #[must_use]
    pub fn discovery_response_topic(&self) -> String {
        format!("{}{}/response", self.topic_prefix, self.discovery_topic)
    }

    /// Device id carried by a status topic, if the topic is one.
    #[must_use]
    pub fn device_id_from_status_topic<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let topic = topic.strip_prefix(self.topic_prefix.as_str())?;
        self.status_topic.extract(topic)
    }
}
