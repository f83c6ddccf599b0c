//! WebSocket adapter configuration.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use synhome_domain::reconnect::ReconnectConfig;
use synhome_domain::status_map::StatusMap;
use synhome_domain::template::CommandTemplate;

/// How the adapter authenticates against the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsAuth {
    #[default]
    None,
    /// `Authorization: Bearer <token>` on the upgrade request.
    Token { token: String },
    /// Username and password sent in an auth message after connecting.
    Basic { username: String, password: String },
    /// API key sent in an auth message after connecting.
    ApiKey { api_key: String },
}

impl WsAuth {
    /// Value of the `Authorization` header, for token auth.
    #[must_use]
    pub fn bearer_header(&self) -> Option<String> {
        match self {
            Self::Token { token } => Some(format!("Bearer {token}")),
            _ => None,
        }
    }

    /// Message sent right after the handshake; the server must answer
    /// `{"success": true}`.
    #[must_use]
    pub fn message(&self) -> Option<Value> {
        match self {
            Self::Basic { username, password } => Some(json!({
                "type": "auth",
                "username": username,
                "password": password,
            })),
            Self::ApiKey { api_key } => Some(json!({
                "type": "auth",
                "api_key": api_key,
            })),
            Self::None | Self::Token { .. } => None,
        }
    }
}

/// Configuration for one WebSocket adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    /// Server URL, `ws://` or `wss://`.
    pub url: String,
    /// Timeout for the handshake, the auth reply and discovery, in seconds.
    pub timeout_secs: u64,
    /// Interval between keep-alive pings, in seconds.
    pub ping_interval_secs: u64,
    pub auth: WsAuth,
    pub command_template: CommandTemplate,
    /// `type` of inbound status messages.
    pub status_message_type: String,
    pub status_map: StatusMap,
    #[serde(flatten)]
    pub reconnect: ReconnectConfig,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080".to_string(),
            timeout_secs: 10,
            ping_interval_secs: 30,
            auth: WsAuth::None,
            command_template: CommandTemplate::default(),
            status_message_type: "status".to_string(),
            status_map: StatusMap::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl WsConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}
