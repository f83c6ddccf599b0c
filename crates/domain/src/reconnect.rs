//! Reconnection policy shared by every protocol adapter.
//!
//! After a transport failure an adapter retries up to
//! `max_reconnect_attempts` times; the wait before attempt `k` (1-based) is
//! `min(reconnect_delay * 2^(k-1), 300 s)`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound of the backoff delay.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);

/// Reconnection settings, embedded in every adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub auto_reconnect: bool,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay_secs: 5,
            max_reconnect_attempts: 10,
        }
    }
}

impl ReconnectConfig {
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Delay before the given attempt (1-based), capped at [`MAX_RECONNECT_DELAY`].
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay()
            .saturating_mul(1_u32 << exponent)
            .min(MAX_RECONNECT_DELAY)
    }

    /// Whether another attempt is allowed after `attempts` failed ones.
    #[must_use]
    pub fn allows(&self, attempts: u32) -> bool {
        self.auto_reconnect && attempts < self.max_reconnect_attempts
    }
}

/// Connection lifecycle of a protocol adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting => f.write_str("reconnecting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_double_delay_per_attempt() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_secs(5));
        assert_eq!(config.delay_for(2), Duration::from_secs(10));
        assert_eq!(config.delay_for(3), Duration::from_secs(20));
        assert_eq!(config.delay_for(6), Duration::from_secs(160));
    }

    #[test]
    fn should_cap_delay_at_five_minutes() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for(7), MAX_RECONNECT_DELAY);
        assert_eq!(config.delay_for(40), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn should_stop_allowing_attempts_at_limit() {
        let config = ReconnectConfig {
            max_reconnect_attempts: 2,
            ..ReconnectConfig::default()
        };
        assert!(config.allows(0));
        assert!(config.allows(1));
        assert!(!config.allows(2));
    }

    #[test]
    fn should_never_allow_attempts_when_auto_reconnect_is_off() {
        let config = ReconnectConfig {
            auto_reconnect: false,
            ..ReconnectConfig::default()
        };
        assert!(!config.allows(0));
    }

    #[test]
    fn should_fill_missing_fields_with_defaults() {
        let config: ReconnectConfig = serde_json::from_str(r#"{"reconnect_delay_secs": 1}"#).unwrap();
        assert_eq!(config.reconnect_delay_secs, 1);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert!(config.auto_reconnect);
    }
}
