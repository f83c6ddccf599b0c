//! Structured results of command dispatch.
//!
//! Every dispatch path ends in a [`DispatchResult`] carrying a success flag
//! and a human-readable message; errors never escape the dispatch boundary.

use serde::Serialize;

use crate::classifier::SubCommand;
use crate::id::DeviceId;

/// Result of a command routed to a single device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub message: String,
}

/// Per-device entry of a batch result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceResult {
    pub device_id: DeviceId,
    pub device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a command routed to several devices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub message: String,
    pub device_count: usize,
    pub success_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_commands: Option<Vec<SubCommand>>,
    pub results: Vec<DeviceResult>,
}

impl BatchOutcome {
    /// Aggregate per-device results; the batch succeeds when any device did.
    #[must_use]
    pub fn from_results(
        message: impl FnOnce(usize, usize) -> String,
        sub_commands: Option<Vec<SubCommand>>,
        results: Vec<DeviceResult>,
    ) -> Self {
        let device_count = results.len();
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            success: success_count > 0,
            message: message(success_count, device_count),
            device_count,
            success_count,
            sub_commands,
            results,
        }
    }
}

/// Outcome of `process_command`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DispatchResult {
    Single(SingleOutcome),
    Batch(BatchOutcome),
}

impl DispatchResult {
    /// A failure not attributable to any device.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Single(SingleOutcome {
            success: false,
            device_id: None,
            device_name: None,
            message: message.into(),
        })
    }

    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::Single(outcome) => outcome.success,
            Self::Batch(outcome) => outcome.success,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Single(outcome) => &outcome.message,
            Self::Batch(outcome) => &outcome.message,
        }
    }
}
