//! Capability: one controllable trait of a device (power, brightness, mode, …).
//!
//! A capability is one of three kinds:
//! - **switch**: a value from an ordered list of states (`on`/`off` by default)
//! - **number**: a value inside a closed `[min, max]` range, optionally with a unit
//! - **enum**: a value from an ordered list of choices
//!
//! The current value always satisfies the kind's constraints. Setting a value
//! first parses and validates it; a rejected value never touches the
//! current one.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Unit markers stripped from textual numbers before parsing (`"30%"`, `"26度"`).
const UNIT_MARKERS: [&str; 7] = ["°C", "°F", "%", "度", "分钟", "小时", "秒"];

fn default_switch_states() -> Vec<String> {
    vec!["on".to_string(), "off".to_string()]
}

/// Kind-specific constraints of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CapabilitySpec {
    Switch {
        #[serde(default = "default_switch_states")]
        states: Vec<String>,
    },
    Number {
        min: f64,
        max: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    Enum {
        values: Vec<String>,
    },
}

impl CapabilitySpec {
    /// Short kind label (`switch`, `number`, `enum`).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Switch { .. } => "switch",
            Self::Number { .. } => "number",
            Self::Enum { .. } => "enum",
        }
    }
}

/// Capability declaration as it appears in device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub name: String,
    #[serde(flatten)]
    pub spec: CapabilitySpec,
}

/// The current value of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Number(f64),
    Text(String),
}

impl CapabilityValue {
    /// The textual value, if this is a switch or enum value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) => None,
        }
    }

    /// The numeric value, if this is a number value.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => value.fmt(f),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Read-only description of a capability: constraints plus current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityInfo {
    pub name: String,
    #[serde(flatten)]
    pub spec: CapabilitySpec,
    pub current: CapabilityValue,
}

/// A named, validated capability with its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    name: String,
    spec: CapabilitySpec,
    value: CapabilityValue,
}

impl Capability {
    /// Build a capability from its declaration, choosing the initial value.
    ///
    /// Switches start `off` when allowed (otherwise their first state),
    /// numbers start at `min`, enums start at their first value.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the name is empty, a switch or enum
    /// has no allowed values, or a number range has `min > max`.
    pub fn from_config(config: CapabilityConfig) -> Result<Self, ValidationError> {
        let CapabilityConfig { name, spec } = config;
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let value = match &spec {
            CapabilitySpec::Switch { states } => {
                let initial = states
                    .iter()
                    .find(|state| state.eq_ignore_ascii_case("off"))
                    .or_else(|| states.first())
                    .ok_or_else(|| ValidationError::EmptyChoices {
                        capability: name.clone(),
                    })?;
                CapabilityValue::Text(initial.clone())
            }
            CapabilitySpec::Number { min, max, .. } => {
                if min > max || !min.is_finite() || !max.is_finite() {
                    return Err(ValidationError::InvalidRange {
                        capability: name,
                        min: *min,
                        max: *max,
                    });
                }
                CapabilityValue::Number(*min)
            }
            CapabilitySpec::Enum { values } => {
                let initial = values.first().ok_or_else(|| ValidationError::EmptyChoices {
                    capability: name.clone(),
                })?;
                CapabilityValue::Text(initial.clone())
            }
        };
        Ok(Self { name, spec, value })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn spec(&self) -> &CapabilitySpec {
        &self.spec
    }

    #[must_use]
    pub fn value(&self) -> &CapabilityValue {
        &self.value
    }

    /// Snapshot of the constraints and current value.
    #[must_use]
    pub fn describe(&self) -> CapabilityInfo {
        CapabilityInfo {
            name: self.name.clone(),
            spec: self.spec.clone(),
            current: self.value.clone(),
        }
    }

    /// Parse and validate a raw value without assigning it.
    ///
    /// Strings are trimmed; numbers additionally lose their unit markers
    /// (`%`, `°C`, `°F`, `度`, `分钟`, `小时`, `秒`) and inner whitespace.
    /// Switch and enum values match case-insensitively and resolve to the
    /// declared spelling.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotANumber`], [`ValidationError::OutOfRange`]
    /// or [`ValidationError::InvalidChoice`] when the value is rejected.
    pub fn parse(&self, raw: &Value) -> Result<CapabilityValue, ValidationError> {
        match &self.spec {
            CapabilitySpec::Number { min, max, .. } => {
                let number = match raw {
                    Value::Number(number) => number.as_f64(),
                    Value::String(text) => strip_units(text).parse::<f64>().ok(),
                    _ => None,
                }
                .filter(|number| number.is_finite())
                .ok_or_else(|| ValidationError::NotANumber {
                    capability: self.name.clone(),
                    value: raw_text(raw),
                })?;
                if number < *min || number > *max {
                    return Err(ValidationError::OutOfRange {
                        capability: self.name.clone(),
                        value: number,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(CapabilityValue::Number(number))
            }
            CapabilitySpec::Switch { states: choices } | CapabilitySpec::Enum { values: choices } => {
                let text = raw_text(raw);
                let wanted = text.trim();
                choices
                    .iter()
                    .find(|choice| choice.eq_ignore_ascii_case(wanted))
                    .map(|choice| CapabilityValue::Text(choice.clone()))
                    .ok_or_else(|| ValidationError::InvalidChoice {
                        capability: self.name.clone(),
                        value: text,
                    })
            }
        }
    }

    /// Assign an already-validated value produced by [`parse`](Self::parse).
    pub(crate) fn assign(&mut self, value: CapabilityValue) {
        self.value = value;
    }

    /// Validate and assign a raw value.
    ///
    /// # Errors
    ///
    /// Returns the validation error from [`parse`](Self::parse); the current
    /// value is left untouched in that case.
    pub fn set(&mut self, raw: &Value) -> Result<&CapabilityValue, ValidationError> {
        let value = self.parse(raw)?;
        self.value = value;
        Ok(&self.value)
    }
}

fn strip_units(text: &str) -> String {
    let mut compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    for unit in UNIT_MARKERS {
        compact = compact.replace(unit, "");
    }
    compact
}

fn raw_text(raw: &Value) -> String {
    match raw {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
