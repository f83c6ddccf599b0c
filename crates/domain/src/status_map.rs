//! Status map: rewrites inbound status keys and values before they reach a device.
//!
//! Each entry maps a remote key either to a new key (rename) or to a value
//! table (`{"values": {"1": "on", "0": "off"}}`). Keys without an entry pass
//! through untouched, as do values missing from a value table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How one remote status key is rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusRule {
    /// Store the value under another key.
    Rename(String),
    /// Translate values; scalar values are matched by their string form.
    Values { values: BTreeMap<String, Value> },
}

/// Per-adapter status rewriting rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMap(BTreeMap<String, StatusRule>);

impl StatusMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.0.insert(from.into(), StatusRule::Rename(to.into()));
        self
    }

    #[must_use]
    pub fn translate<K, V>(mut self, key: impl Into<String>, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.0.insert(key.into(), StatusRule::Values { values });
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rewrite a status payload.
    #[must_use]
    pub fn apply(&self, status: Map<String, Value>) -> Map<String, Value> {
        if self.0.is_empty() {
            return status;
        }
        status
            .into_iter()
            .map(|(key, value)| match self.0.get(&key) {
                Some(StatusRule::Rename(target)) => (target.clone(), value),
                Some(StatusRule::Values { values }) => {
                    let mapped = scalar_key(&value)
                        .and_then(|k| values.get(&k))
                        .cloned()
                        .unwrap_or(value);
                    (key, mapped)
                }
                None => (key, value),
            })
            .collect()
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
