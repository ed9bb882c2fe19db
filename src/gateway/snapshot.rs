//! Flat per-device data snapshot as returned by a gateway poll.
//!
//! The gateway reports each device as a flat mapping of keys such as
//! `temperature`, `setpoint` or `heating_state` to JSON values. Entities only
//! read from it; the client owns and replaces it on every poll.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Snapshot of one device's current data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceData(Map<String, Value>);

impl DeviceData {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Raw value for a key, including explicit `null`s.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// True if the key exists, even when it holds `null`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// True if the key exists and holds something other than `null`.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// A list of strings, skipping non-string entries.
    pub fn string_list(&self, key: &str) -> Option<Vec<String>> {
        self.0.get(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
    }

    /// Preset table: preset name to its list of target temperatures.
    ///
    /// The first temperature of each entry is the preset's setpoint.
    pub fn presets(&self) -> Option<BTreeMap<String, Vec<f64>>> {
        let table = self.0.get("presets")?.as_object()?;
        Some(
            table
                .iter()
                .map(|(name, temps)| {
                    let temps = match temps {
                        Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
                        Value::Number(n) => n.as_f64().into_iter().collect(),
                        _ => Vec::new(),
                    };
                    (name.clone(), temps)
                })
                .collect(),
        )
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for DeviceData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
