//! Record of references produced during a run.
//!
//! The registry is informational: it backs the final JSON summary and is never
//! consulted to wire one unit's output into another.

use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

/// Largest integer a JSON consumer can represent exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Unit name to references, in the order units first ran.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<Vec<(String, Value)>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a unit's references. Re-recording a unit keeps its original position.
    pub fn record(&self, name: &str, refs: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = refs,
            None => entries.push((name.to_string(), refs)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, refs)| refs.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Unit names in recording order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the JSON summary, with integers beyond [`MAX_SAFE_INTEGER`] as strings.
    pub fn snapshot(&self) -> Value {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let map: Map<String, Value> = entries
            .iter()
            .map(|(name, refs)| (name.clone(), stringify_wide_integers(refs.clone())))
            .collect();
        Value::Object(map)
    }

    pub fn snapshot_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

fn stringify_wide_integers(value: Value) -> Value {
    match value {
        Value::Number(n) => {
            let wide = match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => i.unsigned_abs() > MAX_SAFE_INTEGER as u64,
                (None, Some(_)) => true,
                (None, None) => false,
            };
            if wide {
                Value::String(n.to_string())
            } else {
                Value::Number(n)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(stringify_wide_integers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, stringify_wide_integers(v)))
                .collect(),
        ),
        other => other,
    }
}
