//! Ordered field container backing every protocol entity.
//!
//! The map IS the on-wire form: transformations between message variants are
//! expressed as field additions and deletions on a cloned map, and
//! serialising an entity serialises its map unchanged. Setting a key to JSON
//! null removes it, so "absent" and "null" cannot diverge on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// String-keyed value map, insertion-ordered.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary {
    fields: Map<String, Value>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Adopt an existing map without copying.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Insert a field. A `Value::Null` removes the key instead.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        match value.into() {
            Value::Null => {
                self.fields.remove(&key);
            }
            value => {
                self.fields.insert(key, value);
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Borrowed view of the backing map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Cloned snapshot, safe for the caller to mutate without disturbing
    /// this instance.
    pub fn to_map(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    //
    //  Typed accessors
    //

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_map(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }
}

impl From<Map<String, Value>> for Dictionary {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.fields).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
