use crate::RESERVED_KEYS;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Application state as a mapping of named sections to arbitrary JSON values.
///
/// Section contents are never interpreted here; they are stored, transmitted
/// and restored whole.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateBlob(BTreeMap<String, Value>);

impl StateBlob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: BTreeMap<String, Value>) -> Self {
        Self(sections)
    }

    /// Builder-style insert.
    pub fn with_section(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Inserts a section, returning the previous value if one existed.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterates sections in name order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A state with no sections has nothing worth backing up.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first section whose name collides with a metadata key.
    pub fn reserved_section(&self) -> Option<&str> {
        RESERVED_KEYS
            .iter()
            .find(|key| self.0.contains_key(**key))
            .copied()
    }

    pub fn into_sections(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for StateBlob {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for StateBlob {
    fn from(sections: BTreeMap<String, Value>) -> Self {
        Self(sections)
    }
}
