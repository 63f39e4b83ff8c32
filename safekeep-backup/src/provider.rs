//! The boundary to the application's own data.

use anyhow::Context;
use safekeep_storage::KvStore;
use safekeep_types::StateBlob;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads and replaces the application's working state.
///
/// Implemented by the application; the backup engine never interprets the
/// sections it gets back.
pub trait StateProvider: Send + Sync {
    /// The current state. An empty blob means there is nothing to back up.
    fn read_current_state(&self) -> anyhow::Result<StateBlob>;

    /// Replaces the working state with `state`.
    fn apply_state(&self, state: &StateBlob) -> anyhow::Result<()>;
}

/// How a section's value is stored under its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    /// JSON text.
    Json,
    /// A bare string, stored without quoting.
    Raw,
}

#[derive(Clone, Debug)]
struct SectionMapping {
    section: String,
    key: String,
    kind: SectionKind,
}

/// [`StateProvider`] over entries of a [`KvStore`], one key per section.
///
/// Missing keys and values that fail to parse leave their section out.
pub struct KvSectionProvider {
    kv: Arc<dyn KvStore>,
    sections: Vec<SectionMapping>,
}

impl KvSectionProvider {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            sections: Vec::new(),
        }
    }

    /// The client/task workspace layout: `clients`, `tasks` and `settings`
    /// as JSON, plus the `mode` section stored raw under `currentMode`.
    pub fn workspace_layout(kv: Arc<dyn KvStore>) -> Self {
        Self::new(kv)
            .json_section("clients", "clients")
            .json_section("tasks", "tasks")
            .json_section("settings", "settings")
            .raw_section("mode", "currentMode")
    }

    pub fn json_section(mut self, section: impl Into<String>, key: impl Into<String>) -> Self {
        self.sections.push(SectionMapping {
            section: section.into(),
            key: key.into(),
            kind: SectionKind::Json,
        });
        self
    }

    pub fn raw_section(mut self, section: impl Into<String>, key: impl Into<String>) -> Self {
        self.sections.push(SectionMapping {
            section: section.into(),
            key: key.into(),
            kind: SectionKind::Raw,
        });
        self
    }

    fn read_section(&self, mapping: &SectionMapping) -> anyhow::Result<Option<Value>> {
        let Some(raw) = self
            .kv
            .get(&mapping.key)
            .with_context(|| format!("reading {}", mapping.key))?
        else {
            return Ok(None);
        };

        match mapping.kind {
            SectionKind::Raw => Ok(Some(Value::String(raw))),
            SectionKind::Json => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!("ignoring unreadable value under {}: {e}", mapping.key);
                    Ok(None)
                }
            },
        }
    }
}

impl StateProvider for KvSectionProvider {
    fn read_current_state(&self) -> anyhow::Result<StateBlob> {
        let mut state = StateBlob::new();
        for mapping in &self.sections {
            if let Some(value) = self.read_section(mapping)? {
                state.insert(mapping.section.clone(), value);
            }
        }
        Ok(state)
    }

    fn apply_state(&self, state: &StateBlob) -> anyhow::Result<()> {
        for mapping in &self.sections {
            let Some(value) = state.get(&mapping.section) else {
                continue;
            };
            let encoded = match (mapping.kind, value) {
                (SectionKind::Raw, Value::String(s)) => s.clone(),
                _ => serde_json::to_string(value)?,
            };
            self.kv
                .put(&mapping.key, &encoded)
                .with_context(|| format!("writing {}", mapping.key))?;
        }

        for name in state.section_names() {
            if !self.sections.iter().any(|s| s.section == name) {
                debug!("section {name} has no key mapping, not applied");
            }
        }
        Ok(())
    }
}
