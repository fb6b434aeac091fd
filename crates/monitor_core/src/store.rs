use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progress::string_or_number;

/// Saved-record collections exposed by the backend under `/api/<collection>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    Persona,
    Namespace,
    Style,
    Attribute,
    SavedSearch,
    QueueItem,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Persona,
        RecordKind::Namespace,
        RecordKind::Style,
        RecordKind::Attribute,
        RecordKind::SavedSearch,
        RecordKind::QueueItem,
    ];

    pub fn collection(self) -> &'static str {
        match self {
            RecordKind::Persona => "personas",
            RecordKind::Namespace => "namespaces",
            RecordKind::Style => "styles",
            RecordKind::Attribute => "attributes",
            RecordKind::SavedSearch => "saved-searches",
            RecordKind::QueueItem => "queue",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for RecordKind {
    type Err = RecordError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "persona" | "personas" => Ok(RecordKind::Persona),
            "namespace" | "namespaces" => Ok(RecordKind::Namespace),
            "style" | "styles" => Ok(RecordKind::Style),
            "attribute" | "attributes" => Ok(RecordKind::Attribute),
            "saved-search" | "saved-searches" => Ok(RecordKind::SavedSearch),
            "queue" | "queue-item" | "queue-items" => Ok(RecordKind::QueueItem),
            _ => Err(RecordError::UnknownKind(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record name must not be empty")]
    EmptyName,
    #[error("unknown record collection: {0}")]
    UnknownKind(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Fields a user supplies when creating or editing a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordDraft {
    pub name: String,
    pub description: String,
    pub content: serde_json::Value,
    pub tags: Vec<String>,
}

impl RecordDraft {
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.name.trim().is_empty() {
            return Err(RecordError::EmptyName);
        }
        Ok(())
    }
}

/// Client-side cache of saved records, one list per collection.
///
/// Each list reflects the last successful backend response; there is no
/// conflict detection beyond last-write-wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordStore {
    collections: BTreeMap<RecordKind, Vec<SavedRecord>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, kind: RecordKind, records: Vec<SavedRecord>) {
        self.collections.insert(kind, records);
    }

    pub fn upsert(&mut self, kind: RecordKind, record: SavedRecord) {
        let records = self.collections.entry(kind).or_default();
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn remove(&mut self, kind: RecordKind, id: &str) -> bool {
        let Some(records) = self.collections.get_mut(&kind) else {
            return false;
        };
        let before = records.len();
        records.retain(|record| record.id != id);
        records.len() != before
    }

    pub fn list(&self, kind: RecordKind) -> &[SavedRecord] {
        self.collections
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, kind: RecordKind, id: &str) -> Option<&SavedRecord> {
        self.list(kind).iter().find(|record| record.id == id)
    }

    /// Case-insensitive substring match over name, description and tags.
    pub fn search(&self, kind: RecordKind, query: &str) -> Vec<&SavedRecord> {
        let needle = query.trim().to_lowercase();
        self.list(kind)
            .iter()
            .filter(|record| {
                needle.is_empty()
                    || record.name.to_lowercase().contains(&needle)
                    || record.description.to_lowercase().contains(&needle)
                    || record
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&needle))
            })
            .collect()
    }
}
