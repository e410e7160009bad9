//! Named saves in a browser-style key-value store.
//!
//! Each save is one key, `<prefix><name>`, holding
//! `{"code": "...", "timestamp": "<RFC 3339>"}`. Saving under an existing
//! name overwrites it. Nothing here propagates failures to the caller:
//! they are logged and reported as `false`, `None` or an empty list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("malformed entry: {0}")]
    Json(#[from] serde_json::Error),
}

/// The subset of `window.localStorage` the editor uses.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-process store, with an optional byte quota over keys plus values.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(bytes),
        }
    }

    fn used_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let needed = self.used_without(key) + key.len() + value.len();
        if self.quota.is_some_and(|quota| needed > quota) {
            return Err(StorageError::QuotaExceeded);
        }
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedSummary {
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Persistence {
    prefix: String,
}

impl Persistence {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    pub fn save(&self, store: &mut dyn KeyValueStore, name: &str, code: &str) -> bool {
        self.save_at(store, name, code, Utc::now())
    }

    pub fn save_at(
        &self,
        store: &mut dyn KeyValueStore,
        name: &str,
        code: &str,
        timestamp: DateTime<Utc>,
    ) -> bool {
        let entry = SavedEntry {
            code: code.to_owned(),
            timestamp,
        };
        let result = serde_json::to_string(&entry)
            .map_err(StorageError::from)
            .and_then(|json| store.set(&self.key(name), &json));
        match result {
            Ok(()) => {
                log::info!("saved flowchart {name:?}");
                true
            }
            Err(e) => {
                log::error!("failed to save {name:?}: {e}");
                false
            }
        }
    }

    /// The saved code, or `None` if absent or unreadable.
    pub fn load(&self, store: &dyn KeyValueStore, name: &str) -> Option<String> {
        let result = store.get(&self.key(name)).and_then(|raw| {
            raw.map(|json| serde_json::from_str::<SavedEntry>(&json))
                .transpose()
                .map_err(StorageError::from)
        });
        match result {
            Ok(entry) => entry.map(|e| e.code),
            Err(e) => {
                log::error!("failed to load {name:?}: {e}");
                None
            }
        }
    }

    /// Every save, newest first. Empty if any entry cannot be read.
    pub fn list(&self, store: &dyn KeyValueStore) -> Vec<SavedSummary> {
        match self.try_list(store) {
            Ok(list) => list,
            Err(e) => {
                log::error!("failed to list saved flowcharts: {e}");
                Vec::new()
            }
        }
    }

    fn try_list(&self, store: &dyn KeyValueStore) -> Result<Vec<SavedSummary>, StorageError> {
        let mut saved = Vec::new();
        for key in store.keys()? {
            let Some(name) = key.strip_prefix(&self.prefix) else {
                continue;
            };
            let Some(json) = store.get(&key)? else {
                continue;
            };
            let entry: SavedEntry = serde_json::from_str(&json)?;
            saved.push(SavedSummary {
                name: name.to_owned(),
                timestamp: entry.timestamp,
            });
        }
        saved.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(saved)
    }
}
