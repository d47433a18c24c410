//! JSON persistence for the parameter store.

use super::{Entry, ParamMetadata, ParamValue, Parameters};
use crate::error::{ApiError, StorageError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::Path;

/// Version written into every saved parameter document
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    key: &'a str,
    value: &'a ParamValue,
    author: &'a str,
    timestamp: &'a DateTime<Utc>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    format_version: u32,
    entries: Vec<StoredEntryRef<'a>>,
}

#[derive(Deserialize)]
struct StoredEntry {
    key: String,
    value: ParamValue,
    author: String,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Document {
    format_version: u32,
    entries: Vec<StoredEntry>,
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DocumentRef {
            format_version: FORMAT_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(key, entry)| StoredEntryRef {
                    key,
                    value: &entry.value,
                    author: &entry.metadata.author,
                    timestamp: &entry.metadata.timestamp,
                })
                .collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Parameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = Document::deserialize(deserializer)?;
        if doc.format_version > FORMAT_VERSION {
            return Err(D::Error::custom(format!(
                "unsupported parameter format version {} (newest known is {})",
                doc.format_version, FORMAT_VERSION
            )));
        }
        let mut entries = IndexMap::with_capacity(doc.entries.len());
        for stored in doc.entries {
            if entries.contains_key(&stored.key) {
                return Err(D::Error::custom(format!(
                    "duplicate parameter key '{}'",
                    stored.key
                )));
            }
            entries.insert(
                stored.key,
                Entry {
                    value: stored.value,
                    metadata: ParamMetadata {
                        author: stored.author,
                        timestamp: stored.timestamp,
                    },
                },
            );
        }
        Ok(Parameters {
            entries,
            warn_on_overwrite: false,
        })
    }
}

impl Parameters {
    /// Serialize every entry and its metadata as pretty JSON
    pub fn to_json_string(&self) -> Result<String, ApiError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::Serialization(e.to_string()).into())
    }

    pub fn from_json_str(text: &str) -> Result<Self, ApiError> {
        serde_json::from_str(text)
            .map_err(|e| StorageError::Deserialization(e.to_string()).into())
    }

    /// Write the store to `path`
    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        let text = self.to_json_string()?;
        fs::write(path, text).map_err(|e| ApiError::io(path, e))
    }

    /// Replace the contents of this store with the document at `path`
    ///
    /// The overwrite-warning flag of this store is kept.
    pub fn load(&mut self, path: &Path) -> Result<(), ApiError> {
        let loaded = Self::from_file(path)?;
        self.entries = loaded.entries;
        Ok(())
    }

    /// Construct a store from a document saved with [`Parameters::save`]
    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let text = fs::read_to_string(path).map_err(|e| ApiError::io(path, e))?;
        Self::from_json_str(&text).map_err(|e| match e {
            ApiError::StorageError(StorageError::Deserialization(msg)) => {
                StorageError::Deserialization(format!("{}: {}", path.display(), msg)).into()
            }
            other => other,
        })
    }
}
