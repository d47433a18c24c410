//! Parameter store
//!
//! An insertion-ordered mapping from keys to typed values. Every entry carries
//! metadata (who set it and when) that is stamped together with the value.

mod persistence;
mod summary;
mod value;

pub use persistence::FORMAT_VERSION;
pub use summary::{SummaryField, SummaryFilter, SummaryOptions, SUMMARY_WRAP_WIDTH};
pub use value::{ParamValue, Quantity, ValueSet};

use crate::error::ApiError;
use crate::units::{TemperatureUnit, UnitSystem};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Who set a parameter and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamMetadata {
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

impl ParamMetadata {
    /// Metadata for the current user at the current instant
    pub fn now() -> Self {
        Self {
            author: current_user(),
            timestamp: Utc::now(),
        }
    }
}

/// Login name from the environment, or "unknown"
pub fn current_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    value: ParamValue,
    metadata: ParamMetadata,
}

/// Typed, metadata-annotated key/value store passed between workflow stages
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: IndexMap<String, Entry>,
    warn_on_overwrite: bool,
}

impl PartialEq for Parameters {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a plain mapping; every entry gets fresh metadata
    pub fn from_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let mut params = Self::new();
        for (key, value) in map {
            params.insert(key, value);
        }
        params
    }

    /// Assign a value, stamping current user and time
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.set(key, value, None, None);
    }

    /// Assign a value with explicit metadata; missing parts are derived
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
        author: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let key = key.into();
        if self.warn_on_overwrite && self.entries.contains_key(&key) {
            warn!(key = %key, "Parameter is being overwritten");
        }
        let metadata = ParamMetadata {
            author: author.map(str::to_string).unwrap_or_else(current_user),
            timestamp: timestamp.unwrap_or_else(Utc::now),
        };
        self.entries.insert(
            key,
            Entry {
                value: value.into(),
                metadata,
            },
        );
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Result<&ParamValue, ApiError> {
        self.entries
            .get(key)
            .map(|e| &e.value)
            .ok_or_else(|| ApiError::KeyNotFound(key.to_string()))
    }

    /// Metadata stored under `key`
    pub fn get_metadata(&self, key: &str) -> Result<&ParamMetadata, ApiError> {
        self.entries
            .get(key)
            .map(|e| &e.metadata)
            .ok_or_else(|| ApiError::KeyNotFound(key.to_string()))
    }

    /// Drop a value together with its metadata, keeping the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.entries.shift_remove(key).map(|e| e.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Entries with their metadata in insertion order
    pub fn iter_with_metadata(
        &self,
    ) -> impl Iterator<Item = (&str, &ParamValue, &ParamMetadata)> {
        self.entries
            .iter()
            .map(|(k, e)| (k.as_str(), &e.value, &e.metadata))
    }

    pub fn warn_on_overwrite(&self) -> bool {
        self.warn_on_overwrite
    }

    pub fn set_warn_on_overwrite(&mut self, enabled: bool) {
        self.warn_on_overwrite = enabled;
    }

    /// Copy every entry of `other` into this store, metadata included
    pub fn update(&mut self, other: &Parameters) {
        for (key, entry) in &other.entries {
            if self.warn_on_overwrite && self.entries.contains_key(key) {
                warn!(key = %key, "Parameter is being overwritten");
            }
            self.entries.insert(key.clone(), entry.clone());
        }
    }

    /// Independent copy with every quantity converted to plain magnitudes
    pub fn convert_units(
        &self,
        system: UnitSystem,
        temperature: TemperatureUnit,
    ) -> Result<Parameters, ApiError> {
        let mut converted = self.clone();
        converted.convert_units_in_place(system, temperature)?;
        Ok(converted)
    }

    /// Convert every quantity in place; metadata is left untouched
    pub fn convert_units_in_place(
        &mut self,
        system: UnitSystem,
        temperature: TemperatureUnit,
    ) -> Result<(), ApiError> {
        for entry in self.entries.values_mut() {
            if entry.value.has_units() {
                entry.value = entry.value.convert_units(system, temperature)?;
            }
        }
        Ok(())
    }

    /// Untagged JSON object of all values, used as the template context
    pub fn to_plain_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, e)| (k.clone(), e.value.to_plain_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Parameters::from_map(iter)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> Extend<(K, V)> for Parameters {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
