//! # Stage Configuration
//!
//! A `StageConfiguration` is the key/value bundle one stage invocation is
//! shipped with. It is built by the job driver, serialized once, and decoded
//! read-only by every task; each task instantiates its own extractors and
//! type handlers from it at setup.
//!
//! Keys are namespaced per stage (`pipeline.<stage>.<param>`); values are
//! strings with typed accessors on top.

pub mod pipeline;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use pipeline::{PipelineConfig, MAP_SPILL_OVER};

/// Serializable per-stage parameter bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageConfiguration {
    entries: BTreeMap<String, String>,
}

impl StageConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Set only when the key is absent.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.entries.entry(key.into()).or_insert_with(|| value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| Error::config(key, "missing required key"))
    }

    /// Parse an optional key through `FromStr`.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| raw.parse::<T>().map_err(|e| Error::config(key, e.to_string())))
            .transpose()
    }

    pub fn require_parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.require(key)?;
        raw.parse::<T>().map_err(|e| Error::config(key, e.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ========================================================================
    // Wire form
    // ========================================================================

    /// Serialize for distribution to tasks.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for StageConfiguration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.to_string())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementKind;

    #[test]
    fn test_typed_accessors() {
        let conf = StageConfiguration::new()
            .with("a.class", ElementKind::Edge)
            .with("a.limit", 12);

        assert_eq!(conf.require_parsed::<ElementKind>("a.class").unwrap(), ElementKind::Edge);
        assert_eq!(conf.get_parsed::<usize>("a.limit").unwrap(), Some(12));
        assert_eq!(conf.get_parsed::<usize>("a.absent").unwrap(), None);
    }

    #[test]
    fn test_missing_and_malformed_keys_name_the_key() {
        let conf = StageConfiguration::new().with("a.limit", "many");

        match conf.require("a.absent") {
            Err(Error::Config { key, .. }) => assert_eq!(key, "a.absent"),
            other => panic!("expected config error, got {other:?}"),
        }
        match conf.require_parsed::<usize>("a.limit") {
            Err(Error::Config { key, .. }) => assert_eq!(key, "a.limit"),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_decode() {
        let conf: StageConfiguration = [("x", "1"), ("y", "two")].into_iter().collect();
        let bytes = conf.encode().unwrap();
        assert_eq!(StageConfiguration::decode(&bytes).unwrap(), conf);
    }

    #[test]
    fn test_set_default_keeps_existing() {
        let mut conf = StageConfiguration::new().with("k", "explicit");
        conf.set_default("k", "fallback").set_default("j", "fallback");
        assert_eq!(conf.get("k"), Some("explicit"));
        assert_eq!(conf.get("j"), Some("fallback"));
    }
}
