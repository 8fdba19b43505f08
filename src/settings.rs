//! Persisted reference settings
//!
//! All relation definitions live in a single option blob:
//! `{ "refs": { "<id>": RelationDefinition, ... }, "next_id": <n> }`.
//! `ConfigStore` owns the load/save lifecycle of that blob.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::relation::{InternalId, RelationDefinition};
use crate::storage::SqliteStore;
use crate::{Error, Result};

/// Option name the settings blob is stored under
pub const SETTINGS_OPTION: &str = "post_references_settings";

/// The settings blob.
///
/// Ids come from a monotonic counter, so map order is insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSettings {
    #[serde(default)]
    pub refs: BTreeMap<InternalId, RelationDefinition>,
    #[serde(default = "default_next_id")]
    pub next_id: InternalId,
}

fn default_next_id() -> InternalId {
    1
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            refs: BTreeMap::new(),
            next_id: default_next_id(),
        }
    }
}

impl ReferenceSettings {
    /// Take the next id and advance the counter
    pub fn allocate_id(&mut self) -> InternalId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn definitions(&self) -> impl Iterator<Item = &RelationDefinition> {
        self.refs.values()
    }

    /// Keep stored ids and the counter consistent after loading
    fn normalize(mut self) -> Self {
        for (id, def) in self.refs.iter_mut() {
            def.internal_id = *id;
        }
        if let Some(max) = self.refs.keys().next_back() {
            if self.next_id <= *max {
                tracing::warn!(
                    "next_id {} not above highest reference id {}, advancing counter",
                    self.next_id,
                    max
                );
                self.next_id = max + 1;
            }
        }
        self
    }
}

/// Load/save service for [`ReferenceSettings`]
#[derive(Clone, Copy)]
pub struct ConfigStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> ConfigStore<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// The host storage the blob lives in
    pub fn host(&self) -> &'a SqliteStore {
        self.store
    }

    /// Write default settings on first activation. Existing settings are kept.
    pub fn install(&self) -> Result<bool> {
        let defaults = serde_json::to_string(&ReferenceSettings::default())?;
        let written = self.store.add_option(SETTINGS_OPTION, &defaults)?;
        if written {
            tracing::info!("Initialized {} with defaults", SETTINGS_OPTION);
        } else {
            tracing::debug!("{} already present, install left it untouched", SETTINGS_OPTION);
        }
        Ok(written)
    }

    /// Removal hook. Settings are kept.
    pub fn uninstall(&self) -> Result<()> {
        tracing::info!("Uninstall requested; {} is retained", SETTINGS_OPTION);
        Ok(())
    }

    /// Load settings; a missing blob yields defaults
    pub fn load(&self) -> Result<ReferenceSettings> {
        let Some(raw) = self.store.get_option(SETTINGS_OPTION)? else {
            return Ok(ReferenceSettings::default());
        };

        let settings: ReferenceSettings = serde_json::from_str(&raw).map_err(|e| Error::CorruptSettings {
            name: SETTINGS_OPTION.to_string(),
            reason: e.to_string(),
        })?;
        Ok(settings.normalize())
    }

    /// Persist settings, replacing the stored blob
    pub fn save(&self, settings: &ReferenceSettings) -> Result<()> {
        let raw = serde_json::to_string(settings)?;
        self.store.update_option(SETTINGS_OPTION, &raw)?;
        tracing::debug!("Saved {} ({} references)", SETTINGS_OPTION, settings.refs.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::{RelationKey, TypeList};

    fn definition(id: InternalId, key: &str) -> RelationDefinition {
        RelationDefinition {
            internal_id: id,
            key: RelationKey::new(key).unwrap(),
            title: key.to_string(),
            source_type: "article".to_string(),
            target_types: TypeList::any(),
        }
    }

    #[test]
    fn test_load_defaults_when_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let settings = ConfigStore::new(&store).load().unwrap();
        assert!(settings.refs.is_empty());
        assert_eq!(settings.next_id, 1);
    }

    #[test]
    fn test_install_only_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = ConfigStore::new(&store);
        assert!(config.install().unwrap());

        let mut settings = config.load().unwrap();
        let id = settings.allocate_id();
        settings.refs.insert(id, definition(id, "related"));
        config.save(&settings).unwrap();

        assert!(!config.install().unwrap());
        assert_eq!(config.load().unwrap().refs.len(), 1);
    }

    #[test]
    fn test_uninstall_keeps_settings() {
        let store = SqliteStore::open_in_memory().unwrap();
        let config = ConfigStore::new(&store);
        let mut settings = ReferenceSettings::default();
        let id = settings.allocate_id();
        settings.refs.insert(id, definition(id, "related"));
        config.save(&settings).unwrap();

        config.uninstall().unwrap();
        assert_eq!(config.load().unwrap(), settings);
    }

    #[test]
    fn test_blob_shape() {
        let mut settings = ReferenceSettings::default();
        let id = settings.allocate_id();
        settings.refs.insert(id, definition(id, "related"));

        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["next_id"], 2);
        assert_eq!(value["refs"]["1"]["key"], "related");
        assert_eq!(value["refs"]["1"]["source_type"], "article");
    }

    #[test]
    fn test_corrupt_blob_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.update_option(SETTINGS_OPTION, "{not json").unwrap();
        let err = ConfigStore::new(&store).load().unwrap_err();
        assert!(matches!(err, Error::CorruptSettings { .. }));
    }

    #[test]
    fn test_normalize_repairs_counter() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .update_option(
                SETTINGS_OPTION,
                r#"{"refs":{"4":{"internal_id":0,"key":"a","title":"A","source_type":"article","target_types":[]}},"next_id":2}"#,
            )
            .unwrap();

        let settings = ConfigStore::new(&store).load().unwrap();
        assert_eq!(settings.next_id, 5);
        assert_eq!(settings.refs[&4].internal_id, 4);
    }
}
