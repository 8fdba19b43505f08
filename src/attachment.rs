//! Attachment storage
//!
//! Each record holds one list of target ids per applicable relation,
//! stored as a JSON array in record meta under `_ref_<key>`. Writes are
//! full replacements; there is no merge.

use serde::Serialize;
use crate::content::RecordId;
use crate::registry::{DefinitionFilter, RelationRegistry};
use crate::relation::{RelationKey, TargetIds};
use crate::storage::SqliteStore;
use crate::Result;

/// Attachment lists of one record, in definition order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachments {
    entries: Vec<(RelationKey, TargetIds)>,
}

impl Attachments {
    /// Add a list; a key seen before keeps its first list
    fn push(&mut self, key: RelationKey, ids: TargetIds) {
        if !self.entries.iter().any(|(k, _)| *k == key) {
            self.entries.push((key, ids));
        }
    }

    pub fn get(&self, key: &str) -> Option<&TargetIds> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, ids)| ids)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelationKey, &TargetIds)> {
        self.entries.iter().map(|(k, ids)| (k, ids))
    }

    pub fn keys(&self) -> impl Iterator<Item = &RelationKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when no relation has any target attached
    pub fn has_no_targets(&self) -> bool {
        self.entries.iter().all(|(_, ids)| ids.is_empty())
    }

    /// Keep only the list for `key`
    pub fn only(mut self, key: &str) -> Self {
        self.entries.retain(|(k, _)| *k == key);
        self
    }
}

impl Serialize for Attachments {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, ids)| (k.as_str(), ids)))
    }
}

/// Result of [`AttachmentStore::set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOutcome {
    /// The list was replaced; `count` ids are now stored
    Stored { count: usize },
    RecordMissing,
    /// No definition with that key applies to the record's type
    NoSuchRelation,
}

/// Read/write access to attachment lists
pub struct AttachmentStore<'a> {
    registry: RelationRegistry<'a>,
}

impl<'a> AttachmentStore<'a> {
    pub fn new(registry: RelationRegistry<'a>) -> Self {
        Self { registry }
    }

    pub fn open(store: &'a SqliteStore) -> Self {
        Self::new(RelationRegistry::open(store))
    }

    fn host(&self) -> &'a SqliteStore {
        self.registry.config().host()
    }

    pub fn registry(&self) -> &RelationRegistry<'a> {
        &self.registry
    }

    /// Every attachment list of `record_id`, one per definition of its type.
    ///
    /// Returns `None` when the record does not exist; absent lists read as empty.
    pub fn get_all(&self, record_id: RecordId) -> Result<Option<Attachments>> {
        let Some(record) = self.host().get_record(record_id)? else {
            tracing::debug!("Attachments requested for missing record {}", record_id);
            return Ok(None);
        };

        let mut attachments = Attachments::default();
        for def in self.registry.for_type(&record.record_type)? {
            let ids = self.get(record_id, &def.key)?;
            attachments.push(def.key, ids);
        }
        Ok(Some(attachments))
    }

    /// The stored list for one key; absent or unreadable reads as empty
    pub fn get(&self, record_id: RecordId, key: &RelationKey) -> Result<TargetIds> {
        let meta_key = key.meta_key();
        let Some(raw) = self.host().get_meta(record_id, &meta_key)? else {
            return Ok(TargetIds::default());
        };
        match decode_ids(&raw) {
            Some(ids) => Ok(ids),
            None => {
                tracing::warn!("Unreadable attachment list {} on record {}", meta_key, record_id);
                Ok(TargetIds::default())
            }
        }
    }

    /// Replace the list stored under `key` for `record_id`
    pub fn set(
        &self,
        record_id: RecordId,
        key: &str,
        targets: impl Into<TargetIds>,
    ) -> Result<SetOutcome> {
        let Some(record) = self.host().get_record(record_id)? else {
            return Ok(SetOutcome::RecordMissing);
        };

        let filter = DefinitionFilter::all().source_type(&record.record_type).key(key);
        let Some(def) = self.registry.list(filter)?.into_iter().next() else {
            tracing::debug!("No reference '{}' for type '{}'", key, record.record_type);
            return Ok(SetOutcome::NoSuchRelation);
        };

        let targets = targets.into();
        self.write(record_id, &def.key, &targets)?;
        Ok(SetOutcome::Stored { count: targets.len() })
    }

    /// Unconditional write, used once the caller has resolved the definition
    pub(crate) fn write(&self, record_id: RecordId, key: &RelationKey, targets: &TargetIds) -> Result<()> {
        let raw = serde_json::to_string(targets)?;
        self.host().set_meta(record_id, &key.meta_key(), &raw)?;
        tracing::info!("Stored {} target(s) under {} for record {}", targets.len(), key.meta_key(), record_id);
        Ok(())
    }
}

/// Decode a stored attachment list; `None` when malformed
pub fn decode_ids(raw: &str) -> Option<TargetIds> {
    serde_json::from_str::<Vec<RecordId>>(raw).ok().map(TargetIds::from)
}
