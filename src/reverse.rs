//! Reverse lookup - which records reference a given record
//!
//! No reverse index is persisted. Every `_ref_*` meta row is pulled from
//! storage (type and status filters run inside SQLite), decoded, and
//! tested for membership of the target id.

use serde::Serialize;
use crate::attachment::decode_ids;
use crate::content::RecordId;
use crate::relation::META_PREFIX;
use crate::storage::SqliteStore;
use crate::Result;

/// One meta row that references the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Referrer {
    pub record_id: RecordId,
    pub record_type: String,
    /// Full meta key, e.g. `_ref_related`
    pub meta_key: String,
    /// Stored value as read from storage
    pub raw_value: String,
}

/// Outcome of a reverse scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReverseLookup {
    pub referrers: Vec<Referrer>,
    /// Rows skipped because their value could not be decoded
    pub skipped_malformed: usize,
}

impl ReverseLookup {
    /// Distinct referencing record ids, in scan order
    pub fn record_ids(&self) -> Vec<RecordId> {
        let mut ids = Vec::new();
        for r in &self.referrers {
            if !ids.contains(&r.record_id) {
                ids.push(r.record_id);
            }
        }
        ids
    }

    pub fn contains(&self, record_id: RecordId) -> bool {
        self.referrers.iter().any(|r| r.record_id == record_id)
    }

    pub fn is_empty(&self) -> bool {
        self.referrers.is_empty()
    }
}

/// Full-scan reverse lookup over attachment meta
pub struct ReverseIndex<'a> {
    store: &'a SqliteStore,
}

impl<'a> ReverseIndex<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Find every attachment row that lists `target_id`.
    ///
    /// `source_types` narrows the referencing records (any when empty);
    /// `only_published` drops unpublished referrers. A record that lists the
    /// target under two keys is reported twice.
    pub fn find(
        &self,
        target_id: RecordId,
        source_types: &[String],
        only_published: bool,
    ) -> Result<ReverseLookup> {
        let rows = self.store.scan_meta(META_PREFIX, source_types, only_published)?;
        let scanned = rows.len();

        let mut lookup = ReverseLookup::default();
        for row in rows {
            let Some(ids) = decode_ids(&row.meta_value) else {
                tracing::debug!(
                    "Skipping malformed {} on record {}",
                    row.meta_key,
                    row.record_id
                );
                lookup.skipped_malformed += 1;
                continue;
            };
            if ids.contains_id(target_id) {
                lookup.referrers.push(Referrer {
                    record_id: row.record_id,
                    record_type: row.record_type,
                    meta_key: row.meta_key,
                    raw_value: row.meta_value,
                });
            }
        }

        if lookup.skipped_malformed > 0 {
            tracing::warn!(
                "Reverse lookup for {} skipped {} malformed attachment row(s)",
                target_id,
                lookup.skipped_malformed
            );
        }
        tracing::debug!(
            "Reverse lookup for {}: {} match(es) in {} row(s)",
            target_id,
            lookup.referrers.len(),
            scanned
        );
        Ok(lookup)
    }
}
