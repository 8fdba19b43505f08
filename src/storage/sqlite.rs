//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, params, params_from_iter, OptionalExtension};
use rusqlite::types::Value;
use crate::{Result, Error};
use crate::content::{ContentType, PublishStatus, Record, RecordId};
use super::schema;

/// SQLite-backed storage for records, record meta and options
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Content Type Operations ==========

    /// Register (or re-register) a content type
    pub fn register_type(&self, content_type: &ContentType) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO content_types (name, label, show_ui) VALUES (?1, ?2, ?3)",
            params![content_type.name, content_type.label, content_type.show_ui],
        )?;
        Ok(())
    }

    /// Check whether a content type is registered
    pub fn type_exists(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self.conn
            .query_row("SELECT 1 FROM content_types WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// List content types, optionally only those shown in admin selectors
    pub fn list_types(&self, show_ui_only: bool) -> Result<Vec<ContentType>> {
        let sql = if show_ui_only {
            "SELECT name, label, show_ui FROM content_types WHERE show_ui = 1 ORDER BY name"
        } else {
            "SELECT name, label, show_ui FROM content_types ORDER BY name"
        };
        let mut stmt = self.conn.prepare(sql)?;

        let types = stmt
            .query_map([], |row| {
                Ok(ContentType {
                    name: row.get(0)?,
                    label: row.get(1)?,
                    show_ui: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(types)
    }

    // ========== Record Operations ==========

    /// Insert a record and return its new id (the `id` field is ignored)
    pub fn insert_record(&self, record: &Record) -> Result<RecordId> {
        self.conn.execute(
            "INSERT INTO records (record_type, title, slug, status, body) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.record_type,
                record.title,
                record.slug,
                record.status.as_str(),
                record.body,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a record by id
    pub fn get_record(&self, id: RecordId) -> Result<Option<Record>> {
        self.conn
            .query_row(
                "SELECT id, record_type, title, slug, status, body FROM records WHERE id = ?1",
                [id],
                |row| self.row_to_record(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// List records, optionally of one type, by id
    pub fn list_records(&self, record_type: Option<&str>) -> Result<Vec<Record>> {
        let records = match record_type {
            Some(t) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, record_type, title, slug, status, body FROM records WHERE record_type = ?1 ORDER BY id",
                )?;
                stmt.query_map([t], |row| self.row_to_record(row))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, record_type, title, slug, status, body FROM records ORDER BY id",
                )?;
                stmt.query_map([], |row| self.row_to_record(row))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    /// Change a record's publish status. Returns false when the record is missing.
    pub fn set_status(&self, id: RecordId, status: PublishStatus) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE records SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a record; its meta rows cascade
    pub fn delete_record(&self, id: RecordId) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM records WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Fetch published records among `ids`, in the order of `ids`
    pub fn published_by_ids(&self, ids: &[RecordId]) -> Result<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, record_type, title, slug, status, body FROM records WHERE status = 'publish' AND id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(ids.iter()), |row| self.row_to_record(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut ordered = Vec::with_capacity(found.len());
        for id in ids {
            if ordered.iter().any(|r: &Record| r.id == *id) {
                continue;
            }
            if let Some(record) = found.iter().find(|r| r.id == *id) {
                ordered.push(record.clone());
            }
        }
        Ok(ordered)
    }

    /// Published records of the given types (any type when empty), by title
    pub fn published_candidates(&self, types: &[String]) -> Result<Vec<Record>> {
        let mut sql = String::from(
            "SELECT id, record_type, title, slug, status, body FROM records WHERE status = 'publish'",
        );
        if !types.is_empty() {
            sql.push_str(&format!(" AND record_type IN ({})", placeholders(types.len())));
        }
        sql.push_str(" ORDER BY title, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(types.iter()), |row| self.row_to_record(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Count all records
    pub fn count_records(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Helper to convert a row to a Record
    fn row_to_record(&self, row: &rusqlite::Row) -> rusqlite::Result<Record> {
        let status_str: String = row.get(4)?;
        let status: PublishStatus = status_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Record {
            id: row.get(0)?,
            record_type: row.get(1)?,
            title: row.get(2)?,
            slug: row.get(3)?,
            status,
            body: row.get(5)?,
        })
    }

    // ========== Record Meta Operations ==========

    /// Get one meta value
    pub fn get_meta(&self, record_id: RecordId, meta_key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT meta_value FROM record_meta WHERE record_id = ?1 AND meta_key = ?2",
                params![record_id, meta_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Write one meta value, replacing whatever was there
    pub fn set_meta(&self, record_id: RecordId, meta_key: &str, meta_value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO record_meta (record_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
            params![record_id, meta_key, meta_value],
        )?;
        Ok(())
    }

    /// Scan meta rows whose key starts with `prefix`, joined to their record.
    ///
    /// `record_types` (when non-empty) and `only_published` narrow the scan
    /// inside SQLite; values are returned raw.
    pub fn scan_meta(
        &self,
        prefix: &str,
        record_types: &[String],
        only_published: bool,
    ) -> Result<Vec<MetaRow>> {
        let mut sql = String::from(
            r#"
            SELECT r.id, r.record_type, r.status, m.meta_key, m.meta_value
            FROM record_meta m
            INNER JOIN records r ON r.id = m.record_id
            WHERE m.meta_key LIKE ?1 ESCAPE '\'
            "#,
        );
        if only_published {
            sql.push_str(" AND r.status = 'publish'");
        }
        if !record_types.is_empty() {
            let in_list: Vec<String> = (0..record_types.len()).map(|i| format!("?{}", i + 2)).collect();
            sql.push_str(&format!(" AND r.record_type IN ({})", in_list.join(", ")));
        }
        sql.push_str(" ORDER BY r.id, m.meta_key");

        let mut values = Vec::with_capacity(record_types.len() + 1);
        values.push(Value::Text(format!("{}%", escape_like(prefix))));
        values.extend(record_types.iter().cloned().map(Value::Text));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let status_str: String = row.get(2)?;
                let status: PublishStatus = status_str.parse().map_err(|e: Error| {
                    rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
                })?;
                Ok(MetaRow {
                    record_id: row.get(0)?,
                    record_type: row.get(1)?,
                    status,
                    meta_key: row.get(3)?,
                    meta_value: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Count meta rows whose key starts with `prefix`
    pub fn count_meta_with_prefix(&self, prefix: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            r"SELECT COUNT(*) FROM record_meta WHERE meta_key LIKE ?1 ESCAPE '\'",
            [format!("{}%", escape_like(prefix))],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Count all meta rows
    pub fn count_meta(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM record_meta", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Option Operations ==========

    /// Get a named option blob
    pub fn get_option(&self, name: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM options WHERE name = ?1", [name], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    /// Store an option only if it does not exist yet. Returns true when written.
    pub fn add_option(&self, name: &str, value: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO options (name, value) VALUES (?1, ?2)",
            params![name, value],
        )?;
        Ok(changed > 0)
    }

    /// Store an option, replacing any previous value
    pub fn update_option(&self, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO options (name, value) VALUES (?1, ?2)",
            params![name, value],
        )?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self, attachment_prefix: &str) -> Result<DbStats> {
        let content_types: i64 = self.conn.query_row("SELECT COUNT(*) FROM content_types", [], |row| row.get(0))?;
        let options: i64 = self.conn.query_row("SELECT COUNT(*) FROM options", [], |row| row.get(0))?;
        Ok(DbStats {
            content_types: content_types as usize,
            records: self.count_records()?,
            meta_rows: self.count_meta()?,
            attachment_rows: self.count_meta_with_prefix(attachment_prefix)?,
            options: options as usize,
        })
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Escape LIKE wildcards so `_` and `%` match literally
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A record meta row joined with its owning record
#[derive(Debug, Clone)]
pub struct MetaRow {
    pub record_id: RecordId,
    pub record_type: String,
    pub status: PublishStatus,
    pub meta_key: String,
    pub meta_value: String,
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub content_types: usize,
    pub records: usize,
    pub meta_rows: usize,
    pub attachment_rows: usize,
    pub options: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Content types: {}", self.content_types)?;
        writeln!(f, "  Records: {}", self.records)?;
        writeln!(f, "  Meta rows: {}", self.meta_rows)?;
        writeln!(f, "  Attachment rows: {}", self.attachment_rows)?;
        writeln!(f, "  Options: {}", self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_types() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.register_type(&ContentType::new("article", "Articles")).unwrap();
        store.register_type(&ContentType::new("news", "News")).unwrap();
        store
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("site.db");
        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.stats(crate::relation::META_PREFIX).unwrap().records, 0);
    }

    #[test]
    fn test_record_crud() {
        let store = store_with_types();

        let id = store.insert_record(&Record::published("article", "First")).unwrap();
        let retrieved = store.get_record(id).unwrap().unwrap();
        assert_eq!(retrieved.title, "First");
        assert_eq!(retrieved.status, PublishStatus::Publish);

        assert!(store.set_status(id, PublishStatus::Draft).unwrap());
        assert_eq!(store.get_record(id).unwrap().unwrap().status, PublishStatus::Draft);

        assert!(store.delete_record(id).unwrap());
        assert!(store.get_record(id).unwrap().is_none());
        assert!(!store.set_status(id, PublishStatus::Publish).unwrap());
    }

    #[test]
    fn test_type_registry() {
        let store = store_with_types();
        store.register_type(&ContentType::new("revision", "Revisions").hidden()).unwrap();

        assert!(store.type_exists("news").unwrap());
        assert!(!store.type_exists("events").unwrap());
        assert_eq!(store.list_types(false).unwrap().len(), 3);
        assert_eq!(store.list_types(true).unwrap().len(), 2);
    }

    #[test]
    fn test_meta_cascade_on_record_delete() {
        let store = store_with_types();
        let id = store.insert_record(&Record::published("article", "Owner")).unwrap();
        store.set_meta(id, "_ref_related", "[1,2]").unwrap();
        assert_eq!(store.count_meta().unwrap(), 1);

        store.delete_record(id).unwrap();
        assert_eq!(store.count_meta().unwrap(), 0);
    }

    #[test]
    fn test_scan_meta_prefix_is_literal() {
        let store = store_with_types();
        let id = store.insert_record(&Record::published("article", "Owner")).unwrap();
        store.set_meta(id, "_ref_related", "[1]").unwrap();
        // `_` must not act as a wildcard
        store.set_meta(id, "xrefxother", "[1]").unwrap();
        store.set_meta(id, "_edit_lock", "1").unwrap();

        let rows = store.scan_meta("_ref_", &[], false).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].meta_key, "_ref_related");
        assert_eq!(store.count_meta_with_prefix("_ref_").unwrap(), 1);
    }

    #[test]
    fn test_scan_meta_filters() {
        let store = store_with_types();
        let a = store.insert_record(&Record::published("article", "A")).unwrap();
        let n = store.insert_record(&Record::draft("news", "N")).unwrap();
        store.set_meta(a, "_ref_x", "[9]").unwrap();
        store.set_meta(n, "_ref_y", "[9]").unwrap();

        assert_eq!(store.scan_meta("_ref_", &[], false).unwrap().len(), 2);
        assert_eq!(store.scan_meta("_ref_", &[], true).unwrap().len(), 1);
        let news_only = store.scan_meta("_ref_", &["news".to_string()], false).unwrap();
        assert_eq!(news_only.len(), 1);
        assert_eq!(news_only[0].record_id, n);
    }

    #[test]
    fn test_published_by_ids_keeps_order() {
        let store = store_with_types();
        let a = store.insert_record(&Record::published("news", "A")).unwrap();
        let b = store.insert_record(&Record::draft("news", "B")).unwrap();
        let c = store.insert_record(&Record::published("news", "C")).unwrap();

        let found = store.published_by_ids(&[c, b, a, 999]).unwrap();
        let ids: Vec<_> = found.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c, a]);
        assert!(store.published_by_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_published_candidates() {
        let store = store_with_types();
        store.insert_record(&Record::published("news", "Zeta")).unwrap();
        store.insert_record(&Record::published("article", "Alpha")).unwrap();
        store.insert_record(&Record::draft("news", "Beta")).unwrap();

        let any: Vec<_> = store.published_candidates(&[]).unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(any, vec!["Alpha", "Zeta"]);

        let news = store.published_candidates(&["news".to_string()]).unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].title, "Zeta");
    }

    #[test]
    fn test_options() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_option("k").unwrap().is_none());
        assert!(store.add_option("k", "one").unwrap());
        assert!(!store.add_option("k", "two").unwrap());
        assert_eq!(store.get_option("k").unwrap().as_deref(), Some("one"));
        store.update_option("k", "three").unwrap();
        assert_eq!(store.get_option("k").unwrap().as_deref(), Some("three"));
    }
}
