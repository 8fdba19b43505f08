//! Storage Layer - SQLite-backed host platform
//!
//! System of record is SQLite with tables:
//! - content_types(name, label, show_ui)
//! - records(id, record_type, title, slug, status)
//! - record_meta(record_id, meta_key, meta_value)
//! - options(name, value)

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, MetaRow, DbStats};
