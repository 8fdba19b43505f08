//! Database schema definitions

/// SQL to create the content_types table
pub const CREATE_CONTENT_TYPES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS content_types (
    name TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    show_ui INTEGER NOT NULL DEFAULT 1
)
"#;

/// SQL to create the records table
pub const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_type TEXT NOT NULL,
    title TEXT NOT NULL,
    slug TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'draft',
    body TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the record_meta table
/// One value per (record, key); rows go away with their record
pub const CREATE_RECORD_META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS record_meta (
    record_id INTEGER NOT NULL REFERENCES records(id) ON DELETE CASCADE,
    meta_key TEXT NOT NULL,
    meta_value TEXT NOT NULL,
    PRIMARY KEY (record_id, meta_key)
)
"#;

/// SQL to create the options table
pub const CREATE_OPTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS options (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_records_type ON records(record_type)",
    "CREATE INDEX IF NOT EXISTS idx_records_status ON records(status)",
    "CREATE INDEX IF NOT EXISTS idx_record_meta_key ON record_meta(meta_key)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_CONTENT_TYPES_TABLE,
        CREATE_RECORDS_TABLE,
        CREATE_RECORD_META_TABLE,
        CREATE_OPTIONS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
