//! # Postrefs - typed references between content records
//!
//! Administrators declare named relation kinds ("related articles") scoped
//! to a source content type and a set of allowed target types. Editors attach
//! target records to a source record; front-end adapters render them as link
//! lists.
//!
//! Postrefs provides:
//! - A relation registry over one versioned settings blob
//! - Per-record attachment lists stored in record meta (`_ref_<key>`)
//! - Reverse lookup ("who references this record") by scanning record meta
//! - Render adapters: inline `[ref]` tag, sidebar widget, editor field
//! - An admin settings screen, a CLI and an HTTP server
//! - SQLite-backed host storage for records, meta and options

pub mod content;
pub mod relation;
pub mod storage;
pub mod settings;
pub mod registry;
pub mod attachment;
pub mod reverse;
pub mod nonce;
pub mod render;
pub mod admin;
pub mod server;
pub mod ui;
pub mod config;

// Re-exports for convenient access
pub use content::{ContentType, PublishStatus, Record, RecordId};
pub use relation::{
    DefinitionForm, InternalId, RejectReason, RelationDefinition, RelationKey, TargetIds, TypeList,
    UpsertOutcome,
};
pub use storage::SqliteStore;
pub use settings::{ConfigStore, ReferenceSettings};
pub use registry::{DefinitionFilter, RelationRegistry};
pub use attachment::{Attachments, AttachmentStore, SetOutcome};
pub use reverse::{Referrer, ReverseIndex, ReverseLookup};

/// Result type alias for Postrefs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Postrefs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid relation key: '{0}'")]
    InvalidKey(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Corrupt settings blob '{name}': {reason}")]
    CorruptSettings { name: String, reason: String },

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),
}
