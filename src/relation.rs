//! Relation types - declared reference kinds between content types
//!
//! A `RelationDefinition` says: records of `source_type` may attach
//! records of any of `target_types` under the name `key`. The attached
//! IDs live in record meta under `_ref_<key>`.

use crate::content::RecordId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;

/// Prefix of every record meta key holding an attachment list
pub const META_PREFIX: &str = "_ref_";

/// Surrogate id of a definition inside the settings blob. Never reused.
pub type InternalId = u64;

/// Validated relation key, `[A-Za-z0-9_]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelationKey(String);

impl RelationKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if Self::is_valid(&key) {
            Ok(Self(key))
        } else {
            Err(Error::InvalidKey(key))
        }
    }

    /// Whether `key` is non-empty and made only of ASCII letters, digits and `_`
    pub fn is_valid(key: &str) -> bool {
        !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Record meta key the attachment list is stored under
    pub fn meta_key(&self) -> String {
        format!("{}{}", META_PREFIX, self.0)
    }

    /// Parse a `_ref_<key>` meta key back into its relation key
    pub fn from_meta_key(meta_key: &str) -> Option<Self> {
        meta_key
            .strip_prefix(META_PREFIX)
            .and_then(|key| Self::new(key).ok())
    }
}

impl TryFrom<String> for RelationKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RelationKey> for String {
    fn from(key: RelationKey) -> Self {
        key.0
    }
}

impl FromStr for RelationKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl std::fmt::Display for RelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for RelationKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RelationKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Ordered list of content type names.
///
/// Built from either a single name or a list; downstream code only ever
/// sees the list form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeList(Vec<String>);

impl TypeList {
    pub fn new(types: Vec<String>) -> Self {
        Self(types)
    }

    pub fn any() -> Self {
        Self(Vec::new())
    }

    /// An empty list allows every type
    pub fn allows_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn allows(&self, record_type: &str) -> bool {
        self.allows_any() || self.0.iter().any(|t| t == record_type)
    }
}

impl Deref for TypeList {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for TypeList {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for TypeList {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for TypeList {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<Vec<&str>> for TypeList {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for TypeList {
    fn from(value: &[&str]) -> Self {
        Self(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TypeList {
    fn from(value: [&str; N]) -> Self {
        Self(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Ordered list of attached record IDs, kept exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetIds(Vec<RecordId>);

impl TargetIds {
    pub fn new(ids: Vec<RecordId>) -> Self {
        Self(ids)
    }

    pub fn contains_id(&self, id: RecordId) -> bool {
        self.0.contains(&id)
    }
}

impl Deref for TargetIds {
    type Target = [RecordId];

    fn deref(&self) -> &[RecordId] {
        &self.0
    }
}

impl From<RecordId> for TargetIds {
    fn from(value: RecordId) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<RecordId>> for TargetIds {
    fn from(value: Vec<RecordId>) -> Self {
        Self(value)
    }
}

impl From<&[RecordId]> for TargetIds {
    fn from(value: &[RecordId]) -> Self {
        Self(value.to_vec())
    }
}

impl<const N: usize> From<[RecordId; N]> for TargetIds {
    fn from(value: [RecordId; N]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Option<Vec<RecordId>>> for TargetIds {
    fn from(value: Option<Vec<RecordId>>) -> Self {
        Self(value.unwrap_or_default())
    }
}

/// A declared reference kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// Surrogate key used by the admin screen for update/delete
    pub internal_id: InternalId,
    /// External name; namespaces the attachment meta key
    pub key: RelationKey,
    /// Editor field label
    pub title: String,
    /// Type of record the field is offered on
    pub source_type: String,
    /// Types that may be attached; empty means any
    pub target_types: TypeList,
}

impl RelationDefinition {
    pub fn meta_key(&self) -> String {
        self.key.meta_key()
    }

    pub fn applies_to(&self, record_type: &str) -> bool {
        self.source_type == record_type
    }
}

/// Why a registry write was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "value", rename_all = "snake_case")]
pub enum RejectReason {
    UnknownSourceType(String),
    EmptyTargetTypes,
    UnknownTargetType(String),
    InvalidKey(String),
    EmptyTitle,
    DuplicateKey { source_type: String, key: String },
    NotFound(InternalId),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnknownSourceType(t) => write!(f, "Content type '{}' does not exist", t),
            RejectReason::EmptyTargetTypes => write!(f, "At least one referenced type is required"),
            RejectReason::UnknownTargetType(t) => write!(f, "Referenced type '{}' does not exist", t),
            RejectReason::InvalidKey(k) => write!(f, "Meta key contains invalid chars: '{}'", k),
            RejectReason::EmptyTitle => write!(f, "Metabox title is empty!"),
            RejectReason::DuplicateKey { source_type, key } => {
                write!(f, "Reference '{}' already exists for '{}'", key, source_type)
            }
            RejectReason::NotFound(id) => write!(f, "Reference #{} not found", id),
        }
    }
}

/// Result of a registry write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created(InternalId),
    Updated(InternalId),
    Rejected(RejectReason),
}

impl UpsertOutcome {
    /// Id of the written definition, if anything was written
    pub fn id(&self) -> Option<InternalId> {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => Some(*id),
            UpsertOutcome::Rejected(_) => None,
        }
    }
}

/// Raw input of the admin settings form for one definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionForm {
    pub title: String,
    pub source_type: String,
    /// Unvalidated key as typed by the administrator
    pub key: String,
    pub target_types: TypeList,
}
