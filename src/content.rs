//! Content types - the host platform's records
//!
//! Records are the publishable units that references point between:
//! - `ContentType`: a registered kind of record (article, news, page, ...)
//! - `Record`: one piece of content with a type, a title and a publish status

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Record identifier as assigned by the host storage
pub type RecordId = i64;

/// Publish status of a record.
///
/// Only `Publish` records are rendered on the front end or offered as
/// candidates in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Publish,
    Draft,
    Pending,
    Private,
    Trash,
}

impl PublishStatus {
    /// Get the string representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Publish => "publish",
            PublishStatus::Draft => "draft",
            PublishStatus::Pending => "pending",
            PublishStatus::Private => "private",
            PublishStatus::Trash => "trash",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishStatus::Publish)
    }
}

impl FromStr for PublishStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "publish" | "published" => Ok(PublishStatus::Publish),
            "draft" => Ok(PublishStatus::Draft),
            "pending" => Ok(PublishStatus::Pending),
            "private" => Ok(PublishStatus::Private),
            "trash" | "trashed" => Ok(PublishStatus::Trash),
            _ => Err(Error::InvalidValue(format!("Unknown publish status: {}", s))),
        }
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A content type registered with the host platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    /// Machine name, e.g. `article`
    pub name: String,
    /// Human label shown in admin screens
    pub label: String,
    /// Whether the type shows up in admin selectors
    pub show_ui: bool,
}

impl ContentType {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            show_ui: true,
        }
    }

    /// Hide the type from admin selectors
    pub fn hidden(mut self) -> Self {
        self.show_ui = false;
        self
    }
}

/// A content record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Name of the record's content type
    pub record_type: String,
    pub title: String,
    pub slug: String,
    pub status: PublishStatus,
    /// Content body; may contain inline `[ref]` tags
    #[serde(default)]
    pub body: String,
}

impl Record {
    /// Build a record that has not been stored yet (id is assigned on insert)
    pub fn draft(record_type: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        let slug = slugify(&title);
        Self {
            id: 0,
            record_type: record_type.into(),
            title,
            slug,
            status: PublishStatus::Draft,
            body: String::new(),
        }
    }

    /// Same as [`Record::draft`] but already published
    pub fn published(record_type: impl Into<String>, title: impl Into<String>) -> Self {
        let mut record = Self::draft(record_type, title);
        record.status = PublishStatus::Publish;
        record
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_published(&self) -> bool {
        self.status.is_published()
    }
}

/// Lowercase, dash-separated form of a title
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("publish".parse::<PublishStatus>().unwrap(), PublishStatus::Publish);
        assert_eq!("Published".parse::<PublishStatus>().unwrap(), PublishStatus::Publish);
        assert_eq!("draft".parse::<PublishStatus>().unwrap(), PublishStatus::Draft);
        assert!("archived".parse::<PublishStatus>().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust  2024 "), "rust-2024");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_published_constructor() {
        let record = Record::published("news", "Launch Day");
        assert!(record.is_published());
        assert_eq!(record.slug, "launch-day");
        assert_eq!(record.id, 0);
    }
}
