//! Inline `[ref]` tag
//!
//! `[ref]` renders every relation of the current record;
//! `[ref id="42" key="related"]` renders one record's `related` list.

use std::sync::OnceLock;
use regex::{Captures, Regex};
use crate::content::RecordId;
use crate::Result;
use super::ListRenderer;

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"\[ref(\s[^\]]*)?\]").expect("static tag pattern"))
}

fn attr_pattern() -> &'static Regex {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    ATTR.get_or_init(|| {
        Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"']+))"#).expect("static attribute pattern")
    })
}

/// Target of the record id attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRecord {
    /// No `id` given, or an empty one; use the record being rendered
    Current,
    Id(RecordId),
    /// `id` was given but is not a record id
    Invalid(String),
}

/// Parsed attributes of one tag occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTag {
    pub record: TagRecord,
    pub key: Option<String>,
}

impl InlineTag {
    /// Parse the attribute text that follows `ref`; unknown attributes are ignored
    pub fn parse(attrs: &str) -> Self {
        let mut tag = InlineTag {
            record: TagRecord::Current,
            key: None,
        };
        for caps in attr_pattern().captures_iter(attrs) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            match caps[1].to_ascii_lowercase().as_str() {
                "id" => {
                    tag.record = if value.is_empty() {
                        TagRecord::Current
                    } else {
                        match value.parse::<RecordId>() {
                            Ok(id) => TagRecord::Id(id),
                            Err(_) => TagRecord::Invalid(value),
                        }
                    };
                }
                "key" => tag.key = Some(value),
                other => tracing::debug!("Ignoring [ref] attribute '{}'", other),
            }
        }
        tag
    }

    /// Render this tag in the context of `current`
    pub fn render(&self, renderer: &ListRenderer<'_>, current: Option<RecordId>) -> Result<String> {
        let record_id = match &self.record {
            TagRecord::Id(id) => *id,
            TagRecord::Current => match current {
                Some(id) => id,
                None => return Ok(String::new()),
            },
            TagRecord::Invalid(raw) => {
                tracing::debug!("[ref] with unusable id '{}'", raw);
                return Ok(String::new());
            }
        };
        renderer.render(record_id, self.key.as_deref())
    }
}

/// Replace every `[ref …]` occurrence in `content` with its rendered lists
pub fn expand(renderer: &ListRenderer<'_>, content: &str, current: Option<RecordId>) -> Result<String> {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for caps in tag_pattern().captures_iter(content) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        out.push_str(&content[last..whole.start]);
        let tag = parse_captures(&caps);
        out.push_str(&tag.render(renderer, current)?);
        last = whole.end;
    }
    out.push_str(&content[last..]);
    Ok(out)
}

fn parse_captures(caps: &Captures<'_>) -> InlineTag {
    InlineTag::parse(caps.get(1).map(|m| m.as_str()).unwrap_or(""))
}
