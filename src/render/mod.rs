//! Render layer - link lists for attached records
//!
//! Three adapters share one core:
//! - `shortcode`: the inline `[ref]` tag expanded inside content bodies
//! - `widget`: a sidebar block bound to one relation
//! - `editor`: the per-record multi-select fields on the edit screen
//!
//! The core resolves a record's attachments, keeps the published targets,
//! passes them through [`RenderHooks`] and formats one `<ul>` per relation.

pub mod editor;
pub mod html;
pub mod shortcode;
pub mod widget;

use serde::Serialize;
use crate::attachment::AttachmentStore;
use crate::content::{Record, RecordId};
use crate::relation::RelationKey;
use crate::storage::SqliteStore;
use crate::Result;

pub use editor::{EditorForm, EditorSubmission, SaveOutcome, SkipReason};
pub use shortcode::InlineTag;
pub use widget::{PageContext, WidgetChrome, WidgetInstance};

/// A rendered link to one target record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkItem {
    pub id: RecordId,
    pub title: String,
    pub record_type: String,
    pub permalink: String,
}

/// Builds public URLs for records
#[derive(Debug, Clone)]
pub struct Permalinks {
    site_url: String,
}

impl Permalinks {
    pub fn new(site_url: impl Into<String>) -> Self {
        let site_url = site_url.into();
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn record(&self, id: RecordId) -> String {
        format!("{}/records/{}", self.site_url, id)
    }

    pub fn item(&self, record: &Record) -> LinkItem {
        LinkItem {
            id: record.id,
            title: record.title.clone(),
            record_type: record.record_type.clone(),
            permalink: self.record(record.id),
        }
    }
}

/// Customization points, both keyed by relation key
pub trait RenderHooks {
    /// Adjust the fetched target list before it is formatted
    fn filter_items(&self, _key: &RelationKey, items: Vec<LinkItem>) -> Vec<LinkItem> {
        items
    }

    /// Adjust one relation's formatted markup
    fn filter_output(&self, _key: &RelationKey, html: String) -> String {
        html
    }
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl RenderHooks for NoHooks {}

/// Published targets of one relation, after hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceBlock {
    pub key: RelationKey,
    pub items: Vec<LinkItem>,
}

/// Shared rendering core
pub struct ListRenderer<'a> {
    attachments: AttachmentStore<'a>,
    links: Permalinks,
    hooks: &'a dyn RenderHooks,
}

impl<'a> ListRenderer<'a> {
    pub fn new(store: &'a SqliteStore, links: Permalinks, hooks: &'a dyn RenderHooks) -> Self {
        Self {
            attachments: AttachmentStore::open(store),
            links,
            hooks,
        }
    }

    pub fn attachments(&self) -> &AttachmentStore<'a> {
        &self.attachments
    }

    pub fn hooks(&self) -> &'a dyn RenderHooks {
        self.hooks
    }

    /// Published targets among `ids` as link items, after the items hook
    pub fn items(&self, key: &RelationKey, ids: &[RecordId]) -> Result<Vec<LinkItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let host = self.attachments.registry().config().host();
        let items = host
            .published_by_ids(ids)?
            .iter()
            .map(|r| self.links.item(r))
            .collect();
        Ok(self.hooks.filter_items(key, items))
    }

    /// Non-empty blocks for `record_id`, optionally only for `key`
    pub fn blocks(&self, record_id: RecordId, key: Option<&str>) -> Result<Vec<ReferenceBlock>> {
        let Some(mut attachments) = self.attachments.get_all(record_id)? else {
            return Ok(Vec::new());
        };
        if let Some(key) = key {
            attachments = attachments.only(key);
        }

        let mut blocks = Vec::new();
        for (key, ids) in attachments.iter() {
            if ids.is_empty() {
                continue;
            }
            let items = self.items(key, ids)?;
            if items.is_empty() {
                continue;
            }
            blocks.push(ReferenceBlock { key: key.clone(), items });
        }
        Ok(blocks)
    }

    /// One classed `<ul>` per non-empty relation, after the output hook
    pub fn render(&self, record_id: RecordId, key: Option<&str>) -> Result<String> {
        let mut output = String::new();
        for block in self.blocks(record_id, key)? {
            let class = format!("reference-list-{}", block.key);
            let html = link_list(Some(&class), &block.items);
            output.push_str(&self.hooks.filter_output(&block.key, html));
        }
        Ok(output)
    }
}

/// Format items as `<ul><li><a href=…>title</a></li>…</ul>`
pub fn link_list(class: Option<&str>, items: &[LinkItem]) -> String {
    let mut html = match class {
        Some(class) => format!(r#"<ul class="{}">"#, html::escape(class)),
        None => String::from("<ul>"),
    };
    for item in items {
        html.push_str(&format!(
            r#"<li><a href="{}">{}</a></li>"#,
            html::escape(&item.permalink),
            html::escape(&item.title)
        ));
    }
    html.push_str("</ul>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentType, PublishStatus, Record};
    use crate::registry::RelationRegistry;

    pub(crate) struct Site {
        pub store: SqliteStore,
        pub article: RecordId,
        pub news: Vec<RecordId>,
    }

    pub(crate) fn site() -> Site {
        let store = SqliteStore::open_in_memory().unwrap();
        for name in ["article", "news"] {
            store.register_type(&ContentType::new(name, name)).unwrap();
        }
        let registry = RelationRegistry::open(&store);
        registry.upsert("article", "related", "news", "Related").unwrap();
        registry.upsert("article", "sources", "news", "Sources").unwrap();

        let article = store.insert_record(&Record::published("article", "Host")).unwrap();
        let news = vec![
            store.insert_record(&Record::published("news", "First <news>")).unwrap(),
            store.insert_record(&Record::published("news", "Second")).unwrap(),
            store.insert_record(&Record::draft("news", "Unpublished")).unwrap(),
        ];
        Site { store, article, news }
    }

    struct Reverse;

    impl RenderHooks for Reverse {
        fn filter_items(&self, key: &RelationKey, mut items: Vec<LinkItem>) -> Vec<LinkItem> {
            if *key == "related" {
                items.reverse();
            }
            items
        }

        fn filter_output(&self, key: &RelationKey, html: String) -> String {
            format!("<div data-key=\"{}\">{}</div>", key, html)
        }
    }

    #[test]
    fn test_render_published_only_and_escaped() {
        let s = site();
        AttachmentStore::open(&s.store).set(s.article, "related", s.news.clone()).unwrap();

        let renderer = ListRenderer::new(&s.store, Permalinks::new("http://example.test/"), &NoHooks);
        let html = renderer.render(s.article, None).unwrap();
        assert_eq!(
            html,
            format!(
                r#"<ul class="reference-list-related"><li><a href="http://example.test/records/{}">First &lt;news&gt;</a></li><li><a href="http://example.test/records/{}">Second</a></li></ul>"#,
                s.news[0], s.news[1]
            )
        );
    }

    #[test]
    fn test_empty_state_renders_nothing() {
        let s = site();
        let renderer = ListRenderer::new(&s.store, Permalinks::new("http://x"), &NoHooks);
        assert_eq!(renderer.render(s.article, None).unwrap(), "");
        assert!(renderer.blocks(s.article, None).unwrap().is_empty());
        assert_eq!(renderer.render(4242, None).unwrap(), "");
    }

    #[test]
    fn test_unpublished_only_suppresses_block() {
        let s = site();
        AttachmentStore::open(&s.store).set(s.article, "related", vec![s.news[2]]).unwrap();
        let renderer = ListRenderer::new(&s.store, Permalinks::new("http://x"), &NoHooks);
        assert_eq!(renderer.render(s.article, None).unwrap(), "");

        s.store.set_status(s.news[2], PublishStatus::Publish).unwrap();
        assert!(renderer.render(s.article, None).unwrap().contains("Unpublished"));
    }

    #[test]
    fn test_key_filter() {
        let s = site();
        let attachments = AttachmentStore::open(&s.store);
        attachments.set(s.article, "related", vec![s.news[0]]).unwrap();
        attachments.set(s.article, "sources", vec![s.news[1]]).unwrap();

        let renderer = ListRenderer::new(&s.store, Permalinks::new("http://x"), &NoHooks);
        let all = renderer.render(s.article, None).unwrap();
        assert!(all.contains("reference-list-related") && all.contains("reference-list-sources"));

        let only = renderer.render(s.article, Some("sources")).unwrap();
        assert!(!only.contains("reference-list-related"));
        assert!(only.contains("Second"));
    }

    #[test]
    fn test_hooks_keyed_by_relation() {
        let s = site();
        let attachments = AttachmentStore::open(&s.store);
        attachments.set(s.article, "related", vec![s.news[0], s.news[1]]).unwrap();
        attachments.set(s.article, "sources", vec![s.news[0], s.news[1]]).unwrap();

        let renderer = ListRenderer::new(&s.store, Permalinks::new("http://x"), &Reverse);
        let blocks = renderer.blocks(s.article, None).unwrap();
        assert_eq!(blocks[0].items[0].id, s.news[1]);
        assert_eq!(blocks[1].items[0].id, s.news[0]);

        let html = renderer.render(s.article, None).unwrap();
        assert!(html.starts_with(r#"<div data-key="related"><ul class="reference-list-related">"#));
        assert_eq!(html.matches("<div data-key=").count(), 2);
    }
}
