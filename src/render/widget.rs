//! Sidebar widget bound to one relation

use serde::{Deserialize, Serialize};
use crate::content::RecordId;
use crate::relation::RelationDefinition;
use crate::Result;
use super::html::{escape, strip_tags};
use super::{link_list, ListRenderer};

/// What the front end is currently showing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageContext {
    /// A single-record view (as opposed to an archive or listing)
    pub singular: bool,
    pub record_id: Option<RecordId>,
}

impl PageContext {
    pub fn single(record_id: RecordId) -> Self {
        Self {
            singular: true,
            record_id: Some(record_id),
        }
    }

    pub fn listing() -> Self {
        Self::default()
    }
}

/// Theme-provided markup wrapped around every widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetChrome {
    pub before_widget: String,
    pub after_widget: String,
    pub before_title: String,
    pub after_title: String,
}

impl Default for WidgetChrome {
    fn default() -> Self {
        Self {
            before_widget: r#"<section class="widget referenceslist_widget">"#.to_string(),
            after_widget: "</section>".to_string(),
            before_title: r#"<h2 class="widget-title">"#.to_string(),
            after_title: "</h2>".to_string(),
        }
    }
}

/// Saved settings of one widget instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetInstance {
    #[serde(default)]
    pub title: String,
    /// Free text shown above the list
    #[serde(default)]
    pub message: String,
    /// Selected relation as its meta key, `_ref_<key>`
    #[serde(default, rename = "ref")]
    pub ref_field: String,
}

impl WidgetInstance {
    /// Sanitize submitted settings; markup is stripped from every field
    pub fn update(submitted: &WidgetInstance) -> Self {
        Self {
            title: strip_tags(&submitted.title),
            message: strip_tags(&submitted.message),
            ref_field: strip_tags(&submitted.ref_field),
        }
    }

    /// Front-end output, or `None` when the widget has nothing to show
    pub fn render(
        &self,
        renderer: &ListRenderer<'_>,
        page: PageContext,
        chrome: &WidgetChrome,
    ) -> Result<Option<String>> {
        if !page.singular {
            return Ok(None);
        }
        let Some(record_id) = page.record_id else {
            return Ok(None);
        };
        let host = renderer.attachments().registry().config().host();
        let Some(record) = host.get_record(record_id)? else {
            return Ok(None);
        };

        let definitions = renderer.attachments().registry().for_type(&record.record_type)?;
        let Some(def) = definitions.into_iter().find(|d| d.meta_key() == self.ref_field) else {
            tracing::debug!(
                "Widget relation {} does not apply to type {}",
                self.ref_field,
                record.record_type
            );
            return Ok(None);
        };

        let ids = renderer.attachments().get(record_id, &def.key)?;
        let items = renderer.items(&def.key, &ids)?;
        if items.is_empty() {
            return Ok(None);
        }

        let mut html = String::new();
        html.push_str(&chrome.before_widget);
        if !self.title.is_empty() {
            html.push_str(&chrome.before_title);
            html.push_str(&escape(&self.title));
            html.push_str(&chrome.after_title);
        }
        html.push_str(&escape(&self.message));
        html.push_str(&renderer.hooks().filter_output(&def.key, link_list(None, &items)));
        html.push_str(&chrome.after_widget);
        Ok(Some(html))
    }

    /// Back-end settings form for this instance
    pub fn form_html(&self, definitions: &[RelationDefinition]) -> String {
        if definitions.is_empty() {
            return String::from(
                r#"You should create record(s) on <a href="/admin/references">References settings page</a> first."#,
            );
        }

        let mut selector = String::new();
        for def in definitions {
            let value = def.meta_key();
            let mark = if value == self.ref_field { " selected" } else { "" };
            selector.push_str(&format!(
                r#"<option{} value="{}">{} ({})</option>"#,
                mark,
                escape(&value),
                escape(&def.title),
                escape(def.key.as_str())
            ));
        }

        format!(
            concat!(
                r#"<p><label for="widget-title">Title:</label>"#,
                r#"<input class="widefat" id="widget-title" name="title" type="text" value="{}" /></p>"#,
                r#"<p><label for="widget-message">Description</label>"#,
                r#"<textarea class="widefat" rows="16" cols="20" id="widget-message" name="message">{}</textarea></p>"#,
                r#"<p><label for="widget-ref">References</label>"#,
                r#"<select class="widefat" id="widget-ref" name="ref">{}</select></p>"#,
            ),
            escape(&self.title),
            escape(&self.message),
            selector
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::AttachmentStore;
    use crate::registry::RelationRegistry;
    use crate::render::tests::site;
    use crate::render::{NoHooks, Permalinks};

    fn instance(ref_field: &str) -> WidgetInstance {
        WidgetInstance {
            title: "See also".into(),
            message: "Picked by the editors".into(),
            ref_field: ref_field.into(),
        }
    }

    #[test]
    fn test_update_strips_markup() {
        let cleaned = WidgetInstance::update(&WidgetInstance {
            title: "<b>Hot</b> links".into(),
            message: "<script>x</script>Read".into(),
            ref_field: "_ref_related".into(),
        });
        assert_eq!(cleaned.title, "Hot links");
        assert_eq!(cleaned.message, "xRead");
        assert_eq!(cleaned.ref_field, "_ref_related");
    }

    #[test]
    fn test_render_on_single_view() {
        let s = site();
        AttachmentStore::open(&s.store).set(s.article, "related", vec![s.news[1]]).unwrap();
        let renderer = ListRenderer::new(&s.store, Permalinks::new("http://x"), &NoHooks);
        let chrome = WidgetChrome {
            before_widget: "<aside>".into(),
            after_widget: "</aside>".into(),
            before_title: "<h3>".into(),
            after_title: "</h3>".into(),
        };

        let html = instance("_ref_related")
            .render(&renderer, PageContext::single(s.article), &chrome)
            .unwrap()
            .unwrap();
        assert_eq!(
            html,
            format!(
                r#"<aside><h3>See also</h3>Picked by the editors<ul><li><a href="http://x/records/{}">Second</a></li></ul></aside>"#,
                s.news[1]
            )
        );
    }

    #[test]
    fn test_render_nothing_cases() {
        let s = site();
        AttachmentStore::open(&s.store).set(s.article, "related", vec![s.news[2]]).unwrap();
        let renderer = ListRenderer::new(&s.store, Permalinks::new("http://x"), &NoHooks);
        let chrome = WidgetChrome::default();

        // Not a single-record view
        assert!(instance("_ref_related").render(&renderer, PageContext::listing(), &chrome).unwrap().is_none());
        // Only an unpublished target
        assert!(instance("_ref_related").render(&renderer, PageContext::single(s.article), &chrome).unwrap().is_none());
        // Nothing attached
        assert!(instance("_ref_sources").render(&renderer, PageContext::single(s.article), &chrome).unwrap().is_none());
        // Relation does not apply to the record's type
        assert!(instance("_ref_related").render(&renderer, PageContext::single(s.news[0]), &chrome).unwrap().is_none());
        // Unknown relation
        assert!(instance("_ref_nope").render(&renderer, PageContext::single(s.article), &chrome).unwrap().is_none());
    }

    #[test]
    fn test_form_html() {
        let s = site();
        let defs = RelationRegistry::open(&s.store).for_type("article").unwrap();

        let html = instance("_ref_sources").form_html(&defs);
        assert!(html.contains(r#"<option value="_ref_related">Related (related)</option>"#));
        assert!(html.contains(r#"<option selected value="_ref_sources">Sources (sources)</option>"#));
        assert!(html.contains(r#"value="See also""#));

        assert!(WidgetInstance::default().form_html(&[]).contains("References settings page"));
    }
}
