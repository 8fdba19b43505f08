//! Admin settings screen for reference definitions
//!
//! Two form kinds post back to the same page:
//! - `add_new_reference` creates a definition
//! - `manage_reference` updates or deletes the definition named by `ref_index`

use serde::Serialize;
use crate::registry::RelationRegistry;
use crate::relation::{DefinitionForm, InternalId, RelationDefinition, TypeList, UpsertOutcome};
use crate::render::html::{escape, SelectField, SelectOption};
use crate::storage::SqliteStore;
use crate::Result;

/// Which submit button was pressed on a manage form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManageButton {
    Update,
    Delete,
}

/// A parsed settings-screen submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    AddNew(DefinitionForm),
    Manage {
        index: InternalId,
        button: ManageButton,
        form: DefinitionForm,
    },
}

impl AdminAction {
    /// Parse posted name/value pairs; `None` when the post is not a settings action
    pub fn from_pairs(pairs: &[(String, String)]) -> Option<Self> {
        let value = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .unwrap_or("")
        };
        let target_types: Vec<String> = pairs
            .iter()
            .filter(|(k, v)| (k == "linked_post[]" || k == "linked_post") && !v.is_empty())
            .map(|(_, v)| v.clone())
            .collect();
        let form = DefinitionForm {
            title: value("ref_title").to_string(),
            source_type: value("ref_post").to_string(),
            key: value("ref_id").to_string(),
            target_types: TypeList::new(target_types),
        };

        match value("action") {
            "add_new_reference" => Some(AdminAction::AddNew(form)),
            "manage_reference" => {
                let Ok(index) = value("ref_index").trim().parse::<InternalId>() else {
                    tracing::warn!("Manage request with bad index '{}'", value("ref_index"));
                    return None;
                };
                let button = match value("sbm") {
                    "Update" => ManageButton::Update,
                    "Delete" => ManageButton::Delete,
                    other => {
                        tracing::warn!("Manage request with unknown button '{}'", other);
                        return None;
                    }
                };
                Some(AdminAction::Manage { index, button, form })
            }
            "" => None,
            other => {
                tracing::debug!("Ignoring admin action '{}'", other);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Message shown above the settings page after a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }

    pub fn html(&self) -> String {
        let class = match self.kind {
            NoticeKind::Success => "updated",
            NoticeKind::Error => "error",
        };
        format!(
            r#"<div id="message" class="{} notice is-dismissible"><p>{}</p></div>"#,
            class,
            escape(&self.message)
        )
    }

    fn from_outcome(outcome: &UpsertOutcome, done: &str) -> Self {
        match outcome {
            UpsertOutcome::Rejected(reason) => Notice::error(reason.to_string()),
            _ => Notice::success(done),
        }
    }
}

/// The references settings page
pub struct SettingsScreen<'a> {
    registry: RelationRegistry<'a>,
}

impl<'a> SettingsScreen<'a> {
    pub fn new(registry: RelationRegistry<'a>) -> Self {
        Self { registry }
    }

    pub fn open(store: &'a SqliteStore) -> Self {
        Self::new(RelationRegistry::open(store))
    }

    /// Apply one submission
    pub fn handle(&self, action: &AdminAction) -> Result<Notice> {
        let notice = match action {
            AdminAction::AddNew(form) => {
                let outcome = self.registry.add(form)?;
                Notice::from_outcome(&outcome, "Reference added.")
            }
            AdminAction::Manage {
                index,
                button: ManageButton::Update,
                form,
            } => {
                let outcome = self.registry.update_by_id(*index, form)?;
                Notice::from_outcome(&outcome, "Reference updated.")
            }
            AdminAction::Manage {
                index,
                button: ManageButton::Delete,
                ..
            } => {
                if self.registry.delete_by_id(*index)? {
                    Notice::success("Reference deleted.")
                } else {
                    Notice::error(format!("Reference #{} not found", index))
                }
            }
        };
        Ok(notice)
    }

    /// Full settings page, with an optional notice on top
    pub fn render(&self, notice: Option<&Notice>) -> Result<String> {
        let settings = self.registry.config().load()?;
        let types: Vec<SelectOption> = self
            .registry
            .config()
            .host()
            .list_types(true)?
            .into_iter()
            .map(|t| SelectOption::new(t.name, t.label))
            .collect();

        let mut html = String::from(r#"<div class="wrap"><h2>References settings</h2>"#);
        if let Some(notice) = notice {
            html.push_str(&notice.html());
        }

        if !settings.refs.is_empty() {
            html.push_str("<h3>Existing references.</h3>");
            for def in settings.definitions() {
                html.push_str(&manage_form(def, &types));
            }
        }

        html.push_str("<h3>Add new reference.</h3><p>Connect different types of publications.</p>");
        html.push_str(&add_form(settings.next_id, &types));
        html.push_str("</div>");
        Ok(html)
    }
}

fn manage_form(def: &RelationDefinition, types: &[SelectOption]) -> String {
    let source = SelectField::new("ref_post", types.to_vec()).selected([def.source_type.as_str()]);
    let targets = SelectField::new("linked_post", types.to_vec())
        .multiple()
        .selected(def.target_types.iter());
    format!(
        concat!(
            r#"<div class="refer"><form method="post">"#,
            r#"<p><b>Metabox Title *:</b><br /><input size="35" name="ref_title" type="text" value="{title}"></p>"#,
            r#"<p><b>Content type:</b><br />{source}</p>"#,
            r#"<p><b>Used meta key:</b> _ref_<input size="10" type="text" name="ref_id" value="{key}"></p>"#,
            r#"<input type="hidden" name="ref_index" value="{index}" />"#,
            r#"<input type="hidden" name="action" value="manage_reference" />"#,
            r#"<input type="submit" class="button-primary" name="sbm" value="Update" />"#,
            r#"<input type="submit" class="button-primary" name="sbm" value="Delete" />"#,
            r#"<p><b>Referenced post types:</b><br />{targets}</p>"#,
            r#"</form></div>"#,
        ),
        title = escape(&def.title),
        source = source.render(),
        key = escape(def.key.as_str()),
        index = def.internal_id,
        targets = targets.render(),
    )
}

fn add_form(next_id: InternalId, types: &[SelectOption]) -> String {
    let source = SelectField::new("ref_post", types.to_vec());
    let targets = SelectField::new("linked_post", types.to_vec()).multiple();
    format!(
        concat!(
            r#"<div class="refer"><form method="post">"#,
            r#"<p><b>Metabox Title *:</b><br /><input size="35" name="ref_title" type="text" value=""></p>"#,
            r#"<p><b>Add references metabox to editor of:</b><br />{source}</p>"#,
            r#"<p><b>Use meta key:</b> _ref_<input size="10" type="text" name="ref_id" value="{next}"></p>"#,
            r#"<input type="hidden" name="action" value="add_new_reference" />"#,
            r#"<input type="submit" class="button-primary" name="sbm" value="Add" />"#,
            r#"<p><b>To allow to connect only next types of articles:</b><br />"#,
            r#"Don't select any type if you need references to any type of records.<br />{targets}</p>"#,
            r#"</form></div>"#,
        ),
        source = source.render(),
        next = next_id,
        targets = targets.render(),
    )
}
