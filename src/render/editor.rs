//! Edit-screen fields
//!
//! One multi-select per relation that applies to the record's type.
//! Saving replaces every applicable list; a field missing from the
//! submission is stored as an empty list.

use serde::Serialize;
use crate::attachment::AttachmentStore;
use crate::content::RecordId;
use crate::nonce::{NonceIssuer, EDITOR_NONCE_ACTION, EDITOR_NONCE_FIELD};
use crate::relation::{RelationKey, TargetIds};
use crate::Result;
use super::html::{escape, SelectField, SelectOption};

/// Form field flagging an automatic background save
pub const AUTOSAVE_FIELD: &str = "autosave";

/// A submitted edit form, as name/value pairs
#[derive(Debug, Clone, Default)]
pub struct EditorSubmission {
    pairs: Vec<(String, String)>,
}

impl EditorSubmission {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_autosave(&self) -> bool {
        self.value(AUTOSAVE_FIELD).is_some_and(|v| v == "1" || v == "true")
    }

    pub fn nonce(&self) -> Option<&str> {
        self.value(EDITOR_NONCE_FIELD)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Ids posted for `meta_key` (as `meta_key[]` or `meta_key`); unparsable values are dropped
    pub fn ids(&self, meta_key: &str) -> TargetIds {
        let list_name = format!("{}[]", meta_key);
        let ids: Vec<RecordId> = self
            .pairs
            .iter()
            .filter(|(k, _)| *k == list_name || k == meta_key)
            .filter(|(_, v)| !v.trim().is_empty())
            .filter_map(|(_, v)| match v.trim().parse::<RecordId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!("Ignoring non-numeric value '{}' for {}", v, meta_key);
                    None
                }
            })
            .collect();
        ids.into()
    }
}

/// Why a save did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Autosave,
    EmptySubmission,
    BadNonce,
    RecordMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// `fields` attachment lists were replaced
    Saved { fields: usize },
    Skipped(SkipReason),
}

/// Rendered field for one relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorBox {
    pub key: RelationKey,
    pub title: String,
    pub html: String,
}

/// Edit-screen reference fields for records
pub struct EditorForm<'a> {
    attachments: AttachmentStore<'a>,
    nonces: &'a NonceIssuer,
}

impl<'a> EditorForm<'a> {
    pub fn new(attachments: AttachmentStore<'a>, nonces: &'a NonceIssuer) -> Self {
        Self { attachments, nonces }
    }

    /// One box per applicable relation; `None` when the record is missing
    pub fn boxes(&self, record_id: RecordId) -> Result<Option<Vec<EditorBox>>> {
        let host = self.attachments.registry().config().host();
        let Some(record) = host.get_record(record_id)? else {
            return Ok(None);
        };

        let mut boxes = Vec::new();
        for def in self.attachments.registry().for_type(&record.record_type)? {
            let candidates = host.published_candidates(&def.target_types)?;
            let current = self.attachments.get(record_id, &def.key)?;
            let options = candidates
                .iter()
                .map(|r| SelectOption::new(r.id.to_string(), r.title.clone()))
                .collect();
            let html = SelectField::new(def.meta_key(), options)
                .multiple()
                .class("chosen")
                .placeholder("Select articles")
                .selected(current.iter())
                .render();
            boxes.push(EditorBox {
                key: def.key,
                title: def.title,
                html,
            });
        }
        Ok(Some(boxes))
    }

    /// Hidden nonce input to embed in the edit form
    pub fn nonce_field(&self) -> String {
        format!(
            r#"<input type="hidden" id="{0}" name="{0}" value="{1}" />"#,
            EDITOR_NONCE_FIELD,
            self.nonces.issue(EDITOR_NONCE_ACTION)
        )
    }

    /// All boxes plus the nonce field, as one fragment
    pub fn render(&self, record_id: RecordId) -> Result<Option<String>> {
        let Some(boxes) = self.boxes(record_id)? else {
            return Ok(None);
        };
        let mut html = self.nonce_field();
        for b in boxes {
            html.push_str(&format!(
                r#"<div class="postbox" id="reference_box_{}"><h2>{}</h2><div class="inside">{}</div></div>"#,
                escape(b.key.as_str()),
                escape(&b.title),
                b.html
            ));
        }
        Ok(Some(html))
    }

    /// Persist a submitted edit form
    pub fn save(&self, record_id: RecordId, submission: &EditorSubmission) -> Result<SaveOutcome> {
        if submission.is_autosave() {
            return Ok(SaveOutcome::Skipped(SkipReason::Autosave));
        }
        if submission.is_empty() {
            return Ok(SaveOutcome::Skipped(SkipReason::EmptySubmission));
        }
        let nonce_ok = submission
            .nonce()
            .is_some_and(|n| self.nonces.verify(EDITOR_NONCE_ACTION, n));
        if !nonce_ok {
            tracing::warn!("Rejected reference save for record {}: bad nonce", record_id);
            return Ok(SaveOutcome::Skipped(SkipReason::BadNonce));
        }

        let host = self.attachments.registry().config().host();
        let Some(record) = host.get_record(record_id)? else {
            return Ok(SaveOutcome::Skipped(SkipReason::RecordMissing));
        };

        let mut fields = 0;
        for def in self.attachments.registry().for_type(&record.record_type)? {
            let ids = submission.ids(&def.meta_key());
            self.attachments.write(record_id, &def.key, &ids)?;
            fields += 1;
        }
        Ok(SaveOutcome::Saved { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RelationRegistry;
    use crate::render::tests::site;

    fn pairs(items: &[(&str, &str)]) -> EditorSubmission {
        EditorSubmission::new(items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_submission_ids() {
        let sub = pairs(&[("_ref_related[]", "3"), ("_ref_related[]", "1"), ("_ref_related[]", "x"), ("other[]", "9")]);
        assert_eq!(&*sub.ids("_ref_related"), &[3, 1]);
        assert!(sub.ids("_ref_sources").is_empty());
    }

    #[test]
    fn test_boxes_list_candidates_and_selection() {
        let s = site();
        let nonces = NonceIssuer::new("k");
        let attachments = AttachmentStore::open(&s.store);
        attachments.set(s.article, "related", vec![s.news[1]]).unwrap();
        let form = EditorForm::new(attachments, &nonces);

        let boxes = form.boxes(s.article).unwrap().unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].title, "Related");
        // Only published news, ordered by title
        assert!(boxes[0].html.contains(&format!(r#"<option value="{}">First &lt;news&gt;</option>"#, s.news[0])));
        assert!(boxes[0].html.contains(&format!(r#"<option value="{}" selected>Second</option>"#, s.news[1])));
        assert!(!boxes[0].html.contains("Unpublished"));

        assert!(form.boxes(777).unwrap().is_none());
        let html = form.render(s.article).unwrap().unwrap();
        assert!(html.starts_with(r#"<input type="hidden" id="reference_nonce""#));
    }

    #[test]
    fn test_boxes_any_type_when_unrestricted() {
        let s = site();
        RelationRegistry::open(&s.store)
            .add(&crate::relation::DefinitionForm {
                title: "Anything".into(),
                source_type: "article".into(),
                key: "anything".into(),
                target_types: crate::relation::TypeList::any(),
            })
            .unwrap();
        let nonces = NonceIssuer::new("k");
        let form = EditorForm::new(AttachmentStore::open(&s.store), &nonces);
        let boxes = form.boxes(s.article).unwrap().unwrap();
        // Host article is published and offered too
        assert!(boxes[2].html.contains(">Host<"));
    }

    #[test]
    fn test_save_full_replace() {
        let s = site();
        let nonces = NonceIssuer::new("k");
        let attachments = AttachmentStore::open(&s.store);
        attachments.set(s.article, "sources", vec![s.news[0]]).unwrap();
        let form = EditorForm::new(attachments, &nonces);

        let nonce = nonces.issue(EDITOR_NONCE_ACTION);
        let first = s.news[0].to_string();
        let second = s.news[1].to_string();
        let sub = pairs(&[
            (EDITOR_NONCE_FIELD, nonce.as_str()),
            ("_ref_related[]", first.as_str()),
            ("_ref_related[]", second.as_str()),
        ]);
        assert_eq!(form.save(s.article, &sub).unwrap(), SaveOutcome::Saved { fields: 2 });

        let check = AttachmentStore::open(&s.store);
        let all = check.get_all(s.article).unwrap().unwrap();
        assert_eq!(&**all.get("related").unwrap(), &[s.news[0], s.news[1]]);
        // Missing field is stored as empty
        assert!(all.get("sources").unwrap().is_empty());
        assert_eq!(s.store.get_meta(s.article, "_ref_sources").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_save_skips() {
        let s = site();
        let nonces = NonceIssuer::new("k");
        let form = EditorForm::new(AttachmentStore::open(&s.store), &nonces);
        let nonce = nonces.issue(EDITOR_NONCE_ACTION);

        assert_eq!(
            form.save(s.article, &EditorSubmission::default()).unwrap(),
            SaveOutcome::Skipped(SkipReason::EmptySubmission)
        );
        assert_eq!(
            form.save(s.article, &pairs(&[(AUTOSAVE_FIELD, "1"), (EDITOR_NONCE_FIELD, nonce.as_str())])).unwrap(),
            SaveOutcome::Skipped(SkipReason::Autosave)
        );
        assert_eq!(
            form.save(s.article, &pairs(&[(EDITOR_NONCE_FIELD, "forged"), ("_ref_related[]", "1")])).unwrap(),
            SaveOutcome::Skipped(SkipReason::BadNonce)
        );
        assert_eq!(
            form.save(s.article, &pairs(&[("_ref_related[]", "1")])).unwrap(),
            SaveOutcome::Skipped(SkipReason::BadNonce)
        );
        assert_eq!(
            form.save(999, &pairs(&[(EDITOR_NONCE_FIELD, nonce.as_str())])).unwrap(),
            SaveOutcome::Skipped(SkipReason::RecordMissing)
        );
        assert_eq!(s.store.count_meta().unwrap(), 0);
    }
}
