//! Relation registry
//!
//! Query and write API over the settings blob. Two write paths exist:
//! - the programmatic `upsert`/`remove` pair, keyed by `(source_type, key)`,
//!   which checks that every named content type exists
//! - the admin-form `add`/`update_by_id`/`delete_by_id` trio, keyed by
//!   internal id, which checks title and key but not type existence

use crate::relation::{
    DefinitionForm, InternalId, RejectReason, RelationDefinition, RelationKey, TypeList,
    UpsertOutcome,
};
use crate::settings::{ConfigStore, ReferenceSettings};
use crate::storage::SqliteStore;
use crate::Result;

/// Exact-match filter over definitions; unset fields match everything
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionFilter<'f> {
    pub source_type: Option<&'f str>,
    pub key: Option<&'f str>,
}

impl<'f> DefinitionFilter<'f> {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn source_type(mut self, source_type: &'f str) -> Self {
        self.source_type = Some(source_type);
        self
    }

    pub fn key(mut self, key: &'f str) -> Self {
        self.key = Some(key);
        self
    }

    pub fn matches(&self, def: &RelationDefinition) -> bool {
        self.source_type.is_none_or(|t| def.source_type == t)
            && self.key.is_none_or(|k| def.key == k)
    }
}

/// Registry of relation definitions
pub struct RelationRegistry<'a> {
    config: ConfigStore<'a>,
}

impl<'a> RelationRegistry<'a> {
    pub fn new(config: ConfigStore<'a>) -> Self {
        Self { config }
    }

    /// Registry backed by the settings blob in `store`
    pub fn open(store: &'a SqliteStore) -> Self {
        Self::new(ConfigStore::new(store))
    }

    pub fn config(&self) -> ConfigStore<'a> {
        self.config
    }

    /// Definitions matching `filter`, in insertion order
    pub fn list(&self, filter: DefinitionFilter<'_>) -> Result<Vec<RelationDefinition>> {
        let settings = self.config.load()?;
        Ok(settings.definitions().filter(|d| filter.matches(d)).cloned().collect())
    }

    /// Definitions offered on records of `source_type`
    pub fn for_type(&self, source_type: &str) -> Result<Vec<RelationDefinition>> {
        self.list(DefinitionFilter::all().source_type(source_type))
    }

    /// Look up a definition by internal id
    pub fn get(&self, id: InternalId) -> Result<Option<RelationDefinition>> {
        Ok(self.config.load()?.refs.get(&id).cloned())
    }

    /// Create or update the definition for `(source_type, key)`.
    ///
    /// `source_type` and every target type must exist, and at least one
    /// target type is required.
    pub fn upsert(
        &self,
        source_type: &str,
        key: &str,
        target_types: impl Into<TypeList>,
        title: &str,
    ) -> Result<UpsertOutcome> {
        let host = self.config.host();
        let target_types = target_types.into();

        if !host.type_exists(source_type)? {
            return Ok(reject(RejectReason::UnknownSourceType(source_type.to_string())));
        }
        let Ok(key) = RelationKey::new(key) else {
            return Ok(reject(RejectReason::InvalidKey(key.to_string())));
        };
        if target_types.is_empty() {
            return Ok(reject(RejectReason::EmptyTargetTypes));
        }
        for target in target_types.iter() {
            if !host.type_exists(target)? {
                return Ok(reject(RejectReason::UnknownTargetType(target.clone())));
            }
        }

        let mut settings = self.config.load()?;
        let existing = settings
            .definitions()
            .find(|d| d.source_type == source_type && d.key == key)
            .map(|d| d.internal_id);

        let outcome = match existing.and_then(|id| settings.refs.get_mut(&id)) {
            Some(def) => {
                def.title = title.to_string();
                def.target_types = target_types;
                tracing::info!("Updated reference {} ({}/{})", def.internal_id, source_type, key);
                UpsertOutcome::Updated(def.internal_id)
            }
            None => {
                let id = settings.allocate_id();
                settings.refs.insert(
                    id,
                    RelationDefinition {
                        internal_id: id,
                        key: key.clone(),
                        title: title.to_string(),
                        source_type: source_type.to_string(),
                        target_types,
                    },
                );
                tracing::info!("Created reference {} ({}/{})", id, source_type, key);
                UpsertOutcome::Created(id)
            }
        };

        self.config.save(&settings)?;
        Ok(outcome)
    }

    /// Delete every definition for `(source_type, key)`. Attachment data is left in place.
    pub fn remove(&self, source_type: &str, key: &str) -> Result<usize> {
        let mut settings = self.config.load()?;
        let filter = DefinitionFilter::all().source_type(source_type).key(key);
        let before = settings.refs.len();
        settings.refs.retain(|_, d| !filter.matches(d));
        let removed = before - settings.refs.len();

        if removed > 0 {
            self.config.save(&settings)?;
            tracing::info!("Removed {} reference(s) for {}/{}", removed, source_type, key);
        }
        Ok(removed)
    }

    /// Admin form "add": allocate a new definition.
    ///
    /// Content types named by the form are not checked for existence.
    pub fn add(&self, form: &DefinitionForm) -> Result<UpsertOutcome> {
        let mut settings = self.config.load()?;
        let key = match validate_form(form, &settings, None) {
            Ok(key) => key,
            Err(reason) => return Ok(reject(reason)),
        };
        self.warn_unknown_types(form)?;

        let id = settings.allocate_id();
        settings.refs.insert(
            id,
            RelationDefinition {
                internal_id: id,
                key,
                title: form.title.trim().to_string(),
                source_type: form.source_type.clone(),
                target_types: form.target_types.clone(),
            },
        );
        self.config.save(&settings)?;
        tracing::info!("Added reference {} ({}/{})", id, form.source_type, form.key);
        Ok(UpsertOutcome::Created(id))
    }

    /// Admin form "Update": overwrite the definition with internal id `id`
    pub fn update_by_id(&self, id: InternalId, form: &DefinitionForm) -> Result<UpsertOutcome> {
        let mut settings = self.config.load()?;
        if !settings.refs.contains_key(&id) {
            return Ok(reject(RejectReason::NotFound(id)));
        }
        let key = match validate_form(form, &settings, Some(id)) {
            Ok(key) => key,
            Err(reason) => return Ok(reject(reason)),
        };
        self.warn_unknown_types(form)?;

        settings.refs.insert(
            id,
            RelationDefinition {
                internal_id: id,
                key,
                title: form.title.trim().to_string(),
                source_type: form.source_type.clone(),
                target_types: form.target_types.clone(),
            },
        );
        self.config.save(&settings)?;
        tracing::info!("Updated reference {} ({}/{})", id, form.source_type, form.key);
        Ok(UpsertOutcome::Updated(id))
    }

    /// Admin form "Delete": drop the definition with internal id `id`.
    ///
    /// Remaining ids are not renumbered.
    pub fn delete_by_id(&self, id: InternalId) -> Result<bool> {
        let mut settings = self.config.load()?;
        let removed = settings.refs.remove(&id);
        if let Some(def) = &removed {
            self.config.save(&settings)?;
            tracing::info!("Deleted reference {} ({}/{})", id, def.source_type, def.key);
        }
        Ok(removed.is_some())
    }

    fn warn_unknown_types(&self, form: &DefinitionForm) -> Result<()> {
        let host = self.config.host();
        for name in std::iter::once(&form.source_type).chain(form.target_types.iter()) {
            if !host.type_exists(name)? {
                tracing::warn!("Reference '{}' names unknown content type '{}'", form.key, name);
            }
        }
        Ok(())
    }
}

fn reject(reason: RejectReason) -> UpsertOutcome {
    tracing::debug!("Rejected reference write: {}", reason);
    UpsertOutcome::Rejected(reason)
}

/// Checks shared by the admin add/update paths. `editing` excludes the
/// definition being updated from the duplicate check.
fn validate_form(
    form: &DefinitionForm,
    settings: &ReferenceSettings,
    editing: Option<InternalId>,
) -> std::result::Result<RelationKey, RejectReason> {
    if form.title.trim().is_empty() {
        return Err(RejectReason::EmptyTitle);
    }
    let key = RelationKey::new(form.key.trim()).map_err(|_| RejectReason::InvalidKey(form.key.clone()))?;

    let duplicate = settings.definitions().any(|d| {
        Some(d.internal_id) != editing && d.source_type == form.source_type && d.key == key
    });
    if duplicate {
        return Err(RejectReason::DuplicateKey {
            source_type: form.source_type.clone(),
            key: key.to_string(),
        });
    }
    Ok(key)
}
