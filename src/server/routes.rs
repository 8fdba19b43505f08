use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::admin::{AdminAction, Notice, SettingsScreen};
use crate::attachment::{AttachmentStore, Attachments};
use crate::content::RecordId;
use crate::nonce::NonceIssuer;
use crate::registry::{DefinitionFilter, RelationRegistry};
use crate::relation::RelationDefinition;
use crate::render::html::escape;
use crate::render::{
    shortcode, EditorForm, EditorSubmission, ListRenderer, NoHooks, PageContext, Permalinks,
    ReferenceBlock, SaveOutcome, SkipReason, WidgetChrome,
};
use crate::reverse::{ReverseIndex, ReverseLookup};
use crate::server::AppState;
use crate::storage::SqliteStore;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (status, Json(ErrorResponse { error: error.to_string() }))
}

fn internal(e: impl ToString) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
}

fn open_store(state: &AppState) -> Result<SqliteStore, ApiError> {
    SqliteStore::open(&state.database_path).map_err(internal)
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        escape(title),
        body
    )
}

#[derive(Deserialize)]
pub struct RefsParams {
    pub source_type: Option<String>,
    pub key: Option<String>,
}

#[derive(Deserialize)]
pub struct FindParams {
    /// Comma-separated referrer types
    pub types: Option<String>,
    /// Only published referrers
    pub published: Option<bool>,
}

#[derive(Serialize)]
pub struct RecordRefs {
    pub record_id: RecordId,
    pub attachments: Attachments,
    pub published: Vec<ReferenceBlock>,
}

/// Public view of one published record, inline tags expanded
pub async fn record_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RecordId>,
) -> Result<Html<String>, ApiError> {
    let store = open_store(&state)?;
    let record = store
        .get_record(id)
        .map_err(internal)?
        .filter(|r| r.is_published())
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Record {} not found", id)))?;

    let renderer = ListRenderer::new(&store, Permalinks::new(state.site_url.as_str()), &NoHooks);
    let content = shortcode::expand(&renderer, &record.body, Some(record.id)).map_err(internal)?;

    let mut body = format!(
        "<article><h1>{}</h1>{}</article>",
        escape(&record.title),
        content
    );
    if let Some(widget) = &state.widget {
        let sidebar = widget
            .render(&renderer, PageContext::single(record.id), &WidgetChrome::default())
            .map_err(internal)?;
        if let Some(sidebar) = sidebar {
            body.push_str("<aside>");
            body.push_str(&sidebar);
            body.push_str("</aside>");
        }
    }
    Ok(Html(page(&record.title, &body)))
}

pub async fn settings_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let store = open_store(&state)?;
    let html = SettingsScreen::open(&store).render(None).map_err(internal)?;
    Ok(Html(page("References settings", &html)))
}

pub async fn settings_submit(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Html<String>, ApiError> {
    let store = open_store(&state)?;
    let screen = SettingsScreen::open(&store);
    let notice = match AdminAction::from_pairs(&pairs) {
        Some(action) => Some(screen.handle(&action).map_err(internal)?),
        None => None,
    };
    let html = screen.render(notice.as_ref()).map_err(internal)?;
    Ok(Html(page("References settings", &html)))
}

fn editor_html(form: &EditorForm<'_>, id: RecordId, notice: Option<&Notice>) -> Result<String, ApiError> {
    let fields = form
        .render(id)
        .map_err(internal)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Record {} not found", id)))?;
    let mut html = String::new();
    if let Some(notice) = notice {
        html.push_str(&notice.html());
    }
    html.push_str(&format!(
        r#"<form method="post" action="/admin/records/{}/edit">{}<input type="submit" class="button-primary" value="Update" /></form>"#,
        id, fields
    ));
    Ok(html)
}

pub async fn editor_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RecordId>,
) -> Result<Html<String>, ApiError> {
    let store = open_store(&state)?;
    let nonces = NonceIssuer::new(state.nonce_secret.as_str());
    let form = EditorForm::new(AttachmentStore::open(&store), &nonces);
    let html = editor_html(&form, id, None)?;
    Ok(Html(page("Edit references", &html)))
}

pub async fn editor_submit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RecordId>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Html<String>, ApiError> {
    let store = open_store(&state)?;
    let nonces = NonceIssuer::new(state.nonce_secret.as_str());
    let form = EditorForm::new(AttachmentStore::open(&store), &nonces);

    let notice = match form.save(id, &EditorSubmission::new(pairs)).map_err(internal)? {
        SaveOutcome::Saved { fields } => Notice::success(format!("Saved {} reference list(s).", fields)),
        SaveOutcome::Skipped(SkipReason::BadNonce) => {
            return Err(api_error(StatusCode::FORBIDDEN, "Invalid or missing nonce"));
        }
        SaveOutcome::Skipped(SkipReason::RecordMissing) => {
            return Err(api_error(StatusCode::NOT_FOUND, format!("Record {} not found", id)));
        }
        SaveOutcome::Skipped(reason) => {
            tracing::debug!("Editor save for {} skipped: {:?}", id, reason);
            Notice::success("Nothing to save.")
        }
    };
    let html = editor_html(&form, id, Some(&notice))?;
    Ok(Html(page("Edit references", &html)))
}

pub async fn list_refs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefsParams>,
) -> Result<Json<Vec<RelationDefinition>>, ApiError> {
    let store = open_store(&state)?;
    let mut filter = DefinitionFilter::all();
    if let Some(source_type) = params.source_type.as_deref() {
        filter = filter.source_type(source_type);
    }
    if let Some(key) = params.key.as_deref() {
        filter = filter.key(key);
    }
    let defs = RelationRegistry::open(&store).list(filter).map_err(internal)?;
    Ok(Json(defs))
}

pub async fn record_refs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RecordId>,
) -> Result<Json<RecordRefs>, ApiError> {
    let store = open_store(&state)?;
    let renderer = ListRenderer::new(&store, Permalinks::new(state.site_url.as_str()), &NoHooks);
    let attachments = renderer
        .attachments()
        .get_all(id)
        .map_err(internal)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Record {} not found", id)))?;
    let published = renderer.blocks(id, None).map_err(internal)?;
    Ok(Json(RecordRefs {
        record_id: id,
        attachments,
        published,
    }))
}

pub async fn find_referrers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RecordId>,
    Query(params): Query<FindParams>,
) -> Result<Json<ReverseLookup>, ApiError> {
    let store = open_store(&state)?;
    let types: Vec<String> = params
        .types
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    let only_published = params.published.unwrap_or(false);
    let lookup = ReverseIndex::new(&store)
        .find(id, &types, only_published)
        .map_err(internal)?;
    Ok(Json(lookup))
}
