use axum::{
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::render::WidgetInstance;
use crate::ui::Icons;

pub mod routes;

/// Server state
pub struct AppState {
    pub database_path: PathBuf,
    pub site_url: String,
    pub nonce_secret: String,
    /// Sidebar widget shown on record pages
    pub widget: Option<WidgetInstance>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/records/{id}", get(routes::record_page))
        .route(
            "/admin/references",
            get(routes::settings_page).post(routes::settings_submit),
        )
        .route(
            "/admin/records/{id}/edit",
            get(routes::editor_page).post(routes::editor_submit),
        )
        .route("/api/refs", get(routes::list_refs))
        .route("/api/records/{id}/refs", get(routes::record_refs))
        .route("/api/find/{id}", get(routes::find_referrers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = router(Arc::new(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);
    println!("{} Server running at http://{}", Icons::GLOBE, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
