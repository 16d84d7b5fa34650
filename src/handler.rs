use std::sync::Arc;

use axum::{
    Json, Router,
    http::Method,
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::bookmarks;
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub admin_token: Arc<str>,
}

impl AppState {
    pub fn new(store: RecordStore, admin_token: &str) -> Self {
        AppState {
            store: Arc::new(store),
            admin_token: Arc::from(admin_token),
        }
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/", get(healthcheck))
        .merge(bookmarks::routes())
        .layer(cors)
        .with_state(state)
}
