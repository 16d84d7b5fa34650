use axum::{Router, routing::get};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookmarks", get(handler::get_bookmarks))
        .route(
            "/admin/bookmarks",
            get(handler::get_admin_bookmarks)
                .post(handler::update_bookmarks)
                .delete(handler::delete_bookmark),
        )
        .route("/admin/bookmarks/history", get(handler::list_history))
        .route("/admin/bookmarks/history/:stamp", get(handler::get_backup))
}
