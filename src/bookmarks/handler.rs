//! HTTP Handlers for the Bookmark API

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};

use super::{BookmarkAction, BookmarkService};
use crate::api::{DeleteParams, success};
use crate::auth::AdminToken;
use crate::error::{AppError, StoreError};
use crate::handler::AppState;

pub async fn get_bookmarks(State(state): State<AppState>) -> Response {
    let data = BookmarkService::new(&state.store).current().await;
    Json(data).into_response()
}

pub async fn get_admin_bookmarks(_: AdminToken, State(state): State<AppState>) -> Response {
    let data = BookmarkService::new(&state.store).current().await;
    Json(data).into_response()
}

pub async fn update_bookmarks(
    _: AdminToken,
    State(state): State<AppState>,
    payload: Result<Json<BookmarkAction>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(action) = payload.map_err(|e| {
        tracing::info!(error = %e.body_text(), "rejected bookmark action");
        AppError::BadRequest("Invalid action or missing data".to_string())
    })?;

    let data = BookmarkService::new(&state.store).apply(action).await?;
    Ok(success(data))
}

pub async fn delete_bookmark(
    _: AdminToken,
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Response, AppError> {
    let id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing id parameter".to_string()))?;

    let data = BookmarkService::new(&state.store).remove_by_id(&id).await?;
    Ok(success(data))
}

pub async fn list_history(_: AdminToken, State(state): State<AppState>) -> Result<Response, AppError> {
    let backups = state.store.history().await?;
    Ok(success(backups))
}

pub async fn get_backup(
    _: AdminToken,
    State(state): State<AppState>,
    Path(stamp): Path<String>,
) -> Result<Response, AppError> {
    match state.store.backup(&stamp).await {
        Ok(Some(data)) => Ok(success(data)),
        Ok(None) => Err(AppError::NotFound("Backup not found".to_string())),
        Err(StoreError::Malformed(key)) => {
            tracing::warn!(key = %key, "backup is not a valid record");
            Err(AppError::Unprocessable("Backup is not valid JSON".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
