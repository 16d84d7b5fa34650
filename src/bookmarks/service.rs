use serde::Deserialize;

use crate::error::AppError;
use crate::model::{Bookmark, SiteData};
use crate::store::RecordStore;

/// Body of `POST /admin/bookmarks`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum BookmarkAction {
    Upsert { item: Bookmark },
    Replace { data: SiteData },
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("bookmark {field} is required")));
    }
    Ok(())
}

/// Replaces the bookmark with the same id in place, or appends it.
pub fn upsert_into(mut data: SiteData, bookmark: Bookmark) -> Result<SiteData, AppError> {
    require("id", &bookmark.id)?;
    require("title", &bookmark.title)?;
    require("url", &bookmark.url)?;

    match data.position_of(&bookmark.id) {
        Some(index) => data.bookmarks[index] = bookmark,
        None => data.bookmarks.push(bookmark),
    }
    Ok(data)
}

/// Drops every bookmark with `id`. An unknown id leaves `data` unchanged.
pub fn remove_from(mut data: SiteData, id: &str) -> SiteData {
    data.bookmarks.retain(|b| b.id != id);
    data
}

/// Swaps in an imported record. Its shape is trusted; only id uniqueness is
/// checked. The stored version is recomputed on save.
pub fn replace_with(_current: SiteData, incoming: SiteData) -> Result<SiteData, AppError> {
    if incoming.version == u64::MAX {
        return Err(AppError::BadRequest(format!(
            "version {} leaves no room for a newer version",
            incoming.version
        )));
    }
    if let Some(id) = incoming.duplicate_id() {
        return Err(AppError::BadRequest(format!("duplicate bookmark id: {id}")));
    }
    Ok(incoming)
}

pub struct BookmarkService<'a> {
    store: &'a RecordStore,
}

impl<'a> BookmarkService<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    pub async fn current(&self) -> SiteData {
        self.store.load().await
    }

    pub async fn upsert(&self, bookmark: Bookmark) -> Result<SiteData, AppError> {
        self.store.apply(|data| upsert_into(data, bookmark)).await
    }

    pub async fn remove_by_id(&self, id: &str) -> Result<SiteData, AppError> {
        self.store.apply(|data| Ok(remove_from(data, id))).await
    }

    pub async fn replace_all(&self, incoming: SiteData) -> Result<SiteData, AppError> {
        self.store.apply(|data| replace_with(data, incoming)).await
    }

    pub async fn apply(&self, action: BookmarkAction) -> Result<SiteData, AppError> {
        match action {
            BookmarkAction::Upsert { item } => self.upsert(item).await,
            BookmarkAction::Replace { data } => self.replace_all(data).await,
        }
    }
}
