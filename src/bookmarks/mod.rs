//! Bookmark Module
//!
//! Public read access and token-gated editing of the bookmark record.
//!
//! # Endpoints
//!
//! - `GET /bookmarks` returns the live record, falling back to defaults when
//!   the store cannot be read
//! - `GET|POST|DELETE /admin/bookmarks` read, upsert/replace and delete,
//!   all requiring the `x-admin-token` header
//! - `GET /admin/bookmarks/history[/{stamp}]` lists and reads backups
//!
//! # Usage
//!
//! ```rust,ignore
//! use zeronav::bookmarks;
//!
//! let app = Router::new()
//!     .merge(bookmarks::routes())
//!     .with_state(app_state);
//! ```

mod handler;
mod routes;
mod service;

pub use routes::routes;
pub use service::{BookmarkAction, BookmarkService, remove_from, replace_with, upsert_into};
