//! Versioned persistence for the single [`SiteData`] record.
//!
//! Every write follows the same sequence:
//!
//! 1. read the live record (failures propagate),
//! 2. store the pre-write bytes under `{key}:history:{stamp}` with an expiry,
//! 3. write the new record with the next version and a fresh `updatedAt`.
//!
//! A failed backup aborts the write before the live record is touched.
//! There is no compare-and-swap: concurrent writers race and the last one wins.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{AppError, StoreError};
use crate::kv::{self, KvStore};
use crate::model::{CustomElements, SiteData};

pub const DEFAULT_RECORD_KEY: &str = "site:bookmarks";
pub const DEFAULT_BACKUP_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

const HISTORY_SEGMENT: &str = ":history:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub key: String,
    pub stamp: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The live record as read from the store, together with its exact bytes.
struct Current {
    raw: Option<String>,
    data: SiteData,
}

/// Timestamp suffix for a backup key: ISO-8601 in UTC with millisecond
/// precision, `:` and `.` replaced by `-`.
pub fn backup_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(|c: char| c == ':' || c == '.', "-")
}

/// Sort key for a stamp: the millisecond part, then the collision counter.
fn stamp_order(stamp: &str) -> (&str, u32) {
    match stamp.rsplit_once('-') {
        Some((base, n)) if base.ends_with('Z') => match n.parse() {
            Ok(n) => (base, n),
            Err(_) => (stamp, 0),
        },
        _ => (stamp, 0),
    }
}

pub struct RecordStore {
    kv: Arc<dyn KvStore>,
    key: String,
    backup_ttl: Duration,
    defaults: CustomElements,
}

impl RecordStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        RecordStore {
            kv,
            key: DEFAULT_RECORD_KEY.to_string(),
            backup_ttl: DEFAULT_BACKUP_TTL,
            defaults: CustomElements::default(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_backup_ttl(mut self, ttl: Duration) -> Self {
        self.backup_ttl = ttl;
        self
    }

    pub fn with_defaults(mut self, defaults: CustomElements) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn history_prefix(&self) -> String {
        format!("{}{}", self.key, HISTORY_SEGMENT)
    }

    pub fn default_record(&self) -> SiteData {
        SiteData::new(self.defaults.clone())
    }

    async fn fetch(&self) -> Result<Current, StoreError> {
        let raw = self.kv.get(&self.key).await?;
        let data = raw
            .as_deref()
            .and_then(|raw| kv::decode(&self.key, raw))
            .unwrap_or_else(|| self.default_record());
        Ok(Current { raw, data })
    }

    /// Never fails: a missing, malformed or unreachable record yields the
    /// default record. Nothing is written.
    pub async fn load(&self) -> SiteData {
        match self.fetch().await {
            Ok(current) => current.data,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to load site data, serving defaults");
                self.default_record()
            }
        }
    }

    /// Persists `next` as the new live record and returns it exactly as stored.
    pub async fn save(&self, next: SiteData) -> Result<SiteData, StoreError> {
        let current = self.fetch().await?;
        self.commit(current, next).await
    }

    /// Load, transform and save with a single read of the live record.
    /// Unlike [`RecordStore::load`], a backend failure on that read is an
    /// error so a write never starts from substituted defaults.
    pub async fn apply<F>(&self, transform: F) -> Result<SiteData, AppError>
    where
        F: FnOnce(SiteData) -> Result<SiteData, AppError>,
    {
        let current = self.fetch().await?;
        let next = transform(current.data.clone())?;
        Ok(self.commit(current, next).await?)
    }

    async fn commit(&self, current: Current, next: SiteData) -> Result<SiteData, StoreError> {
        let now = Utc::now();

        let snapshot = match current.raw {
            Some(raw) => raw,
            None => serde_json::to_string(&current.data)?,
        };
        let version = current
            .data
            .version
            .max(next.version)
            .checked_add(1)
            .ok_or(StoreError::VersionExhausted(next.version))?;
        let backup_key = self.write_backup(now, &snapshot).await?;

        let updated = SiteData {
            version,
            updated_at: now,
            ..next
        };
        kv::put_json(self.kv.as_ref(), &self.key, &updated, None).await?;

        tracing::info!(
            key = %self.key,
            backup = %backup_key,
            version = updated.version,
            bookmarks = updated.bookmarks.len(),
            "saved site data"
        );
        Ok(updated)
    }

    /// Stores `snapshot` under the first free backup key for `now`, adding a
    /// counter suffix when other saves in the same millisecond got there
    /// first. Claiming a key is a single insert-if-absent, so concurrent
    /// saves never share one.
    async fn write_backup(&self, now: DateTime<Utc>, snapshot: &str) -> Result<String, StoreError> {
        let base = format!("{}{}", self.history_prefix(), backup_stamp(now));
        let mut candidate = base.clone();
        let mut n: u32 = 0;
        while !self
            .kv
            .put_new(&candidate, snapshot, Some(self.backup_ttl))
            .await?
        {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        Ok(candidate)
    }

    /// Live backups, newest first.
    pub async fn history(&self) -> Result<Vec<BackupInfo>, StoreError> {
        let prefix = self.history_prefix();
        let mut backups: Vec<BackupInfo> = self
            .kv
            .list(&prefix)
            .await?
            .into_iter()
            .map(|info| BackupInfo {
                stamp: info.key[prefix.len()..].to_string(),
                key: info.key,
                expires_at: info.expires_at,
            })
            .collect();
        backups.sort_by(|a, b| stamp_order(&b.stamp).cmp(&stamp_order(&a.stamp)));
        Ok(backups)
    }

    /// Reads one backup. A snapshot that is not a valid record (backups keep
    /// the replaced bytes verbatim) is reported as [`StoreError::Malformed`]
    /// rather than as absent.
    pub async fn backup(&self, stamp: &str) -> Result<Option<SiteData>, StoreError> {
        let key = format!("{}{}", self.history_prefix(), stamp);
        match self.kv.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|_| StoreError::Malformed(key)),
            None => Ok(None),
        }
    }
}
