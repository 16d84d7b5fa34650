use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database as LibsqlDatabase};

use super::{KeyInfo, KvStore, expiry_from};
use crate::config::Config;
use crate::error::StoreError;

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("../migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[("001_kv.sql", include_str!("../migrations/001_kv.sql"))];

/// Key-value entries in a libsql `kv` table.
///
/// Expiry is stored as epoch milliseconds. Reads filter expired rows, so
/// [`LibsqlKv::purge_expired`] only reclaims space.
pub struct LibsqlKv {
    // Held so the replica's background sync keeps running.
    _db: LibsqlDatabase,
    conn: Connection,
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

impl LibsqlKv {
    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    pub async fn new(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(cfg.app.get_db());

        let db = match cfg.app.replica() {
            Some((url, token)) => {
                tracing::info!("[kv] running in synced database mode (offline writes)");
                let sync_interval = Duration::from_secs(cfg.app.sync_interval_seconds);
                Builder::new_synced_database(&path, url.to_string(), token.to_string())
                    .sync_interval(sync_interval)
                    .build()
                    .await?
            }
            None => Builder::new_local(&path).build().await?,
        };

        Self::from_database(db).await
    }

    pub async fn open_local(path: &Path) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibsqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS.iter().chain(MIGRATIONS) {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(LibsqlKv { _db: db, conn })
    }

    /// Deletes expired rows and returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?",
                libsql::params![millis(Utc::now())],
            )
            .await?;
        Ok(removed)
    }
}

#[async_trait]
impl KvStore for LibsqlKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let query = r#"
            SELECT value FROM kv
            WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
        "#;

        let mut rows = self
            .conn
            .query(query, libsql::params![key, millis(Utc::now())])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO kv (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
        "#;

        let expires_at = expiry_from(Utc::now(), ttl).map(millis);
        self.conn
            .execute(query, libsql::params![key, value, expires_at])
            .await?;
        Ok(())
    }

    async fn put_new(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool, StoreError> {
        // An expired row counts as free; a live one leaves the statement a no-op.
        let query = r#"
            INSERT INTO kv (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            WHERE kv.expires_at IS NOT NULL AND kv.expires_at <= ?
        "#;

        let now = Utc::now();
        let expires_at = expiry_from(now, ttl).map(millis);
        let changed = self
            .conn
            .execute(query, libsql::params![key, value, expires_at, millis(now)])
            .await?;
        Ok(changed > 0)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?", libsql::params![key])
            .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KeyInfo>, StoreError> {
        let query = r#"
            SELECT key, expires_at FROM kv
            WHERE substr(key, 1, ?) = ? AND (expires_at IS NULL OR expires_at > ?)
            ORDER BY key
        "#;

        let prefix_len = prefix.chars().count() as i64;
        let mut rows = self
            .conn
            .query(
                query,
                libsql::params![prefix_len, prefix, millis(Utc::now())],
            )
            .await?;
        let mut keys = Vec::new();

        while let Some(row) = rows.next().await? {
            let key: String = row.get(0)?;
            let expires_at = row
                .get::<Option<i64>>(1)?
                .and_then(DateTime::<Utc>::from_timestamp_millis);
            keys.push(KeyInfo { key, expires_at });
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, LibsqlKv) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let kv = LibsqlKv::open_local(&dir.path().join("kv.db"))
            .await
            .expect("failed to open libsql kv");
        (dir, kv)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_dir, kv) = open_temp().await;

        assert_eq!(kv.get("site").await.unwrap(), None);
        kv.put("site", "one", None).await.unwrap();
        kv.put("site", "two", None).await.unwrap();
        assert_eq!(kv.get("site").await.unwrap().as_deref(), Some("two"));

        kv.delete("site").await.unwrap();
        kv.delete("site").await.unwrap();
        assert_eq!(kv.get("site").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry_and_purge() {
        let (_dir, kv) = open_temp().await;

        kv.put("gone", "v", Some(Duration::from_millis(5))).await.unwrap();
        kv.put("kept", "v", Some(Duration::from_secs(3600))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(kv.get("gone").await.unwrap(), None);
        assert_eq!(kv.get("kept").await.unwrap().as_deref(), Some("v"));
        assert_eq!(kv.purge_expired().await.unwrap(), 1);
        assert_eq!(kv.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_new_only_claims_free_keys() {
        let (_dir, kv) = open_temp().await;

        assert!(kv.put_new("k", "first", None).await.unwrap());
        assert!(!kv.put_new("k", "second", None).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("first"));

        kv.put("stale", "old", Some(Duration::from_millis(5))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(kv.put_new("stale", "fresh", None).await.unwrap());
        assert_eq!(kv.get("stale").await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let (_dir, kv) = open_temp().await;

        kv.put("site:bookmarks", "live", None).await.unwrap();
        kv.put("site:bookmarks:history:2", "b", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        kv.put("site:bookmarks:history:1", "a", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let listed = kv.list("site:bookmarks:history:").await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(keys, vec!["site:bookmarks:history:1", "site:bookmarks:history:2"]);
        assert!(listed.iter().all(|k| k.expires_at.is_some()));
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");

        let kv = LibsqlKv::open_local(&path).await.unwrap();
        kv.put("site", "v", None).await.unwrap();
        drop(kv);

        let kv = LibsqlKv::open_local(&path).await.unwrap();
        assert_eq!(kv.get("site").await.unwrap().as_deref(), Some("v"));
    }
}
