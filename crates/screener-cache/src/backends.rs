use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::CacheBackend;

/// Concurrent in-process map, no background eviction — expired entries are
/// skipped on read and overwritten on the next `set`.
pub struct InMemoryCacheBackend {
    entries: DashMap<String, (Vec<u8>, Instant)>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let hit = self.entries.get(key).and_then(|entry| {
            let (payload, deadline) = entry.value();
            (Instant::now() < *deadline).then(|| payload.clone())
        });
        if hit.is_none() {
            self.entries.remove(key);
        }
        hit
    }

    async fn set(&self, key: &str, payload: &[u8], ttl: Duration) {
        self.entries
            .insert(key.to_string(), (payload.to_vec(), Instant::now() + ttl));
    }

    async fn clear(&self) {
        self.entries.clear();
    }
}

#[derive(Serialize, Deserialize)]
struct FileEntry {
    expires_at: i64,
    #[allow(dead_code)]
    created_at: i64,
    payload: Vec<u8>,
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One file per entry under `dir`, named `{sha256-hex}.cache`, matching the
/// source's `FileBackend` naming with `sha256` standing in for `md5`.
pub struct FileCacheBackend {
    dir: PathBuf,
}

impl FileCacheBackend {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.cache"))
    }
}

#[async_trait]
impl CacheBackend for FileCacheBackend {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        let entry: FileEntry = match serde_json::from_slice(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("corrupt cache file {}: {e}", path.display());
                return None;
            }
        };
        if now_epoch() < entry.expires_at {
            Some(entry.payload)
        } else {
            let _ = tokio::fs::remove_file(&path).await;
            None
        }
    }

    async fn set(&self, key: &str, payload: &[u8], ttl: Duration) {
        let entry = FileEntry {
            expires_at: now_epoch() + ttl.as_secs() as i64,
            created_at: now_epoch(),
            payload: payload.to_vec(),
        };
        let Ok(encoded) = serde_json::to_vec(&entry) else {
            return;
        };
        if let Err(e) = tokio::fs::write(self.path_for(key), encoded).await {
            tracing::warn!("failed to write cache entry: {e}");
        }
    }

    async fn clear(&self) {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(_) => return,
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            if entry.path().extension().map(|ext| ext == "cache").unwrap_or(false) {
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
    }
}

/// Single-table embedded SQL backend, matching the source's `cache` schema.
pub struct SqliteCacheBackend {
    pool: SqlitePool,
}

impl SqliteCacheBackend {
    pub async fn connect(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                data BLOB,
                expires_at REAL,
                created_at REAL
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_expires ON cache(expires_at)")
            .execute(&pool)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let row: Result<Option<(Vec<u8>, f64)>, sqlx::Error> =
            sqlx::query_as("SELECT data, expires_at FROM cache WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await;

        match row {
            Ok(Some((data, expires_at))) => {
                if (now_epoch() as f64) < expires_at {
                    Some(data)
                } else {
                    let _ = sqlx::query("DELETE FROM cache WHERE key = ?")
                        .bind(key)
                        .execute(&self.pool)
                        .await;
                    None
                }
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("sqlite cache read failed: {e}");
                None
            }
        }
    }

    async fn set(&self, key: &str, payload: &[u8], ttl: Duration) {
        let expires_at = now_epoch() as f64 + ttl.as_secs_f64();
        let created_at = now_epoch() as f64;
        let result = sqlx::query(
            "INSERT OR REPLACE INTO cache (key, data, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(payload)
        .bind(expires_at)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!("sqlite cache write failed: {e}");
        }
    }

    async fn clear(&self) {
        if let Err(e) = sqlx::query("DELETE FROM cache").execute(&self.pool).await {
            tracing::warn!("sqlite cache clear failed: {e}");
        }
    }
}
