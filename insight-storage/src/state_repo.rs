//! Aggregate-state repository: get-or-create / versioned save / retention
//! sweep, keyed by (group_id, date_key).

use async_trait::async_trait;
use chrono::{Duration, Local, Utc};
use sqlx::Row;
use tracing::{debug, info, warn};

use insight_core::{AggregateState, StateKey};

use crate::error::StorageError;
use crate::sqlite_pool::SqlitePoolManager;

/// Version of a state that has never been persisted. The first successful
/// save moves it to 1.
pub const NEW_STATE_VERSION: i64 = 0;

/// A state together with the version of the row it was read from. The
/// version must be handed back on save so a stale read cannot clobber a
/// concurrent update.
#[derive(Debug, Clone)]
pub struct VersionedState {
    pub state: AggregateState,
    pub version: i64,
}

/// Persistence contract for aggregate state. One implementation ships
/// (SQLite); tests may stub it.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the stored state, or None when the key has never been saved.
    async fn get(&self, key: &StateKey) -> Result<Option<VersionedState>, StorageError>;

    /// Returns the stored state, or a freshly zeroed one at
    /// [`NEW_STATE_VERSION`]. The fresh instance is not persisted until a
    /// subsequent save.
    async fn get_or_create(&self, key: &StateKey) -> Result<VersionedState, StorageError>;

    /// Full overwrite of the state at its key, guarded by `version`.
    /// Returns the new version on success; fails with
    /// [`StorageError::StaleState`] when the row moved on from `version`.
    async fn save(&self, state: &AggregateState, version: i64) -> Result<i64, StorageError>;

    /// Deletes state rows whose date key is older than `keep_days` days ago.
    /// Returns the number of rows removed.
    async fn sweep_older_than(&self, keep_days: i64) -> Result<u64, StorageError>;
}

/// SQLite-backed [`StateStore`]. The state body is one JSON column; identity
/// and the optimistic version live beside it.
#[derive(Clone)]
pub struct StateRepository {
    pool_manager: SqlitePoolManager,
}

impl StateRepository {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let repo = Self { pool_manager };
        repo.init().await?;
        Ok(repo)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating aggregate_state table if not exists");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS aggregate_state (
                group_id TEXT NOT NULL,
                date_key TEXT NOT NULL,
                state TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (group_id, date_key)
            )
            "#,
        )
        .execute(self.pool_manager.pool())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl StateStore for StateRepository {
    async fn get(&self, key: &StateKey) -> Result<Option<VersionedState>, StorageError> {
        let row = sqlx::query(
            "SELECT state, version FROM aggregate_state WHERE group_id = ? AND date_key = ?",
        )
        .bind(&key.group_id)
        .bind(&key.date_key)
        .fetch_optional(self.pool_manager.pool())
        .await?;

        match row {
            Some(row) => {
                let body: String = row.get("state");
                let version: i64 = row.get("version");
                let state: AggregateState = serde_json::from_str(&body)?;
                Ok(Some(VersionedState { state, version }))
            }
            None => Ok(None),
        }
    }

    async fn get_or_create(&self, key: &StateKey) -> Result<VersionedState, StorageError> {
        if let Some(found) = self.get(key).await? {
            return Ok(found);
        }
        debug!(key = %key, "no stored state, starting fresh");
        Ok(VersionedState {
            state: AggregateState::new(key),
            version: NEW_STATE_VERSION,
        })
    }

    async fn save(&self, state: &AggregateState, version: i64) -> Result<i64, StorageError> {
        let key = state.key();
        let body = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();

        if version == NEW_STATE_VERSION {
            let inserted = sqlx::query(
                r#"
                INSERT INTO aggregate_state (group_id, date_key, state, version, updated_at)
                VALUES (?, ?, ?, 1, ?)
                ON CONFLICT (group_id, date_key) DO NOTHING
                "#,
            )
            .bind(&key.group_id)
            .bind(&key.date_key)
            .bind(&body)
            .bind(&now)
            .execute(self.pool_manager.pool())
            .await?;

            if inserted.rows_affected() == 0 {
                warn!(key = %key, "insert raced with an existing row, rejecting save");
                return Err(StorageError::StaleState {
                    key: key.to_string(),
                    expected: version,
                });
            }
            debug!(key = %key, version = 1, "persisted new aggregate state");
            return Ok(1);
        }

        let updated = sqlx::query(
            r#"
            UPDATE aggregate_state
            SET state = ?, version = version + 1, updated_at = ?
            WHERE group_id = ? AND date_key = ? AND version = ?
            "#,
        )
        .bind(&body)
        .bind(&now)
        .bind(&key.group_id)
        .bind(&key.date_key)
        .bind(version)
        .execute(self.pool_manager.pool())
        .await?;

        if updated.rows_affected() == 0 {
            warn!(key = %key, expected = version, "version check failed, rejecting save");
            return Err(StorageError::StaleState {
                key: key.to_string(),
                expected: version,
            });
        }

        debug!(key = %key, version = version + 1, "persisted aggregate state");
        Ok(version + 1)
    }

    async fn sweep_older_than(&self, keep_days: i64) -> Result<u64, StorageError> {
        // Date keys are %Y-%m-%d, so lexicographic comparison is date order.
        let cutoff = (Local::now() - Duration::days(keep_days))
            .format("%Y-%m-%d")
            .to_string();

        let deleted = sqlx::query("DELETE FROM aggregate_state WHERE date_key < ?")
            .bind(&cutoff)
            .execute(self.pool_manager.pool())
            .await?;

        let count = deleted.rows_affected();
        if count > 0 {
            info!(cutoff = %cutoff, removed = count, "swept expired aggregate state");
        }
        Ok(count)
    }
}
