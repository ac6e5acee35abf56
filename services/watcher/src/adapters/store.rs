//! services/watcher/src/adapters/store.rs
//!
//! This module contains the SQLite adapter, which is the concrete
//! implementation of the `ConfigStore` port from the `core` crate. It holds
//! the durable key-value configuration and the append-only notification
//! history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slot_watcher_core::domain::NotificationRecord;
use slot_watcher_core::ports::{ConfigStore, PortError, PortResult, MIN_REFRESH_INTERVAL};
use sqlx::{FromRow, SqlitePool};
use std::time::Duration;

const KEY_REFRESH_INTERVAL: &str = "refresh_interval_secs";
const KEY_SUBSCRIPTION_ENDPOINT: &str = "subscription_endpoint";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A SQLite-backed adapter that implements the `ConfigStore` port.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a new `SqliteStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO config (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn store_err(err: sqlx::Error) -> PortError {
    PortError::Store(err.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct HistoryRecord {
    sent_at: DateTime<Utc>,
    message: String,
}

impl HistoryRecord {
    fn to_domain(self) -> NotificationRecord {
        NotificationRecord {
            sent_at: self.sent_at,
            message: self.message,
        }
    }
}

//=========================================================================================
// `ConfigStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn refresh_interval(&self) -> PortResult<Duration> {
        let stored = self
            .get_value(KEY_REFRESH_INTERVAL)
            .await
            .map_err(store_err)?;
        let secs = match stored {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                PortError::Store(format!("stored refresh interval '{raw}' is not a number"))
            })?,
            None => return Ok(MIN_REFRESH_INTERVAL),
        };
        // A hand-edited row must not take the loop below the floor.
        Ok(Duration::from_secs(secs).max(MIN_REFRESH_INTERVAL))
    }

    async fn set_refresh_interval(&self, interval: Duration) -> PortResult<()> {
        if interval < MIN_REFRESH_INTERVAL {
            return Err(PortError::Store(format!(
                "refresh interval must be at least {} seconds",
                MIN_REFRESH_INTERVAL.as_secs()
            )));
        }
        self.set_value(KEY_REFRESH_INTERVAL, &interval.as_secs().to_string())
            .await
            .map_err(store_err)
    }

    async fn subscription_endpoint(&self) -> PortResult<Option<String>> {
        let stored = self
            .get_value(KEY_SUBSCRIPTION_ENDPOINT)
            .await
            .map_err(store_err)?;
        // An empty value means unset.
        Ok(stored.filter(|value| !value.is_empty()))
    }

    async fn set_subscription_endpoint(&self, endpoint: &str) -> PortResult<()> {
        self.set_value(KEY_SUBSCRIPTION_ENDPOINT, endpoint)
            .await
            .map_err(store_err)
    }

    async fn append_history(&self, sent_at: DateTime<Utc>, message: &str) -> PortResult<()> {
        sqlx::query("INSERT INTO notification_history (sent_at, message) VALUES (?, ?)")
            .bind(sent_at)
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn recent_history(&self, limit: u32) -> PortResult<Vec<NotificationRecord>> {
        let records: Vec<HistoryRecord> = sqlx::query_as(
            "SELECT sent_at, message FROM notification_history \
             ORDER BY sent_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(records.into_iter().map(HistoryRecord::to_domain).collect())
    }

    async fn clear_history(&self) -> PortResult<()> {
        sqlx::query("DELETE FROM notification_history")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
