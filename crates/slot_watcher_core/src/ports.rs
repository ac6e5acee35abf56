//! crates/slot_watcher_core/src/ports.rs
//!
//! Defines the service contracts (traits) the poll loop depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete browser session, notification
//! transport and persistence implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::{NotificationRecord, PageSnapshot};

/// Refresh interval used when nothing is configured, and the floor below
/// which configured values are not honored.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// Faults a port can surface, classified the way the poll loop reacts to
/// them: [`PortError::LoginRequired`] is a precondition violation and fatal,
/// everything else is local to the cycle that hit it.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Sampling was attempted before the operator completed the login flow.
    #[error("the browser session has not completed the login flow")]
    LoginRequired,

    /// The page renderer could not produce a snapshot.
    #[error("failed to render the slot page: {0}")]
    Render(String),

    /// The notification transport rejected or never accepted the message.
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    /// The configuration/history store misbehaved.
    #[error("config store error: {0}")]
    Store(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Renders the slot-selection page and yields queryable snapshots of it.
#[async_trait]
pub trait PageSampler: Send + Sync {
    /// Blocks until the operator has completed the interactive login flow.
    /// Must be called once before the first [`PageSampler::render`].
    async fn await_login(&self) -> PortResult<()>;

    /// Reloads the page and waits for its asynchronously loaded content to
    /// settle.
    async fn refresh(&self) -> PortResult<()>;

    /// Extends the visible date range if the page offers more dates.
    /// Best-effort: a page without the control is not an error.
    async fn load_more(&self) -> PortResult<()> {
        Ok(())
    }

    /// Produces a fresh snapshot of the rendered page. Fails with
    /// [`PortError::LoginRequired`] if the login flow has not completed.
    async fn render(&self) -> PortResult<PageSnapshot>;
}

/// One-way delivery of text messages to a subscriber endpoint.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one message to the subscriber endpoint.
    async fn send(&self, message: &str) -> PortResult<()>;

    /// Ensures a subscription endpoint exists and returns it. Idempotent:
    /// an endpoint issued earlier is returned as-is, never replaced.
    async fn register_endpoint(&self) -> PortResult<String>;
}

/// Durable key-value configuration plus the append-only notification
/// history.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The poll interval. Never below [`MIN_REFRESH_INTERVAL`]; defaults to
    /// it when unset.
    async fn refresh_interval(&self) -> PortResult<Duration>;

    /// Persists a new poll interval. Rejects values below
    /// [`MIN_REFRESH_INTERVAL`].
    async fn set_refresh_interval(&self, interval: Duration) -> PortResult<()>;

    async fn subscription_endpoint(&self) -> PortResult<Option<String>>;

    async fn set_subscription_endpoint(&self, endpoint: &str) -> PortResult<()>;

    /// Appends one record to the notification history.
    async fn append_history(&self, sent_at: DateTime<Utc>, message: &str) -> PortResult<()>;

    /// The most recent notifications, newest first.
    async fn recent_history(&self, limit: u32) -> PortResult<Vec<NotificationRecord>>;

    /// Deletes the entire notification history.
    async fn clear_history(&self) -> PortResult<()>;
}
