//! services/watcher/src/error.rs
//!
//! Defines the primary error type for the watcher service.

use crate::config::ConfigError;
use slot_watcher_core::poll::PollLoopError;
use slot_watcher_core::ports::PortError;

/// The primary error type for the `watcher` service.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service
    /// ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A fatal outcome of the poll loop itself.
    #[error("Poll loop error: {0}")]
    Poll(#[from] PollLoopError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from the HTTP client.
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
