//! services/watcher/src/cli.rs
//!
//! Command-line surface of the watcher. Everything except `run` is a
//! one-shot configuration or history action against the local store.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "watcher",
    about = "Watch a grocery delivery slot page and get notified when slots open",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the watch loop (default command)
    Run,
    /// Ensure a notification subscription endpoint exists and print it
    Register,
    /// Set the poll interval in seconds (minimum 300)
    SetInterval { seconds: u64 },
    /// Show recent notification history, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Delete all notification history
    ClearHistory,
}
