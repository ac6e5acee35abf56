//! services/watcher/src/adapters/notify.rs
//!
//! This module contains the adapter for the notify.run push service.
//! It implements the `NotificationSink` port from the `core` crate.

use async_trait::async_trait;
use serde::Deserialize;
use slot_watcher_core::ports::{NotificationSink, PortError, PortResult};
use tokio::sync::RwLock;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `NotificationSink` port against
/// notify.run. Messages are POSTed to the channel endpoint; subscribers see
/// them as push notifications on whatever device opened the channel page.
pub struct NotifyRunSink {
    client: reqwest::Client,
    api_url: String,
    /// The channel endpoint, once known. Seeded from the config store at
    /// startup and filled in by `register_endpoint` otherwise.
    endpoint: RwLock<Option<String>>,
}

impl NotifyRunSink {
    /// Creates a new `NotifyRunSink`. `endpoint` is the previously
    /// registered channel endpoint, if one is stored.
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            endpoint: RwLock::new(endpoint.filter(|e| !e.is_empty())),
        }
    }
}

fn delivery_err(err: reqwest::Error) -> PortError {
    PortError::Delivery(err.to_string())
}

#[derive(Deserialize)]
struct RegisterChannelResponse {
    endpoint: String,
}

//=========================================================================================
// `NotificationSink` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationSink for NotifyRunSink {
    /// Delivers one message to the channel endpoint.
    async fn send(&self, message: &str) -> PortResult<()> {
        let endpoint = self
            .endpoint
            .read()
            .await
            .clone()
            .ok_or_else(|| PortError::Delivery("no subscription endpoint registered".to_string()))?;

        debug!(%endpoint, "sending notification");
        self.client
            .post(&endpoint)
            .body(message.to_string())
            .send()
            .await
            .map_err(delivery_err)?
            .error_for_status()
            .map_err(delivery_err)?;
        Ok(())
    }

    /// Ensures a channel endpoint exists. An endpoint issued earlier is
    /// returned as-is; otherwise a new channel is registered with the
    /// service.
    async fn register_endpoint(&self) -> PortResult<String> {
        let mut endpoint = self.endpoint.write().await;
        if let Some(existing) = endpoint.as_ref() {
            return Ok(existing.clone());
        }

        let url = format!("{}/api/register_channel", self.api_url.trim_end_matches('/'));
        let registered: RegisterChannelResponse = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(delivery_err)?
            .error_for_status()
            .map_err(delivery_err)?
            .json()
            .await
            .map_err(delivery_err)?;

        debug!(endpoint = %registered.endpoint, "registered new notification channel");
        *endpoint = Some(registered.endpoint.clone());
        Ok(registered.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_an_endpoint_is_a_delivery_fault() {
        let sink = NotifyRunSink::new(reqwest::Client::new(), "https://notify.run", None);
        let err = sink.send("slots!").await.unwrap_err();
        assert!(matches!(err, PortError::Delivery(_)));
    }

    #[tokio::test]
    async fn registration_reuses_a_seeded_endpoint() {
        // With an endpoint already known, registration never touches the
        // network and returns the same endpoint.
        let sink = NotifyRunSink::new(
            reqwest::Client::new(),
            "https://notify.run",
            Some("https://notify.run/c/abc".to_string()),
        );
        assert_eq!(
            sink.register_endpoint().await.unwrap(),
            "https://notify.run/c/abc"
        );
    }

    #[tokio::test]
    async fn an_empty_stored_endpoint_counts_as_unset() {
        let sink = NotifyRunSink::new(
            reqwest::Client::new(),
            "https://notify.run",
            Some(String::new()),
        );
        let err = sink.send("slots!").await.unwrap_err();
        assert!(matches!(err, PortError::Delivery(_)));
    }
}
