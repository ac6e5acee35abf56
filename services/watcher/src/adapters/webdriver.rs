//! services/watcher/src/adapters/webdriver.rs
//!
//! This module contains the browser adapter, which is the concrete
//! implementation of the `PageSampler` port. It drives a W3C WebDriver
//! remote (chromedriver, geckodriver, ...) over its JSON-over-HTTP wire
//! protocol; which browser renders the page is a deployment choice, not a
//! code path.

use async_trait::async_trait;
use serde_json::{json, Value};
use slot_watcher_core::domain::PageSnapshot;
use slot_watcher_core::ports::{PageSampler, PortError, PortResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::markup;

/// The control the page shows when more dates can be loaded.
const LOAD_MORE_XPATH: &str = "//*[@id='nextButton-announce']";

const LOGIN_PROMPT: &str = "Log in to the storefront in the browser window, \
navigate to the slot selection page, then press Enter to continue";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A page sampler backed by a live WebDriver session.
pub struct WebDriverSampler {
    client: reqwest::Client,
    /// `<remote>/session/<id>`, the prefix of every command this session
    /// accepts.
    session_url: String,
    page_url: String,
    /// The page loads its slot data asynchronously and exposes no completion
    /// signal, so sampling waits this long after every reload or click.
    settle_delay: Duration,
    logged_in: AtomicBool,
}

fn render_err(err: reqwest::Error) -> PortError {
    PortError::Render(err.to_string())
}

impl WebDriverSampler {
    /// Opens a new session on the WebDriver remote.
    pub async fn connect(
        client: reqwest::Client,
        webdriver_url: &str,
        page_url: impl Into<String>,
        settle_delay: Duration,
    ) -> Result<Self, PortError> {
        let base = webdriver_url.trim_end_matches('/');
        let body: Value = client
            .post(format!("{base}/session"))
            .json(&json!({ "capabilities": { "alwaysMatch": {} } }))
            .send()
            .await
            .map_err(render_err)?
            .error_for_status()
            .map_err(render_err)?
            .json()
            .await
            .map_err(render_err)?;

        let session_id = body["value"]["sessionId"].as_str().ok_or_else(|| {
            PortError::Render("WebDriver session response carried no session id".to_string())
        })?;
        info!(session_id, "WebDriver session created");

        Ok(Self {
            client,
            session_url: format!("{base}/session/{session_id}"),
            page_url: page_url.into(),
            settle_delay,
            logged_in: AtomicBool::new(false),
        })
    }

    async fn command(&self, path: &str, body: &Value) -> PortResult<Value> {
        self.client
            .post(format!("{}{path}", self.session_url))
            .json(body)
            .send()
            .await
            .map_err(render_err)?
            .error_for_status()
            .map_err(render_err)?
            .json()
            .await
            .map_err(render_err)
    }

    async fn settle(&self) {
        debug!(delay = ?self.settle_delay, "waiting for the page to settle");
        tokio::time::sleep(self.settle_delay).await;
    }

    async fn page_source(&self) -> PortResult<String> {
        let body: Value = self
            .client
            .get(format!("{}/source", self.session_url))
            .send()
            .await
            .map_err(render_err)?
            .error_for_status()
            .map_err(render_err)?
            .json()
            .await
            .map_err(render_err)?;

        body["value"].as_str().map(str::to_string).ok_or_else(|| {
            PortError::Render("WebDriver source response carried no document".to_string())
        })
    }

    /// The "load more dates" control, if the page currently shows one.
    async fn find_load_more(&self) -> PortResult<Option<String>> {
        let response = self
            .client
            .post(format!("{}/element", self.session_url))
            .json(&json!({ "using": "xpath", "value": LOAD_MORE_XPATH }))
            .send()
            .await
            .map_err(render_err)?;

        // The remote answers 404 ("no such element") when the control is
        // absent, which for us just means there is nothing more to load.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = response
            .error_for_status()
            .map_err(render_err)?
            .json()
            .await
            .map_err(render_err)?;

        // A W3C element reference is a single-entry object keyed by a
        // protocol constant; take whatever value it holds.
        Ok(body["value"]
            .as_object()
            .and_then(|obj| obj.values().next())
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

//=========================================================================================
// `PageSampler` Trait Implementation
//=========================================================================================

#[async_trait]
impl PageSampler for WebDriverSampler {
    /// Opens the slot page and blocks until the operator confirms they have
    /// logged in. The storefront's login flow involves credentials and
    /// second factors this tool has no business automating.
    async fn await_login(&self) -> PortResult<()> {
        self.command("/url", &json!({ "url": self.page_url })).await?;
        self.settle().await;

        tokio::task::spawn_blocking(|| {
            println!("{LOGIN_PROMPT}");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| ())
        })
        .await
        .map_err(|e| PortError::Render(format!("login prompt task failed: {e}")))?
        .map_err(|e| PortError::Render(format!("could not read login confirmation: {e}")))?;

        self.logged_in.store(true, Ordering::SeqCst);
        info!("operator confirmed login");
        Ok(())
    }

    async fn refresh(&self) -> PortResult<()> {
        self.command("/refresh", &json!({})).await?;
        self.settle().await;
        Ok(())
    }

    async fn load_more(&self) -> PortResult<()> {
        match self.find_load_more().await? {
            Some(element_id) => {
                debug!("clicking the load-more control to extend the date range");
                self.command(&format!("/element/{element_id}/click"), &json!({}))
                    .await?;
                self.settle().await;
            }
            None => debug!("no load-more control on the page"),
        }
        Ok(())
    }

    async fn render(&self) -> PortResult<PageSnapshot> {
        if !self.logged_in.load(Ordering::SeqCst) {
            return Err(PortError::LoginRequired);
        }
        let source = self.page_source().await?;
        Ok(markup::parse(&source))
    }
}
