//! crates/slot_watcher_core/src/poll.rs
//!
//! The watcher's main loop: wait for the operator to log in, then
//! sample -> evaluate -> report -> sleep until cancelled.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{AvailabilityResult, DateWindow};
use crate::evaluator::{self, StructureMismatch};
use crate::ports::{ConfigStore, NotificationSink, PageSampler, PortError, MIN_REFRESH_INTERVAL};

/// Consecutive render faults tolerated before the loop gives up on the
/// renderer entirely. Structure faults never count toward this limit.
pub const MAX_CONSECUTIVE_RENDER_FAULTS: u32 = 5;

/// Fatal outcomes of [`PollLoop::run`]. Cycle-local faults are logged and
/// retried, never returned.
#[derive(Debug, thiserror::Error)]
pub enum PollLoopError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error("page renderer failed {0} consecutive cycles, giving up")]
    RendererUnavailable(u32),
}

/// How a single cycle went wrong, for the loop's failure accounting.
enum CycleFault {
    /// Precondition violation; the loop must not continue.
    Fatal(PortError),
    /// The renderer could not produce a usable snapshot.
    Render(PortError),
    /// The snapshot was produced but its structure did not match
    /// expectations; the page format likely drifted.
    Structure(StructureMismatch),
}

fn sample_fault(err: PortError) -> CycleFault {
    match err {
        PortError::LoginRequired => CycleFault::Fatal(PortError::LoginRequired),
        other => CycleFault::Render(other),
    }
}

/// Drives the poll/notify/backoff cycle against the three ports.
///
/// One cycle runs fully to completion before the next starts; the only
/// suspension points are the login gate, the sampler's settle delays and the
/// inter-cycle sleep. The shutdown token is observed at the start of every
/// cycle and during the sleep.
pub struct PollLoop {
    sampler: Arc<dyn PageSampler>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn ConfigStore>,
}

impl PollLoop {
    pub fn new(
        sampler: Arc<dyn PageSampler>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            sampler,
            sink,
            store,
        }
    }

    /// Runs until `shutdown` is cancelled, the login gate fails, or the
    /// renderer stays unreachable for [`MAX_CONSECUTIVE_RENDER_FAULTS`]
    /// cycles in a row.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), PollLoopError> {
        self.sampler.await_login().await?;
        info!("login confirmed, starting watch cycles");

        let mut render_faults = 0u32;
        loop {
            if shutdown.is_cancelled() {
                info!("shutdown requested, stopping");
                return Ok(());
            }

            // Configuration is read once per cycle; changes apply from the
            // next cycle onward.
            let interval = match self.store.refresh_interval().await {
                Ok(interval) => interval,
                Err(err) => {
                    warn!(fault = %err, "could not read refresh interval, using default");
                    MIN_REFRESH_INTERVAL
                }
            };

            match self.run_cycle().await {
                Ok(()) => render_faults = 0,
                Err(CycleFault::Fatal(err)) => return Err(err.into()),
                Err(CycleFault::Render(err)) => {
                    render_faults += 1;
                    warn!(
                        fault = %err,
                        consecutive = render_faults,
                        "could not sample the slot page, retrying next cycle"
                    );
                    if render_faults >= MAX_CONSECUTIVE_RENDER_FAULTS {
                        return Err(PollLoopError::RendererUnavailable(render_faults));
                    }
                }
                Err(CycleFault::Structure(err)) => {
                    // The render itself worked, so the renderer is healthy.
                    render_faults = 0;
                    warn!(fault = %err, "page structure did not match expectations, skipping cycle");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// One full sample -> evaluate -> report pass.
    async fn run_cycle(&self) -> Result<(), CycleFault> {
        self.sampler.refresh().await.map_err(sample_fault)?;
        self.sampler.load_more().await.map_err(sample_fault)?;
        let snapshot = self.sampler.render().await.map_err(sample_fault)?;

        let window = DateWindow::compute(chrono::Local::now().date_naive());
        let mut result = AvailabilityResult::default();
        for date in window.tokens() {
            let open =
                evaluator::has_open_slot(&snapshot, date).map_err(CycleFault::Structure)?;
            result.record(date, open);
        }

        self.report(&result).await;
        Ok(())
    }

    /// Emits the cycle's status line and, when anything is open, one summary
    /// notification. Delivery and history faults are cycle-local: the next
    /// cycle simply notifies again if slots are still open.
    async fn report(&self, result: &AvailabilityResult) {
        let available = result.available_dates();
        if available.is_empty() {
            info!("no slots available");
            return;
        }

        info!(dates = ?available, "slots available");
        let message = format!("Delivery slots are open for: {}", available.join(", "));
        match self.sink.send(&message).await {
            Ok(()) => {
                if let Err(err) = self.store.append_history(Utc::now(), &message).await {
                    warn!(fault = %err, "notification sent but history append failed");
                }
            }
            Err(err) => {
                warn!(fault = %err, "notification delivery failed, retrying next cycle");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NotificationRecord, PageNode, PageSnapshot};
    use crate::evaluator::{entry_group_id, slot_container_id, UNATTENDED_REGION_ID};
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sampler that replays a script of render outcomes and cancels the
    /// shutdown token once the script is exhausted.
    struct ScriptedSampler {
        script: Mutex<VecDeque<PortResult<PageSnapshot>>>,
        login: Mutex<Option<PortError>>,
        shutdown: CancellationToken,
    }

    impl ScriptedSampler {
        fn new(
            script: Vec<PortResult<PageSnapshot>>,
            shutdown: CancellationToken,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                login: Mutex::new(None),
                shutdown,
            })
        }

        fn failing_login(shutdown: CancellationToken) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                login: Mutex::new(Some(PortError::LoginRequired)),
                shutdown,
            })
        }
    }

    #[async_trait]
    impl PageSampler for ScriptedSampler {
        async fn await_login(&self) -> PortResult<()> {
            match self.login.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn refresh(&self) -> PortResult<()> {
            Ok(())
        }

        async fn render(&self) -> PortResult<PageSnapshot> {
            let mut script = self.script.lock().unwrap();
            let outcome = script
                .pop_front()
                .unwrap_or_else(|| Err(PortError::Render("script exhausted".into())));
            if script.is_empty() {
                self.shutdown.cancel();
            }
            outcome
        }
    }

    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
        failures_remaining: Mutex<u32>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Self::failing_first(0)
        }

        fn failing_first(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
                failures_remaining: Mutex::new(failures),
            })
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, message: &str) -> PortResult<()> {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(PortError::Delivery("transport down".into()));
            }
            self.delivered.lock().unwrap().push(message.to_string());
            Ok(())
        }

        async fn register_endpoint(&self) -> PortResult<String> {
            Ok("https://notify.test/c/abc".into())
        }
    }

    struct MemoryStore {
        history: Mutex<Vec<NotificationRecord>>,
    }

    impl MemoryStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                history: Mutex::new(Vec::new()),
            })
        }

        fn history_len(&self) -> usize {
            self.history.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ConfigStore for MemoryStore {
        async fn refresh_interval(&self) -> PortResult<Duration> {
            Ok(MIN_REFRESH_INTERVAL)
        }

        async fn set_refresh_interval(&self, _interval: Duration) -> PortResult<()> {
            Ok(())
        }

        async fn subscription_endpoint(&self) -> PortResult<Option<String>> {
            Ok(Some("https://notify.test/c/abc".into()))
        }

        async fn set_subscription_endpoint(&self, _endpoint: &str) -> PortResult<()> {
            Ok(())
        }

        async fn append_history(
            &self,
            sent_at: DateTime<Utc>,
            message: &str,
        ) -> PortResult<()> {
            self.history.lock().unwrap().push(NotificationRecord {
                sent_at,
                message: message.to_string(),
            });
            Ok(())
        }

        async fn recent_history(&self, limit: u32) -> PortResult<Vec<NotificationRecord>> {
            let history = self.history.lock().unwrap();
            Ok(history.iter().rev().take(limit as usize).cloned().collect())
        }

        async fn clear_history(&self) -> PortResult<()> {
            self.history.lock().unwrap().clear();
            Ok(())
        }
    }

    fn entry(disabled: bool) -> PageNode {
        let node = PageNode::new("div");
        if disabled {
            node.with_class("disabledRadioBox")
        } else {
            node
        }
    }

    fn container(date: &str, entries: Vec<PageNode>) -> PageNode {
        let mut group = PageNode::new("div").with_id(entry_group_id(date));
        group.children = entries;
        PageNode::new("div")
            .with_id(slot_container_id(date))
            .with_child(PageNode::new("div").with_id(UNATTENDED_REGION_ID).with_child(group))
    }

    fn page(containers: Vec<PageNode>) -> PageSnapshot {
        let mut body = PageNode::new("body");
        body.children = containers;
        PageSnapshot::new(vec![body])
    }

    /// Today's window tokens, the way the loop will compute them.
    fn window_tokens() -> Vec<String> {
        DateWindow::compute(chrono::Local::now().date_naive())
            .tokens()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn notifies_exactly_the_available_dates() {
        let dates = window_tokens();
        // First date fully booked, second open, the rest absent from the page.
        let snapshot = page(vec![
            container(&dates[0], vec![entry(true), entry(true)]),
            container(&dates[1], vec![entry(true), entry(false)]),
        ]);

        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(vec![Ok(snapshot)], shutdown.clone());
        let sink = RecordingSink::new();
        let store = MemoryStore::new();

        let poll = PollLoop::new(sampler, sink.clone(), store.clone());
        poll.run(shutdown).await.unwrap();

        assert_eq!(
            sink.delivered(),
            vec![format!("Delivery slots are open for: {}", dates[1])]
        );
        assert_eq!(store.history_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_page_sends_nothing() {
        let dates = window_tokens();
        let snapshot = page(vec![container(&dates[0], vec![entry(true)])]);

        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(vec![Ok(snapshot)], shutdown.clone());
        let sink = RecordingSink::new();
        let store = MemoryStore::new();

        let poll = PollLoop::new(sampler, sink.clone(), store.clone());
        poll.run(shutdown).await.unwrap();

        assert!(sink.delivered().is_empty());
        assert_eq!(store.history_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn structure_fault_skips_the_cycle_but_not_the_loop() {
        let dates = window_tokens();
        // Container present but hollow: a format-drift fault on cycle one.
        let drifted = page(vec![
            PageNode::new("div").with_id(slot_container_id(&dates[0]))
        ]);
        let healthy = page(vec![container(&dates[0], vec![entry(false)])]);

        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(vec![Ok(drifted), Ok(healthy)], shutdown.clone());
        let sink = RecordingSink::new();
        let store = MemoryStore::new();

        let poll = PollLoop::new(sampler, sink.clone(), store.clone());
        poll.run(shutdown).await.unwrap();

        // The second cycle still ran and notified.
        assert_eq!(sink.delivered().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_fault_is_retried_on_the_next_cycle() {
        let dates = window_tokens();
        let open = || page(vec![container(&dates[0], vec![entry(false)])]);

        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(vec![Ok(open()), Ok(open())], shutdown.clone());
        let sink = RecordingSink::failing_first(1);
        let store = MemoryStore::new();

        let poll = PollLoop::new(sampler, sink.clone(), store.clone());
        poll.run(shutdown).await.unwrap();

        // First attempt failed, second succeeded; history only records the
        // delivered one.
        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(store.history_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn renderer_gives_up_after_consecutive_faults() {
        let faults = (0..MAX_CONSECUTIVE_RENDER_FAULTS)
            .map(|_| Err(PortError::Render("session unreachable".into())))
            .collect();

        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(faults, shutdown.clone());
        let poll = PollLoop::new(sampler, RecordingSink::new(), MemoryStore::new());

        match poll.run(shutdown).await {
            Err(PollLoopError::RendererUnavailable(n)) => {
                assert_eq!(n, MAX_CONSECUTIVE_RENDER_FAULTS)
            }
            other => panic!("expected renderer-unavailable, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_render_resets_the_fault_counter() {
        let dates = window_tokens();
        let mut script: Vec<PortResult<PageSnapshot>> = vec![
            Err(PortError::Render("unreachable".into())),
            Err(PortError::Render("unreachable".into())),
            Ok(page(vec![container(&dates[0], vec![entry(true)])])),
        ];
        script.extend(
            (0..MAX_CONSECUTIVE_RENDER_FAULTS - 1)
                .map(|_| Err(PortError::Render("unreachable".into()))),
        );

        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(script, shutdown.clone());
        let poll = PollLoop::new(sampler, RecordingSink::new(), MemoryStore::new());

        // Four trailing faults after a good cycle stay under the limit.
        poll.run(shutdown).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_gate_is_fatal() {
        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::failing_login(shutdown.clone());
        let poll = PollLoop::new(sampler, RecordingSink::new(), MemoryStore::new());

        match poll.run(shutdown).await {
            Err(PollLoopError::Port(PortError::LoginRequired)) => {}
            other => panic!("expected login-required, got {other:?}"),
        }
    }
}
