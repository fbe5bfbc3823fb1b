use crate::history::{classify_response, FetchOutcome, History};
use crate::stats::{self, StatsBundle};
use crate::transport::HistoryFetcher;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Fixed cadence for the time-dependent recomputation; no network access.
pub const UI_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// Signals emitted to the hosting consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// Fresh tables, re-emitted after every recomputation.
    TablesUpdated(StatsBundle),
    /// The node left tracing mode; the host should leave the trace view.
    NavigateAway,
}

/// All shared mutable state, owned by the poller and only ever touched from
/// inside its two tasks.
#[derive(Debug, Default)]
pub struct EngineState {
    pub history: Option<History>,
    pub start_up_timestamp: Option<i64>,
    pub tables: StatsBundle,
}

struct PollTasks {
    ui: JoinHandle<()>,
    fetch: JoinHandle<()>,
}

/// Two-state lifecycle (Stopped/Running) around a fast UI tick and a
/// configurable fetch tick. `start` and `stop` are the sole mutators of the
/// task handles and both are idempotent.
pub struct Poller {
    fetcher: Arc<dyn HistoryFetcher>,
    state: Arc<Mutex<EngineState>>,
    signals: mpsc::UnboundedSender<EngineSignal>,
    node_count: usize,
    refresh_interval: Duration,
    tasks: Option<PollTasks>,
}

impl Poller {
    pub fn new(
        fetcher: Arc<dyn HistoryFetcher>,
        node_count: usize,
        refresh_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<EngineSignal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        let poller = Self {
            fetcher,
            state: Arc::new(Mutex::new(EngineState::default())),
            signals,
            node_count,
            // tokio intervals panic on a zero period, and a panic inside the
            // detached fetch task would kill the schedule silently.
            refresh_interval: refresh_interval.max(Duration::from_millis(1)),
            tasks: None,
        };
        (poller, rx)
    }

    pub fn state(&self) -> Arc<Mutex<EngineState>> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.tasks.is_some()
    }

    /// Begin both periodic schedules. Restarting while running stops the old
    /// schedules first, so exactly one of each task is ever live.
    pub fn start(&mut self) {
        self.stop();

        let state = self.state.clone();
        let signals = self.signals.clone();
        let node_count = self.node_count;
        let ui = tokio::spawn(async move {
            let mut tick = tokio::time::interval(UI_TICK_INTERVAL);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                recompute_and_emit(&state, node_count, &signals).await;
            }
        });

        let fetcher = self.fetcher.clone();
        let state = self.state.clone();
        let signals = self.signals.clone();
        let node_count = self.node_count;
        let refresh_interval = self.refresh_interval;
        let fetch = tokio::spawn(async move {
            let mut tick = tokio::time::interval(refresh_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // Awaiting the fetch inside the loop means a slow response
                // delays its own cycle instead of racing the next one.
                tick.tick().await;
                fetch_cycle(fetcher.as_ref(), &state, node_count, &signals).await;
            }
        });

        self.tasks = Some(PollTasks { ui, fetch });
        info!(
            refresh_interval_ms = self.refresh_interval.as_millis() as u64,
            "history polling started"
        );
    }

    /// Cancel both schedules. No further callback fires afterwards and an
    /// in-flight fetch cannot resurrect state. No-op when already stopped.
    pub fn stop(&mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.ui.abort();
            tasks.fetch.abort();
            info!("history polling stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// One fetch-classify-recompute cycle. Every failure is absorbed here and
/// naturally retried on the next tick; nothing is fatal.
pub(crate) async fn fetch_cycle(
    fetcher: &dyn HistoryFetcher,
    state: &Mutex<EngineState>,
    node_count: usize,
    signals: &mpsc::UnboundedSender<EngineSignal>,
) {
    let outcome = match fetcher.fetch_history().await {
        Ok(body) => classify_response(&body),
        Err(err) => {
            warn!("history fetch failed: {err}");
            FetchOutcome::Reset
        }
    };

    match outcome {
        FetchOutcome::Snapshot(history) => {
            let mut st = state.lock().await;
            st.start_up_timestamp = Some(history.start_up_timestamp);
            st.history = Some(history);
        }
        FetchOutcome::ModeMismatch => {
            debug!("node is back in file sharer mode");
            let _ = signals.send(EngineSignal::NavigateAway);
            return;
        }
        FetchOutcome::Reset => {
            let now = now_ms();
            let mut st = state.lock().await;
            st.start_up_timestamp = Some(now);
            st.history = Some(History {
                start_up_timestamp: now,
                ..History::default()
            });
        }
    }

    recompute_and_emit(state, node_count, signals).await;
}

async fn recompute_and_emit(
    state: &Mutex<EngineState>,
    node_count: usize,
    signals: &mpsc::UnboundedSender<EngineSignal>,
) {
    let mut st = state.lock().await;
    let elapsed = st.start_up_timestamp.map(|ts| now_ms() - ts);
    st.tables = stats::recompute(st.history.as_ref(), node_count, elapsed);
    let _ = signals.send(EngineSignal::TablesUpdated(st.tables.clone()));
}
