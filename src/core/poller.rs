//! Status polling for a single generation at a time

use crate::core::generation::{
    FetchError, GenerationRecord, GenerationSource, GenerationStatus, display_progress,
};
use crate::core::latch::TerminalLatch;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(5 * 60);

pub const POLLING_TIMEOUT_MESSAGE: &str = "Generation polling timed out";

pub type CompleteCallback = Arc<dyn Fn(&GenerationRecord, Option<&str>) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// What a failed fetch (network, HTTP status, bad payload) does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransientErrorPolicy {
    /// Record the error, report it through `on_error` and stop polling.
    #[default]
    Stop,
    /// Record the error and keep polling until a terminal status or the timeout.
    Retry,
}

impl FromStr for TransientErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(TransientErrorPolicy::Stop),
            "retry" => Ok(TransientErrorPolicy::Retry),
            other => Err(format!(
                "Unknown transient error policy '{other}' (expected 'stop' or 'retry')"
            )),
        }
    }
}

impl fmt::Display for TransientErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientErrorPolicy::Stop => f.write_str("stop"),
            TransientErrorPolicy::Retry => f.write_str("retry"),
        }
    }
}

#[derive(Clone)]
pub struct PollingOptions {
    pub interval: Duration,
    pub max_duration: Duration,
    pub transient_errors: TransientErrorPolicy,
    pub on_complete: Option<CompleteCallback>,
    pub on_error: Option<ErrorCallback>,
    pub latch: Option<TerminalLatch>,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: DEFAULT_MAX_POLL_DURATION,
            transient_errors: TransientErrorPolicy::default(),
            on_complete: None,
            on_error: None,
            latch: None,
        }
    }
}

impl PollingOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_transient_errors(mut self, policy: TransientErrorPolicy) -> Self {
        self.transient_errors = policy;
        self
    }

    pub fn with_latch(mut self, latch: TerminalLatch) -> Self {
        self.latch = Some(latch);
        self
    }

    pub fn on_complete(
        mut self,
        callback: impl Fn(&GenerationRecord, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    fn first_terminal_notice(&self, generation_id: &str) -> bool {
        self.latch
            .as_ref()
            .is_none_or(|latch| latch.try_mark(generation_id))
    }

    fn report_error(&self, message: &str) {
        if let Some(on_error) = &self.on_error {
            on_error(message);
        }
    }
}

/// What a caller renders from: the last observed record and session flags.
#[allow(dead_code)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollingSnapshot {
    pub generation: Option<GenerationRecord>,
    pub input_url: Option<String>,
    pub output_url: Option<String>,
    pub is_polling: bool,
    pub error: Option<String>,
    pub progress: u8,
}

#[derive(Debug, Default)]
struct PollingState {
    generation: Option<GenerationRecord>,
    input_url: Option<String>,
    output_url: Option<String>,
    is_polling: bool,
    error: Option<String>,
}

impl PollingState {
    fn observe(&mut self, record: &GenerationRecord) {
        self.input_url = record.input_url.clone();
        self.output_url = record.output_url.clone();
        self.error = None;
        self.generation = Some(record.clone());
    }
}

enum Flow {
    Continue,
    Stop,
}

/// State shared between the owning poller and its background session.
///
/// `epoch` identifies the live session and doubles as the dispatch lock:
/// results are applied and callbacks run while it is held, and teardown bumps
/// it under the same lock, so nothing from an old session lands afterwards.
#[derive(Default)]
struct Shared {
    state: Mutex<PollingState>,
    epoch: Mutex<u64>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, PollingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(
        &self,
        epoch: u64,
        generation_id: &str,
        result: Result<GenerationRecord, FetchError>,
        options: &PollingOptions,
    ) -> Flow {
        let current = self.epoch();
        if *current != epoch {
            debug!("Discarding stale poll result for {generation_id}");
            return Flow::Stop;
        }

        match result {
            Ok(record) => match record.status {
                GenerationStatus::Completed => {
                    {
                        let mut state = self.state();
                        state.observe(&record);
                        state.is_polling = false;
                    }
                    info!("Generation {generation_id} completed");
                    if options.first_terminal_notice(generation_id) {
                        if let Some(on_complete) = &options.on_complete {
                            on_complete(&record, record.output_url.as_deref());
                        }
                    }
                    Flow::Stop
                }
                GenerationStatus::Failed => {
                    let message = record.failure_message();
                    {
                        let mut state = self.state();
                        state.observe(&record);
                        state.error = Some(message.clone());
                        state.is_polling = false;
                    }
                    warn!("Generation {generation_id} failed: {message}");
                    if options.first_terminal_notice(generation_id) {
                        options.report_error(&message);
                    }
                    Flow::Stop
                }
                GenerationStatus::Pending | GenerationStatus::Processing => {
                    debug!("Generation {generation_id} is {}", record.status);
                    self.state().observe(&record);
                    Flow::Continue
                }
            },
            Err(err) => {
                let message = err.to_string();
                match options.transient_errors {
                    TransientErrorPolicy::Stop => {
                        warn!("Stopping poll for {generation_id} after fetch error: {message}");
                        {
                            let mut state = self.state();
                            state.error = Some(message.clone());
                            state.is_polling = false;
                        }
                        options.report_error(&message);
                        Flow::Stop
                    }
                    TransientErrorPolicy::Retry => {
                        warn!("Fetch error for {generation_id}, will retry: {message}");
                        self.state().error = Some(message);
                        Flow::Continue
                    }
                }
            }
        }
    }

    fn time_out(&self, epoch: u64, generation_id: &str, options: &PollingOptions) {
        let current = self.epoch();
        if *current != epoch {
            return;
        }

        warn!(
            "Polling for {generation_id} exceeded {:?}, giving up",
            options.max_duration
        );
        {
            let mut state = self.state();
            state.error = Some(POLLING_TIMEOUT_MESSAGE.to_string());
            state.is_polling = false;
        }
        options.report_error(POLLING_TIMEOUT_MESSAGE);
    }
}

/// Polls one generation until it settles, times out, or the id changes.
///
/// Fetches within a session are strictly sequential. Callbacks run on the
/// runtime's worker and must not block; they may read [`snapshot`](Self::snapshot).
pub struct GenerationPoller {
    source: Arc<dyn GenerationSource>,
    options: PollingOptions,
    shared: Arc<Shared>,
    generation_id: Option<String>,
    task: Option<JoinHandle<()>>,
}

impl GenerationPoller {
    pub fn new(source: Arc<dyn GenerationSource>, options: PollingOptions) -> Self {
        Self {
            source,
            options,
            shared: Arc::new(Shared::default()),
            generation_id: None,
            task: None,
        }
    }

    #[allow(dead_code)]
    pub fn generation_id(&self) -> Option<&str> {
        self.generation_id.as_deref()
    }

    /// Start polling a new id (fetching immediately) or stop with `None`.
    ///
    /// Setting the id that is already current does nothing. Must be called
    /// from within a tokio runtime.
    pub fn set_generation_id(&mut self, generation_id: Option<String>) {
        if self.generation_id == generation_id {
            return;
        }

        self.teardown();
        self.generation_id = generation_id.clone();

        let Some(id) = generation_id else {
            return;
        };

        info!("Starting status polling for generation {id}");
        let epoch = *self.shared.epoch();
        self.shared.state().is_polling = true;

        let source = Arc::clone(&self.source);
        let shared = Arc::clone(&self.shared);
        let options = self.options.clone();
        self.task = Some(tokio::spawn(run_session(source, shared, options, id, epoch)));
    }

    pub fn snapshot(&self) -> PollingSnapshot {
        let state = self.shared.state();
        PollingSnapshot {
            generation: state.generation.clone(),
            input_url: state.input_url.clone(),
            output_url: state.output_url.clone(),
            is_polling: state.is_polling,
            error: state.error.clone(),
            progress: display_progress(state.generation.as_ref()),
        }
    }

    /// One fetch and state update outside the timer schedule. No callbacks fire.
    #[allow(dead_code)]
    pub async fn refetch(&self) -> Option<GenerationRecord> {
        let id = self.generation_id.clone()?;
        let epoch = *self.shared.epoch();
        let result = self.source.fetch_generation_status(&id).await;

        let current = self.shared.epoch();
        let live = *current == epoch;
        match result {
            Ok(record) => {
                if live {
                    let mut state = self.shared.state();
                    state.observe(&record);
                    if record.status == GenerationStatus::Failed {
                        state.error = Some(record.failure_message());
                    }
                }
                Some(record)
            }
            Err(err) => {
                warn!("Refetch of generation {id} failed: {err}");
                if live {
                    self.shared.state().error = Some(err.to_string());
                }
                None
            }
        }
    }

    fn teardown(&mut self) {
        let mut epoch = self.shared.epoch();
        *epoch += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        *self.shared.state() = PollingState::default();
        if let Some(id) = &self.generation_id {
            debug!("Stopped polling generation {id}");
        }
    }
}

impl Drop for GenerationPoller {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_session(
    source: Arc<dyn GenerationSource>,
    shared: Arc<Shared>,
    options: PollingOptions,
    generation_id: String,
    epoch: u64,
) {
    let started = Instant::now();
    loop {
        if started.elapsed() > options.max_duration {
            shared.time_out(epoch, &generation_id, &options);
            return;
        }

        let result = source.fetch_generation_status(&generation_id).await;
        match shared.apply(epoch, &generation_id, result, &options) {
            Flow::Continue => tokio::time::sleep(options.interval).await,
            Flow::Stop => return,
        }
    }
}
