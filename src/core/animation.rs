//! Frame-driven progress animation on top of [`ProgressBarController`]

use crate::core::progress_bar::{ProgressBarConfig, ProgressBarController};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Roughly one frame at 60Hz
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

pub struct AnimationConfig {
    pub progress: ProgressBarConfig,
    pub frame_interval: Duration,
    pub on_complete: Option<CompletionCallback>,
}

impl AnimationConfig {
    pub fn new(progress: ProgressBarConfig) -> Self {
        Self {
            progress,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            on_complete: None,
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval.max(Duration::from_millis(1));
        self
    }

    #[allow(dead_code)]
    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

/// Cancels the animation when [`cancel`](Self::cancel) is called or the handle is dropped.
pub struct AnimationHandle {
    cancelled: Arc<Mutex<bool>>,
    stop_after_frame: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl AnimationHandle {
    /// No callback starts once this returns.
    ///
    /// Also callable from inside `on_progress`: the current frame finishes and
    /// neither another frame nor `on_complete` follows it.
    pub fn cancel(&self) {
        if tokio::task::try_id() == Some(self.task.id()) {
            // the gate is held by the frame that is calling us
            self.stop_after_frame.store(true, Ordering::SeqCst);
            return;
        }
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.task.abort();
    }

    #[allow(dead_code)]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for AnimationHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Sample the progress curve once per frame and report it through `on_progress`.
///
/// Stops scheduling frames after the percentage reaches 100, firing
/// `on_complete` at most once. Must be called from within a tokio runtime.
pub fn animate_progress<F>(mut on_progress: F, config: AnimationConfig) -> AnimationHandle
where
    F: FnMut(f64) + Send + 'static,
{
    let AnimationConfig {
        progress,
        frame_interval,
        mut on_complete,
    } = config;
    let controller = ProgressBarController::new(progress);
    let cancelled = Arc::new(Mutex::new(false));
    let gate = Arc::clone(&cancelled);
    let stop_after_frame = Arc::new(AtomicBool::new(false));
    let stop = Arc::clone(&stop_after_frame);

    let task = tokio::spawn(async move {
        let start = Instant::now();
        let mut frames = tokio::time::interval(frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            frames.tick().await;

            let guard = gate.lock().unwrap_or_else(PoisonError::into_inner);
            if *guard {
                break;
            }

            let state = controller.get_progress(start.elapsed());
            on_progress(state.percentage);

            if stop.load(Ordering::SeqCst) {
                debug!("Progress animation cancelled from its own callback");
                break;
            }

            if state.percentage >= 100.0 {
                if let Some(done) = on_complete.take() {
                    debug!("Progress animation finished after {:.0}ms", state.elapsed_ms);
                    done();
                }
                break;
            }
        }
    });

    AnimationHandle {
        cancelled,
        stop_after_frame,
        task,
    }
}
