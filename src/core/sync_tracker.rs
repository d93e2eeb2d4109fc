//! Wall-clock progress for dashboards that show many generations at once

use std::time::Duration;
use tokio::time::Instant;

const RAMP_PERCENTAGE: f64 = 95.0;

/// Pull-style tracker: linear to 95% over the average time, then linear to
/// 100% over one more average. Trackers created at about the same instant
/// report the same value.
#[derive(Debug, Clone)]
pub struct SynchronizedProgressTracker {
    average_time: Duration,
    start: Instant,
}

impl SynchronizedProgressTracker {
    pub fn new(average_time: Duration) -> Self {
        Self {
            average_time: average_time.max(Duration::from_millis(1)),
            start: Instant::now(),
        }
    }

    pub fn get_progress(&self) -> f64 {
        self.progress_at(self.start.elapsed())
    }

    pub fn progress_at(&self, elapsed: Duration) -> f64 {
        let phase = elapsed.as_secs_f64() / self.average_time.as_secs_f64();
        let percentage = if phase <= 1.0 {
            RAMP_PERCENTAGE * phase
        } else {
            RAMP_PERCENTAGE + (100.0 - RAMP_PERCENTAGE) * (phase - 1.0)
        };
        percentage.clamp(0.0, 100.0)
    }

    #[allow(dead_code)]
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}
