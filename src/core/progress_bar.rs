//! Seeded fake progress curve shared by every client watching the same generation

use crate::core::seeded_random::{ControlPoint, SeededRandom, generate_control_points};
use log::warn;
use std::time::Duration;

pub const DEFAULT_TARGET_PERCENTAGE: f64 = 95.0;

/// Fraction of the remaining percentage gained per `sqrt(overage)` in the crawl phase
const CRAWL_RATE: f64 = 0.3;

/// Multiple of the average time after which a run is flagged complete
const COMPLETE_AFTER_AVERAGES: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBarConfig {
    pub average_time: Duration,
    pub target_percentage: f64,
    pub seed: String,
}

impl ProgressBarConfig {
    pub fn new(average_time: Duration, seed: impl Into<String>) -> Self {
        let average_time = if average_time.is_zero() {
            warn!("Average time of zero is not usable, falling back to 1ms");
            Duration::from_millis(1)
        } else {
            average_time
        };

        Self {
            average_time,
            target_percentage: DEFAULT_TARGET_PERCENTAGE,
            seed: seed.into(),
        }
    }

    pub fn with_target_percentage(mut self, target_percentage: f64) -> Self {
        self.target_percentage = if target_percentage.is_nan() || target_percentage <= 0.0 {
            warn!("Target percentage {target_percentage} is out of range, using default");
            DEFAULT_TARGET_PERCENTAGE
        } else if target_percentage > 100.0 {
            warn!("Target percentage {target_percentage} exceeds 100, clamping");
            100.0
        } else {
            target_percentage
        };
        self
    }
}

/// Snapshot returned by [`ProgressBarController::get_progress`]. Never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressState {
    pub percentage: f64,
    pub elapsed_ms: f64,
    /// Heuristic timeout flag, unrelated to `percentage` reaching 100.
    pub is_complete: bool,
}

/// Immutable curve evaluator. Progress is a pure function of elapsed time.
#[derive(Debug, Clone)]
pub struct ProgressBarController {
    config: ProgressBarConfig,
    control_points: Vec<ControlPoint>,
}

impl ProgressBarController {
    pub fn new(config: ProgressBarConfig) -> Self {
        let mut random = SeededRandom::new(&config.seed);
        let control_points = generate_control_points(&mut random, config.target_percentage);
        Self {
            config,
            control_points,
        }
    }

    pub fn average_time(&self) -> Duration {
        self.config.average_time
    }

    pub fn target_percentage(&self) -> f64 {
        self.config.target_percentage
    }

    pub fn control_points(&self) -> &[ControlPoint] {
        &self.control_points
    }

    pub fn get_progress(&self, elapsed: Duration) -> ProgressState {
        self.get_progress_ms(elapsed.as_secs_f64() * 1000.0)
    }

    pub fn get_progress_ms(&self, elapsed_ms: f64) -> ProgressState {
        if elapsed_ms.is_nan() || elapsed_ms < 0.0 {
            return ProgressState {
                percentage: 0.0,
                elapsed_ms: 0.0,
                is_complete: false,
            };
        }

        let average_ms = self.config.average_time.as_secs_f64() * 1000.0;
        let target = self.config.target_percentage;
        let phase = elapsed_ms / average_ms;

        let percentage = if phase <= 1.0 {
            self.interpolate(phase).clamp(0.0, target)
        } else {
            let overage = phase - 1.0;
            let remaining = 100.0 - target;
            let crawl = remaining.min(remaining * overage.sqrt() * CRAWL_RATE);
            target + crawl
        };

        ProgressState {
            percentage: percentage.min(100.0),
            elapsed_ms,
            is_complete: elapsed_ms > average_ms * COMPLETE_AFTER_AVERAGES,
        }
    }

    /// Catmull-Rom over the segment bracketing `phase`, neighbours clamped at the ends.
    fn interpolate(&self, phase: f64) -> f64 {
        let points = &self.control_points;
        let last = points.len() - 1;

        let segment = points
            .windows(2)
            .position(|pair| phase >= pair[0].x && phase <= pair[1].x)
            .unwrap_or(last - 1);

        let p0 = points[segment.saturating_sub(1)];
        let p1 = points[segment];
        let p2 = points[segment + 1];
        let p3 = points[(segment + 2).min(last)];

        let span = p2.x - p1.x;
        let t = if span > 0.0 { (phase - p1.x) / span } else { 0.0 };
        let t2 = t * t;
        let t3 = t2 * t;

        0.5 * (2.0 * p1.y
            + (-p0.y + p2.y) * t
            + (2.0 * p0.y - 5.0 * p1.y + 4.0 * p2.y - p3.y) * t2
            + (-p0.y + 3.0 * p1.y - 3.0 * p2.y + p3.y) * t3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn controller(seed: &str, average_ms: u64) -> ProgressBarController {
        ProgressBarController::new(ProgressBarConfig::new(
            Duration::from_millis(average_ms),
            seed,
        ))
    }

    #[test]
    fn test_identical_seeds_produce_identical_sequences() {
        let a = controller("generation-abc", 10_000);
        let b = controller("generation-abc", 10_000);

        for elapsed in (0..50_000).step_by(137) {
            let left = a.get_progress_ms(elapsed as f64).percentage;
            let right = b.get_progress_ms(elapsed as f64).percentage;
            assert_eq!(left.to_bits(), right.to_bits(), "diverged at {elapsed}ms");
        }
    }

    #[test]
    fn test_ramp_is_pinned_at_both_ends() {
        for seed in ["x", "y", "z", "a much longer seed value", ""] {
            let progress = controller(seed, 8_000);
            assert_eq!(progress.get_progress_ms(0.0).percentage, 0.0);
            let at_average = progress.get_progress(Duration::from_millis(8_000)).percentage;
            assert!((at_average - 95.0).abs() < EPSILON, "seed {seed:?}: {at_average}");
        }
    }

    #[test]
    fn test_different_seeds_take_different_paths() {
        let seeds = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];
        let midpoints: Vec<u64> = seeds
            .iter()
            .map(|seed| controller(seed, 10_000).get_progress_ms(4_000.0).percentage.to_bits())
            .collect();
        let first = midpoints[0];
        assert!(midpoints.iter().any(|m| *m != first));
    }

    #[test]
    fn test_percentage_stays_bounded() {
        let progress = controller("bounded", 1_000);
        let mut elapsed = 0.0;
        while elapsed < 1_000_000.0 {
            let state = progress.get_progress_ms(elapsed);
            assert!(state.percentage >= 0.0 && state.percentage <= 100.0);
            elapsed += 97.0;
        }
        assert_eq!(progress.get_progress_ms(f64::MAX / 2.0).percentage, 100.0);
    }

    #[test]
    fn test_crawl_phase_formula() {
        let progress = controller("crawl", 10_000);
        let state = progress.get_progress_ms(20_000.0);
        assert!((state.percentage - 96.5).abs() < EPSILON, "{}", state.percentage);
    }

    #[test]
    fn test_crawl_reaches_100_only_after_twelve_averages() {
        let progress = controller("slow", 1_000);
        assert!(progress.get_progress_ms(11_000.0).percentage < 100.0);
        assert_eq!(progress.get_progress_ms(12_200.0).percentage, 100.0);
    }

    #[test]
    fn test_is_complete_is_decoupled_from_percentage() {
        let progress = controller("timeout", 1_000);
        let before = progress.get_progress_ms(3_000.0);
        assert!(!before.is_complete);

        let after = progress.get_progress_ms(3_001.0);
        assert!(after.is_complete);
        assert!(after.percentage < 100.0);
    }

    #[test]
    fn test_negative_elapsed_is_clamped() {
        let progress = controller("negative", 1_000);
        let state = progress.get_progress_ms(-250.0);
        assert_eq!(
            state,
            ProgressState {
                percentage: 0.0,
                elapsed_ms: 0.0,
                is_complete: false,
            }
        );
    }

    #[test]
    fn test_custom_target_percentage() {
        let config = ProgressBarConfig::new(Duration::from_secs(5), "custom").with_target_percentage(80.0);
        let progress = ProgressBarController::new(config);
        assert_eq!(progress.target_percentage(), 80.0);
        assert!((progress.get_progress_ms(5_000.0).percentage - 80.0).abs() < EPSILON);
        // overage 1: 80 + min(20, 20 * 0.3)
        assert!((progress.get_progress_ms(10_000.0).percentage - 86.0).abs() < EPSILON);
    }

    #[test]
    fn test_config_clamps_bad_input() {
        let config = ProgressBarConfig::new(Duration::ZERO, "zero").with_target_percentage(150.0);
        assert_eq!(config.average_time, Duration::from_millis(1));
        assert_eq!(config.target_percentage, 100.0);

        let config = ProgressBarConfig::new(Duration::from_secs(1), "neg").with_target_percentage(-3.0);
        assert_eq!(config.target_percentage, DEFAULT_TARGET_PERCENTAGE);
    }

    #[test]
    fn test_full_target_never_crawls() {
        let config = ProgressBarConfig::new(Duration::from_secs(1), "full").with_target_percentage(100.0);
        let progress = ProgressBarController::new(config);
        assert_eq!(progress.get_progress_ms(1_500.0).percentage, 100.0);
    }
}
