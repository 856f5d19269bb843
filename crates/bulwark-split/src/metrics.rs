//! Metrics for split planning and reading.
//!
//! Recorded through the `metrics` crate facade; the embedding process
//! installs whichever exporter it uses.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `bulwark_split_resolutions_total` | Counter | `result` | Access-request resolutions by outcome |
//! | `bulwark_split_plan_duration_seconds` | Histogram | - | Wall time of one planning pass |
//! | `bulwark_split_splits_planned_total` | Counter | - | Splits produced |
//! | `bulwark_split_records_read_total` | Counter | - | Records yielded by readers |
//! | `bulwark_split_failed_resources_total` | Counter | `mode` | Resources that failed to read |

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: access-request resolutions by outcome.
    pub const RESOLUTIONS_TOTAL: &str = "bulwark_split_resolutions_total";
    /// Histogram: planning pass duration in seconds.
    pub const PLAN_DURATION_SECONDS: &str = "bulwark_split_plan_duration_seconds";
    /// Counter: splits produced by planning.
    pub const SPLITS_PLANNED_TOTAL: &str = "bulwark_split_splits_planned_total";
    /// Counter: records yielded by readers.
    pub const RECORDS_READ_TOTAL: &str = "bulwark_split_records_read_total";
    /// Counter: resources that failed to open or read.
    pub const FAILED_RESOURCES_TOTAL: &str = "bulwark_split_failed_resources_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Resolution outcome (success, failure, timeout).
    pub const RESULT: &str = "result";
    /// Reader failure mode in effect.
    pub const MODE: &str = "mode";
}

/// Outcome of one access-request resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The request resolved to a grant.
    Success,
    /// The service rejected the request or the task died.
    Failure,
    /// The request did not resolve within the configured timeout.
    Timeout,
}

impl ResolutionOutcome {
    const fn as_label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
        }
    }
}

/// Records planning and reading metrics with consistent labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitMetrics;

impl SplitMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records the outcome of one resolution.
    pub fn record_resolution(&self, outcome: ResolutionOutcome) {
        counter!(names::RESOLUTIONS_TOTAL, labels::RESULT => outcome.as_label()).increment(1);
    }

    /// Records a finished planning pass.
    pub fn record_plan(&self, duration: Duration, splits: usize) {
        histogram!(names::PLAN_DURATION_SECONDS).record(duration.as_secs_f64());
        counter!(names::SPLITS_PLANNED_TOTAL).increment(splits as u64);
    }

    /// Records records yielded by a reader.
    pub fn record_records_read(&self, count: u64) {
        counter!(names::RECORDS_READ_TOTAL).increment(count);
    }

    /// Records one resource that failed to read.
    pub fn record_failed_resource(&self, mode: &'static str) {
        counter!(names::FAILED_RESOURCES_TOTAL, labels::MODE => mode).increment(1);
    }

    /// Starts a timer for a planning pass.
    #[must_use]
    pub fn start_timer(&self) -> PlanTimer {
        PlanTimer {
            start: Instant::now(),
        }
    }
}

/// Measures elapsed time of a planning pass.
#[derive(Debug)]
pub struct PlanTimer {
    start: Instant,
}

impl PlanTimer {
    /// Returns the elapsed time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_noop() {
        let metrics = SplitMetrics::new();
        metrics.record_resolution(ResolutionOutcome::Success);
        metrics.record_resolution(ResolutionOutcome::Timeout);
        metrics.record_plan(Duration::from_millis(3), 2);
        metrics.record_records_read(8);
        metrics.record_failed_resource("continue_on_read_failure");
    }

    #[test]
    fn timer_measures_elapsed() {
        let timer = SplitMetrics::new().start_timer();
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() >= Duration::from_millis(2));
    }
}
