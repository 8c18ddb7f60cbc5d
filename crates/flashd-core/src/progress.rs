//! Shared progress-record construction and rate math for the Write and
//! Verify Engines.

use std::time::{Duration, Instant};

/// A single progress observation. Immutable once built.
#[derive(Debug, Clone, Copy)]
pub struct WriteProgress {
    pub percent: u64,
    pub bytes_done: u64,
    pub total: u64,
    pub instant_rate_bps: u64,
    pub avg_rate_bps: u64,
}

/// The reduced form used by the Verify Engine: percent only.
#[derive(Debug, Clone, Copy)]
pub struct VerifyProgress {
    pub percent: u64,
}

/// Tracks byte/time accumulators and decides when the dual 8 MiB / 100 ms
/// trigger fires.
pub struct ProgressTracker {
    total: u64,
    bytes_done: u64,
    bytes_since_update: u64,
    started_at: Instant,
    last_update_at: Instant,
    iteration: u64,
}

const BYTES_TRIGGER: u64 = 8 * 1024 * 1024;
const TIME_TRIGGER: Duration = Duration::from_millis(100);
const TIMER_CHECK_EVERY: u64 = 100;

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        let now = Instant::now();
        Self {
            total,
            bytes_done: 0,
            bytes_since_update: 0,
            started_at: now,
            last_update_at: now,
            iteration: 0,
        }
    }

    /// Records that `n` more bytes were transferred and returns a progress
    /// record if the emission trigger fires this iteration. `finished`
    /// forces emission regardless of the trigger, for when the write just
    /// completed.
    pub fn record(&mut self, n: u64, finished: bool) -> Option<WriteProgress> {
        self.bytes_done += n;
        self.bytes_since_update += n;
        self.iteration += 1;

        let time_due = self.iteration % TIMER_CHECK_EVERY == 0
            && self.last_update_at.elapsed() >= TIME_TRIGGER;
        let bytes_due = self.bytes_since_update >= BYTES_TRIGGER;

        if !(bytes_due || time_due || finished) {
            return None;
        }

        let now = Instant::now();
        let since_update = now.duration_since(self.last_update_at);
        let since_start = now.duration_since(self.started_at);

        let instant_rate_bps = saturating_rate(self.bytes_since_update, since_update);
        let avg_rate_bps = saturating_rate(self.bytes_done, since_start);

        self.bytes_since_update = 0;
        self.last_update_at = now;

        let percent = if self.total == 0 {
            100
        } else {
            ((self.bytes_done as u128 * 100) / self.total as u128).min(100) as u64
        };

        Some(WriteProgress {
            percent,
            bytes_done: self.bytes_done,
            total: self.total,
            instant_rate_bps,
            avg_rate_bps,
        })
    }

    pub fn verify_progress(bytes_done: u64, total: u64) -> VerifyProgress {
        let percent = if total == 0 {
            100
        } else {
            ((bytes_done as u128 * 100) / total as u128).min(100) as u64
        };
        VerifyProgress { percent }
    }
}

/// Converts a bytes/duration pair to a bps rate with saturating-float
/// rules: non-finite or non-positive rates clamp to 0, out-of-range rates
/// saturate to `u64::MAX`.
fn saturating_rate(bytes: u64, elapsed: Duration) -> u64 {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return 0;
    }
    let rate = bytes as f64 / seconds;
    if !rate.is_finite() || rate <= 0.0 {
        0
    } else if rate >= u64::MAX as f64 {
        u64::MAX
    } else {
        rate as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_rate_clamps_non_finite_and_negative() {
        assert_eq!(saturating_rate(0, Duration::from_secs(0)), 0);
        assert_eq!(saturating_rate(100, Duration::from_secs(1)), 100);
    }

    #[test]
    fn verify_progress_caps_at_100() {
        let progress = ProgressTracker::verify_progress(200, 100);
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn forced_finish_emits_even_under_trigger_thresholds() {
        let mut tracker = ProgressTracker::new(1024);
        let emitted = tracker.record(10, true);
        assert!(emitted.is_some());
        let record = emitted.unwrap();
        assert_eq!(record.bytes_done, 10);
        assert!(record.percent <= 100);
    }

    #[test]
    fn byte_trigger_fires_past_threshold() {
        let mut tracker = ProgressTracker::new(64 * 1024 * 1024);
        assert!(tracker.record(BYTES_TRIGGER, false).is_some());
    }

    #[test]
    fn below_threshold_does_not_emit() {
        let mut tracker = ProgressTracker::new(64 * 1024 * 1024);
        assert!(tracker.record(1024, false).is_none());
    }
}
