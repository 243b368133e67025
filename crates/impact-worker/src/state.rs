use std::sync::atomic::{AtomicBool, AtomicI64, AtomicI8, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Worker status codes shared with the health reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum WorkerStatus {
    Error = -1,
    Stopped = 0,
    Running = 1,
}

impl WorkerStatus {
    fn from_raw(raw: i8) -> Self {
        match raw {
            1 => WorkerStatus::Running,
            0 => WorkerStatus::Stopped,
            _ => WorkerStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Error => "error",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Running => "running",
        }
    }
}

/// Liveness block shared between the processing loop and the health
/// reporter.
///
/// Every field is written only by the processing loop and read by the
/// health reporter and supervisor; each update is a single atomic write,
/// with no cross-field transaction. The long-task pair is armed
/// estimate-first and cleared start-first, so a reader that observes a
/// non-zero start always finds the matching estimate.
pub struct LivenessState {
    status: AtomicI8,
    /// Epoch milliseconds of the last heartbeat, 0 = never.
    last_heartbeat_ms: AtomicI64,
    /// Epoch milliseconds when the in-flight long task began, 0 = idle.
    task_start_ms: AtomicI64,
    /// Expected duration of the in-flight long task in seconds, 0 = idle.
    task_expected_secs: AtomicU64,
    /// Set once the first poll against the broker succeeds.
    ready: AtomicBool,
}

impl LivenessState {
    pub fn new() -> Self {
        LivenessState {
            status: AtomicI8::new(WorkerStatus::Stopped as i8),
            last_heartbeat_ms: AtomicI64::new(0),
            task_start_ms: AtomicI64::new(0),
            task_expected_secs: AtomicU64::new(0),
            ready: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus::from_raw(self.status.load(Ordering::SeqCst))
    }

    pub fn set_status(&self, status: WorkerStatus) {
        self.status.store(status as i8, Ordering::SeqCst);
    }

    /// Record a heartbeat at the current wall-clock time.
    pub fn beat(&self) {
        self.beat_at(Utc::now());
    }

    /// Record a heartbeat. Never moves the timestamp backwards.
    pub fn beat_at(&self, at: DateTime<Utc>) {
        self.last_heartbeat_ms
            .fetch_max(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Last heartbeat, or `None` if no heartbeat was ever recorded.
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        match self.last_heartbeat_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// Mark the start of a long-running task.
    pub fn begin_task(&self, expected: Duration) {
        self.begin_task_at(Utc::now(), expected);
    }

    pub fn begin_task_at(&self, at: DateTime<Utc>, expected: Duration) {
        // Sub-second estimates would read as idle; clamp to one second.
        let expected_secs = expected.as_secs().max(1);
        self.task_expected_secs.store(expected_secs, Ordering::SeqCst);
        self.task_start_ms
            .store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Clear long-task tracking.
    pub fn end_task(&self) {
        self.task_start_ms.store(0, Ordering::SeqCst);
        self.task_expected_secs.store(0, Ordering::SeqCst);
    }

    /// Start time and expected duration of the in-flight long task, or
    /// `None` when idle.
    pub fn task_window(&self) -> Option<(DateTime<Utc>, Duration)> {
        let start_ms = self.task_start_ms.load(Ordering::SeqCst);
        let expected_secs = self.task_expected_secs.load(Ordering::SeqCst);
        if start_ms == 0 || expected_secs == 0 {
            return None;
        }
        let start = DateTime::from_timestamp_millis(start_ms)?;
        Some((start, Duration::from_secs(expected_secs)))
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn raw_task_pair(&self) -> (i64, u64) {
        (
            self.task_start_ms.load(Ordering::SeqCst),
            self.task_expected_secs.load(Ordering::SeqCst),
        )
    }
}

impl Default for LivenessState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initial_state() {
        let state = LivenessState::new();

        assert_eq!(state.status(), WorkerStatus::Stopped);
        assert!(state.last_heartbeat().is_none());
        assert!(state.task_window().is_none());
        assert!(!state.is_ready());
    }

    #[test]
    fn test_status_round_trip() {
        let state = LivenessState::new();

        state.set_status(WorkerStatus::Running);
        assert_eq!(state.status(), WorkerStatus::Running);

        state.set_status(WorkerStatus::Error);
        assert_eq!(state.status(), WorkerStatus::Error);
    }

    #[test]
    fn test_heartbeat_is_monotonic() {
        let state = LivenessState::new();
        let now = Utc::now();

        state.beat_at(now);
        state.beat_at(now - chrono::Duration::seconds(30));

        // The stale write must not move the heartbeat backwards.
        assert_eq!(
            state.last_heartbeat().unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
    }

    #[test]
    fn test_task_window_round_trip() {
        let state = LivenessState::new();
        let start = Utc::now();

        state.begin_task_at(start, Duration::from_secs(90));
        let (seen_start, expected) = state.task_window().unwrap();
        assert_eq!(seen_start.timestamp_millis(), start.timestamp_millis());
        assert_eq!(expected, Duration::from_secs(90));

        state.end_task();
        assert!(state.task_window().is_none());
    }

    #[test]
    fn test_sub_second_estimate_is_clamped() {
        let state = LivenessState::new();

        state.begin_task_at(Utc::now(), Duration::from_millis(200));
        let (_, expected) = state.task_window().unwrap();
        assert_eq!(expected, Duration::from_secs(1));
    }

    proptest! {
        #[test]
        fn prop_task_pair_idle_together(ops in proptest::collection::vec(0u8..3, 1..64)) {
            let state = LivenessState::new();
            let base = Utc::now();

            for (i, op) in ops.into_iter().enumerate() {
                let at = base + chrono::Duration::milliseconds(i as i64 * 10);
                match op {
                    0 => state.beat_at(at),
                    1 => state.begin_task_at(at, Duration::from_secs(60)),
                    _ => state.end_task(),
                }

                let (start, expected) = state.raw_task_pair();
                prop_assert_eq!(start == 0, expected == 0);
            }
        }

        #[test]
        fn prop_heartbeat_never_decreases(offsets in proptest::collection::vec(0i64..10_000, 1..32)) {
            let state = LivenessState::new();
            let base = Utc::now();
            let mut high_water = 0i64;

            for offset in offsets {
                state.beat_at(base + chrono::Duration::milliseconds(offset));
                let heartbeat = state.last_heartbeat().unwrap().timestamp_millis();
                prop_assert!(heartbeat >= high_water);
                high_water = heartbeat;
            }
        }
    }
}
