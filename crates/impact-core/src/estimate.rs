use std::time::Duration;

use crate::Job;

/// Estimates how long a job is expected to run.
///
/// Implementations are pure heuristics. The coordination logic only uses
/// the estimate to decide whether a job is tracked as long-running and to
/// size the adaptive liveness timeout, so accuracy can evolve here without
/// touching the loop.
pub trait DurationEstimator: Send + Sync {
    fn estimate(&self, job: &Job) -> Duration;
}

const SPATIAL_OVERLAY_SECS: u64 = 120;
const LEVY_CALCULATION_SECS: u64 = 10;

/// Default estimator: an explicit producer hint wins, otherwise a
/// per-kind baseline. Unknown kinds estimate zero and are never tracked
/// as long tasks.
pub struct HeuristicEstimator;

impl DurationEstimator for HeuristicEstimator {
    fn estimate(&self, job: &Job) -> Duration {
        if let Some(secs) = job.estimated_duration_secs {
            return Duration::from_secs(secs);
        }

        let secs = match job.kind.as_str() {
            "spatial_overlay" => SPATIAL_OVERLAY_SECS,
            "levy_calculation" => LEVY_CALCULATION_SECS,
            _ => 0,
        };
        Duration::from_secs(secs)
    }
}
