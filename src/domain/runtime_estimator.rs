use std::collections::HashMap;

/// One day, in seconds. Services are never given a short estimate because
/// several typically must run concurrently for workflow progress; treating
/// them as long-running prevents a packing-induced deadlock (spec §4.D).
pub const SERVICE_WALL_TIME: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, Default)]
struct RunningMean {
    mean: f64,
    count: u64,
}

impl RunningMean {
    fn update(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }
}

/// Average-runtime memory keyed by job name, with a global fallback mean used
/// for names never seen before.
#[derive(Debug, Default)]
pub struct RuntimeEstimator {
    by_name: HashMap<String, RunningMean>,
    total: RunningMean,
}

impl RuntimeEstimator {
    pub fn new() -> Self {
        RuntimeEstimator::default()
    }

    pub fn add_completed(&mut self, name: &str, wall_time: f64) {
        self.by_name.entry(name.to_string()).or_default().update(wall_time);
        self.total.update(wall_time);
    }

    /// Estimates the wall-time to use for a queued job of `name`.
    pub fn estimate(&self, name: &str, is_service: bool) -> f64 {
        if is_service {
            return SERVICE_WALL_TIME;
        }
        if let Some(known) = self.by_name.get(name) {
            return known.mean;
        }
        if self.total.count > 0 {
            return self.total.mean;
        }
        1.0
    }

    pub fn total_jobs_completed(&self) -> u64 {
        self.total.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_always_gets_one_day() {
        let mut est = RuntimeEstimator::new();
        est.add_completed("svc", 5.0);
        assert_eq!(est.estimate("svc", true), SERVICE_WALL_TIME);
    }

    #[test]
    fn known_name_returns_running_mean() {
        let mut est = RuntimeEstimator::new();
        est.add_completed("foo", 10.0);
        est.add_completed("foo", 20.0);
        assert_eq!(est.estimate("foo", false), 15.0);
    }

    #[test]
    fn unknown_name_falls_back_to_global_mean() {
        let mut est = RuntimeEstimator::new();
        est.add_completed("foo", 10.0);
        est.add_completed("bar", 30.0);
        assert_eq!(est.estimate("baz", false), 20.0);
    }

    #[test]
    fn cold_start_returns_one() {
        let est = RuntimeEstimator::new();
        assert_eq!(est.estimate("anything", false), 1.0);
    }
}
