use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An immutable resource vector: a node's or a job's demand/availability on every
/// axis, plus a wall-time and a preemptability flag.
///
/// `cores` is a rational (fractional cores are legal), so `Shape` cannot derive
/// `Eq`/`Ord`/`Hash`; callers that need a total order for FFD sorting use
/// [`Shape::cmp_for_ffd`] instead of `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub wall_time: u64,
    pub memory: u64,
    pub cores: f64,
    pub disk: u64,
    pub preemptable: bool,
}

impl Shape {
    pub fn new(wall_time: u64, memory: u64, cores: f64, disk: u64, preemptable: bool) -> Self {
        Shape { wall_time, memory, cores, disk, preemptable }
    }

    /// Bare-shape fit test: can `job` be placed on a node/slice of this shape,
    /// ignoring time entirely.
    pub fn fits(&self, job: &Shape) -> bool {
        job.memory <= self.memory && job.cores <= self.cores && job.disk <= self.disk && (job.preemptable || !self.preemptable)
    }

    /// Total order used only to sort job shapes descending (largest demand first)
    /// for first-fit-decreasing packing. Lexicographic by
    /// `(memory, cores, disk, wall_time, preemptable)` with `preemptable=false`
    /// sorting after `preemptable=true`; ties are acceptable.
    pub fn cmp_for_ffd(&self, other: &Shape) -> Ordering {
        self.memory
            .cmp(&other.memory)
            .then_with(|| self.cores.total_cmp(&other.cores))
            .then_with(|| self.disk.cmp(&other.disk))
            .then_with(|| self.wall_time.cmp(&other.wall_time))
            .then_with(|| (!self.preemptable).cmp(&!other.preemptable))
    }

    /// Splits a node's full shape into two time slices around a job occupying it
    /// for `t` seconds: `first` is reduced by the job's demand and lasts `t`
    /// seconds, `second` is the unreduced node shape for whatever wall-time
    /// remains once the job is gone.
    pub fn split(node_shape: &Shape, job_shape: &Shape, t: u64) -> (Shape, Shape) {
        let first = Shape {
            wall_time: t,
            memory: node_shape.memory - job_shape.memory,
            cores: node_shape.cores - job_shape.cores,
            disk: node_shape.disk - job_shape.disk,
            preemptable: node_shape.preemptable,
        };
        let second = Shape {
            wall_time: node_shape.wall_time.saturating_sub(t),
            memory: node_shape.memory,
            cores: node_shape.cores,
            disk: node_shape.disk,
            preemptable: node_shape.preemptable,
        };
        (first, second)
    }

    /// Reduces every non-wall-time axis of `slice` by `job`'s demand.
    pub fn subtract(slice: &Shape, job_shape: &Shape) -> Shape {
        Shape {
            wall_time: slice.wall_time,
            memory: slice.memory - job_shape.memory,
            cores: slice.cores - job_shape.cores,
            disk: slice.disk - job_shape.disk,
            preemptable: slice.preemptable,
        }
    }

    /// True if every axis of this shape is non-negative. Used by invariant tests.
    pub fn is_non_negative(&self) -> bool {
        self.cores >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_respects_preemptability() {
        let preemptable_node = Shape::new(3600, 8, 4.0, 100, true);
        let non_preemptable_node = Shape::new(3600, 8, 4.0, 100, false);
        let preemptable_job = Shape::new(60, 1, 1.0, 1, true);
        let non_preemptable_job = Shape::new(60, 1, 1.0, 1, false);

        // A preemptable job tolerates any node; a non-preemptable job needs a
        // non-preemptable (stable) node.
        assert!(preemptable_node.fits(&preemptable_job));
        assert!(!preemptable_node.fits(&non_preemptable_job));
        assert!(non_preemptable_node.fits(&non_preemptable_job));
        assert!(non_preemptable_node.fits(&preemptable_job));
    }

    #[test]
    fn split_reduces_first_slice_only() {
        let node = Shape::new(3600, 8, 4.0, 100, false);
        let job = Shape::new(1800, 4, 2.0, 50, false);
        let (first, second) = Shape::split(&node, &job, 1800);

        assert_eq!(first.wall_time, 1800);
        assert_eq!(first.memory, 4);
        assert_eq!(second.wall_time, 1800);
        assert_eq!(second.memory, 8);
    }
}
