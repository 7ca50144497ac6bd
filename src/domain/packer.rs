use std::collections::HashMap;

use crate::domain::reservation::NodeReservation;
use crate::domain::shape::Shape;

/// Identifies a node shape by its position in the operator-supplied
/// `node_shapes` slice. Iteration order of that slice is fixed and meaningful
/// (the packer always tries node shapes in the order given), so an index is a
/// simpler and cheaper key than the `Shape` itself, which cannot derive `Hash`
/// because of its `f64` `cores` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeShapeId(pub usize);

/// First-fit-decreasing packer over time-sliced node reservations.
///
/// Converts a set of job shapes into an estimate of the minimum number of
/// nodes of each shape needed so that every job can *begin* by `target_time`
/// seconds into that node's life.
#[derive(Debug, Clone, Copy)]
pub struct BinPacker {
    pub target_time: u64,
}

impl BinPacker {
    pub fn new(target_time: u64) -> Self {
        BinPacker { target_time }
    }

    /// Packs `job_shapes` onto `node_shapes`, returning a count of reservations
    /// (i.e. nodes) needed per node shape index. Jobs that fit no configured
    /// node shape are warned about and dropped from packing entirely — they
    /// remain queued indefinitely; this is by design, see spec §7.
    pub fn pack(&self, job_shapes: &[Shape], node_shapes: &[Shape]) -> HashMap<NodeShapeId, usize> {
        let mut sorted: Vec<&Shape> = job_shapes.iter().collect();
        sorted.sort_by(|a, b| b.cmp_for_ffd(a));

        let mut reservations: HashMap<NodeShapeId, Vec<NodeReservation>> = HashMap::new();

        for job in sorted {
            let chosen = node_shapes.iter().enumerate().find(|(_, shape)| shape.fits(job));

            let Some((idx, node_shape)) = chosen else {
                log::warn!(
                    "no configured node shape fits job (memory={}, cores={}, disk={}, preemptable={}); dropping from packing, it will remain queued",
                    job.memory,
                    job.cores,
                    job.disk,
                    job.preemptable
                );
                continue;
            };

            let id = NodeShapeId(idx);
            let chain_list = reservations.entry(id).or_default();

            let placed = chain_list.iter_mut().any(|chain| chain.attempt_to_add_job(node_shape, job, self.target_time));

            if !placed {
                let mut chain = NodeReservation::new(node_shape);
                let ok = chain.attempt_to_add_job(node_shape, job, self.target_time);
                debug_assert!(ok, "a freshly created reservation of a fitting node shape must always accept the job");
                chain_list.push(chain);
            }
        }

        reservations.into_iter().map(|(id, chains)| (id, chains.len())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(wall_time: u64, memory: u64, cores: f64, disk: u64, preemptable: bool) -> Shape {
        Shape::new(wall_time, memory, cores, disk, preemptable)
    }

    #[test]
    fn s1_single_job_single_node_type() {
        let node_shapes = vec![shape(3600, 8, 4.0, 100, false)];
        let jobs = vec![shape(1800, 4, 2.0, 50, false)];

        let needed = BinPacker::new(3600).pack(&jobs, &node_shapes);
        assert_eq!(needed.get(&NodeShapeId(0)), Some(&1));
    }

    #[test]
    fn s2_two_jobs_same_node() {
        let node_shapes = vec![shape(3600, 8, 4.0, 100, false)];
        let jobs = vec![shape(1800, 4, 2.0, 50, false), shape(1800, 4, 2.0, 50, false)];

        let needed = BinPacker::new(3600).pack(&jobs, &node_shapes);
        assert_eq!(needed.get(&NodeShapeId(0)), Some(&1));
    }

    #[test]
    fn s3_over_long_job_single_node_two_slices() {
        let node_shapes = vec![shape(3600, 8, 4.0, 100, false)];
        let jobs = vec![shape(7200, 4, 2.0, 50, false)];

        let needed = BinPacker::new(3600).pack(&jobs, &node_shapes);
        assert_eq!(needed.get(&NodeShapeId(0)), Some(&1));
    }

    #[test]
    fn s5_service_job_inflation_forces_two_reservations() {
        let node_shapes = vec![shape(3600, 8, 4.0, 100, false)];
        // Same resource shape, but one job is a "service" with wall_time inflated
        // to 86400s by the runtime estimator before it ever reaches the packer.
        let jobs = vec![shape(86400, 4, 2.0, 50, false), shape(1800, 4, 2.0, 50, false)];

        let needed = BinPacker::new(3600).pack(&jobs, &node_shapes);
        assert_eq!(needed.get(&NodeShapeId(0)), Some(&2));
    }

    #[test]
    fn job_fitting_no_shape_is_dropped_others_still_packed() {
        let node_shapes = vec![shape(3600, 8, 4.0, 100, false)];
        let jobs = vec![shape(1800, 1000, 2.0, 50, false), shape(1800, 4, 2.0, 50, false)];

        let needed = BinPacker::new(3600).pack(&jobs, &node_shapes);
        assert_eq!(needed.get(&NodeShapeId(0)), Some(&1));
    }

    #[test]
    fn invariant_all_slices_non_negative() {
        let node_shapes = vec![shape(3600, 8, 4.0, 100, false), shape(7200, 16, 8.0, 200, true)];
        let jobs: Vec<Shape> = (0..20).map(|i| shape(600 + i * 37, 1 + (i % 5), 0.5 + (i % 3) as f64, 5 + i, i % 2 == 0)).collect();

        // Only re-derive invariants from the packer's own bookkeeping: run the
        // full attempt_to_add_job path again and check every resulting slice.
        let mut sorted: Vec<&Shape> = jobs.iter().collect();
        sorted.sort_by(|a, b| b.cmp_for_ffd(a));

        let mut chains: Vec<(usize, NodeReservation)> = Vec::new();
        for job in sorted {
            let Some((idx, node_shape)) = node_shapes.iter().enumerate().find(|(_, s)| s.fits(job)) else {
                continue;
            };
            let placed = chains.iter_mut().filter(|(i, _)| *i == idx).any(|(_, c)| c.attempt_to_add_job(node_shape, job, 3600));
            if !placed {
                let mut c = NodeReservation::new(node_shape);
                assert!(c.attempt_to_add_job(node_shape, job, 3600));
                chains.push((idx, c));
            }
        }

        for (_, chain) in &chains {
            for slice in &chain.slices {
                assert!(slice.is_non_negative(), "slice went negative: {slice:?}");
            }
        }
    }

    #[test]
    fn repeated_packing_is_idempotent() {
        let node_shapes = vec![shape(3600, 8, 4.0, 100, false)];
        let jobs = vec![shape(1800, 4, 2.0, 50, false), shape(1200, 2, 1.0, 20, false)];

        let packer = BinPacker::new(3600);
        let first = packer.pack(&jobs, &node_shapes);
        let second = packer.pack(&jobs, &node_shapes);
        assert_eq!(first, second);
    }
}
