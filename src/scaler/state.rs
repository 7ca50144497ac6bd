use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::domain::recent_shapes::RecentShapesWindow;
use crate::domain::runtime_estimator::RuntimeEstimator;

/// Identifies one of the scaler's per-tick decision units: a node type at a
/// given preemptability. Distinct from [`crate::domain::packer::NodeShapeId`],
/// which indexes the packer's own `node_shapes` slice for one pack() call —
/// this key additionally carries `preemptable` because the control loop
/// tracks separate `totalNodes`/`minNodes`/`maxNodes`/observed-count state per
/// preemptability of the same underlying type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeShapeKey {
    pub type_index: usize,
    pub preemptable: bool,
}

/// Long-lived scaler state, exclusively owned by the control-loop task. The
/// one exception is [`RecentShapesWindow`], which is genuinely shared with the
/// completion-report path and is therefore held behind its own internal lock
/// rather than living directly in this struct (spec §5).
pub struct ScalerState {
    /// Shared with [`crate::scaler::handle::Scaler::add_completed_job`] for the
    /// same reason `recent_shapes` is: completions arrive from outside the
    /// control-loop task.
    pub runtime_estimator: Arc<Mutex<RuntimeEstimator>>,
    pub recent_shapes: Arc<RecentShapesWindow>,

    /// Observed each tick by re-querying the provisioner.
    pub total_nodes: HashMap<NodeShapeKey, u32>,
    pub min_nodes: HashMap<NodeShapeKey, u32>,
    pub max_nodes: HashMap<NodeShapeKey, u32>,

    /// Unmet preemptable demand carried into the same tick's non-preemptable
    /// decision, keyed by node *type* (not by node shape — a non-preemptable
    /// shape's compensation draws on the deficit accrued by its preemptable
    /// counterpart of the same type).
    pub preemptable_deficit: HashMap<usize, i64>,

    pub ignored_nodes: HashSet<String>,
}

impl ScalerState {
    pub fn new(recent_shapes: Arc<RecentShapesWindow>, runtime_estimator: Arc<Mutex<RuntimeEstimator>>) -> Self {
        ScalerState {
            runtime_estimator,
            recent_shapes,
            total_nodes: HashMap::new(),
            min_nodes: HashMap::new(),
            max_nodes: HashMap::new(),
            preemptable_deficit: HashMap::new(),
            ignored_nodes: HashSet::new(),
        }
    }
}
