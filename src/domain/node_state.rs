use serde::{Deserialize, Serialize};

/// Identity of a provisioned worker, as supplied by the provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub private_ip: String,
    pub node_type: String,
    pub preemptable: bool,
}

/// Observed load state of a running node, as reported by the batch system.
/// Synthesized with zeros/idle defaults when the batch system does not yet
/// know about a node (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub cores_total: f64,
    pub cores_used: f64,
    pub requested_cores: f64,
    pub memory_total: u64,
    pub memory_used: u64,
    pub requested_memory: u64,
    pub workers: u32,
}

impl NodeInfo {
    /// The view used for a node the provisioner knows about but the batch
    /// system has never reported on: still booting, never received a job, or
    /// failed batch-system registration. All are safe to treat as idle.
    pub fn synthesize_unknown() -> Self {
        NodeInfo { cores_total: 1.0, cores_used: 0.0, requested_cores: 0.0, memory_total: 1, memory_used: 0, requested_memory: 0, workers: 0 }
    }

    pub fn idle(&self) -> bool {
        self.workers < 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_node_is_idle() {
        assert!(NodeInfo::synthesize_unknown().idle());
    }
}
