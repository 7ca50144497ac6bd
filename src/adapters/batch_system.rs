use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::node_state::NodeInfo;
use crate::error::Result;

/// Capability: the batch system can report per-node load. Split from
/// [`NodeSignaller`] per spec §9's design note — "represent as a capability
/// probe plus narrow interfaces rather than a single inheritance hierarchy."
#[async_trait]
pub trait NodeReporter: Send + Sync {
    /// `freshness` bounds how recently a node must have reported in to be
    /// included; `None` means no bound ("all-time").
    async fn get_nodes(&self, preemptable: bool, freshness: Option<Duration>, timeout: Option<Duration>) -> Result<HashMap<String, NodeInfo>>;

    /// Whether the batch system still considers `ip` to be hosting live work,
    /// even if it has otherwise fallen silent.
    async fn node_in_use(&self, ip: &str) -> Result<bool>;
}

/// Capability: the batch system can be told to stop/resume dispatching to a
/// node while the scaler waits for it to drain.
#[async_trait]
pub trait NodeSignaller: Send + Sync {
    async fn ignore_node(&self, ip: &str) -> Result<()>;
    async fn unignore_node(&self, ip: &str) -> Result<()>;
}

/// The full batch-system collaborator. Whether it actually supports the
/// scalable drain protocol of spec §4.F is a runtime capability probe
/// (`is_scalable`), not a separate type — a batch system that answers `false`
/// still implements both narrow traits, it just means the termination chooser
/// takes the non-scalable path.
#[async_trait]
pub trait BatchSystem: NodeReporter + NodeSignaller {
    fn is_scalable(&self) -> bool;
}
