use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::node_state::Node;
use crate::domain::shape::Shape;
use crate::error::Result;

/// The cloud/cluster provisioner: authoritative for node *existence*. Out of
/// core scope per spec §1 — the core only consumes this trait.
#[async_trait]
pub trait Provisioner: Send + Sync {
    fn cluster_name(&self) -> &str;

    /// Parallel to `node_shapes`: same length, same order.
    fn node_types(&self) -> &[String];
    fn node_shapes(&self) -> &[Shape];

    fn get_node_shape(&self, node_type: &str, preemptable: bool) -> Option<Shape>;

    async fn get_provisioned_workers(&self, node_type: Option<&str>, preemptable: bool) -> Result<Vec<Node>>;

    /// Returns the number of nodes actually added (may be less than requested).
    async fn add_nodes(&self, node_type: &str, num_nodes: usize, preemptable: bool) -> Result<usize>;

    async fn terminate_nodes(&self, nodes: &[Node]) -> Result<()>;

    fn remaining_billing_interval(&self, node: &Node) -> f64;

    /// Whether a failed provisioner call should be retried.
    fn retry_predicate(&self, error: &crate::error::Error) -> bool;

    async fn set_static_nodes(&self, nodes: HashSet<String>, preemptable: bool) -> Result<()>;
    async fn get_static_nodes(&self, preemptable: bool) -> Result<HashSet<String>>;
}
