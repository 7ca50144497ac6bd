use std::collections::HashMap;
use std::time::Duration;

use crate::adapters::batch_system::NodeReporter;
use crate::adapters::provisioner::Provisioner;
use crate::domain::node_state::{Node, NodeInfo};
use crate::error::Result;

/// Default freshness window for "recent" batch-system node reports.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(600);

/// Merges the provisioner's node inventory (authoritative for *existence*)
/// with the batch system's executor reports (authoritative for *load*), per
/// spec §4.E.
pub async fn get_nodes(
    provisioner: &dyn Provisioner,
    batch_system: &dyn NodeReporter,
    node_type: Option<&str>,
    preemptable: bool,
) -> Result<HashMap<Node, NodeInfo>> {
    let recent = batch_system.get_nodes(preemptable, Some(DEFAULT_FRESHNESS), None).await?;
    let all_time = batch_system.get_nodes(preemptable, None, None).await?;
    let provisioned = provisioner.get_provisioned_workers(node_type, preemptable).await?;

    let mut result = HashMap::with_capacity(provisioned.len());

    for node in provisioned {
        let info = if let Some(info) = recent.get(&node.private_ip) {
            *info
        } else if let Some(info) = all_time.get(&node.private_ip) {
            let mut info = *info;
            if !batch_system.node_in_use(&node.private_ip).await? {
                info.workers = 0;
            }
            info
        } else {
            NodeInfo::synthesize_unknown()
        };

        result.insert(node, info);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockBatchSystem, MockProvisioner};
    use crate::domain::shape::Shape;

    #[tokio::test]
    async fn node_known_to_batch_system_recently_keeps_reported_load() {
        let provisioner = MockProvisioner::new("c", vec!["small".to_string()], vec![Shape::new(3600, 8, 4.0, 100, false)]);
        provisioner.add_nodes("small", 1, false).await.unwrap();
        let nodes = provisioner.get_provisioned_workers(None, false).await.unwrap();
        let ip = nodes[0].private_ip.clone();

        let batch = MockBatchSystem::new(true);
        batch.set_node_info(&ip, NodeInfo { cores_total: 4.0, cores_used: 2.0, requested_cores: 2.0, memory_total: 8, memory_used: 4, requested_memory: 4, workers: 3 });

        let merged = get_nodes(&provisioner, &batch, None, false).await.unwrap();
        let info = merged.values().next().unwrap();
        assert_eq!(info.workers, 3);
    }

    #[tokio::test]
    async fn unknown_node_is_synthesized_idle() {
        let provisioner = MockProvisioner::new("c", vec!["small".to_string()], vec![Shape::new(3600, 8, 4.0, 100, false)]);
        provisioner.add_nodes("small", 1, false).await.unwrap();

        let batch = MockBatchSystem::new(true);
        let merged = get_nodes(&provisioner, &batch, None, false).await.unwrap();

        let info = merged.values().next().unwrap();
        assert!(info.idle());
        assert_eq!(info.cores_total, 1.0);
    }

    #[tokio::test]
    async fn stale_node_still_in_use_keeps_reported_workers() {
        let provisioner = MockProvisioner::new("c", vec!["small".to_string()], vec![Shape::new(3600, 8, 4.0, 100, false)]);
        provisioner.add_nodes("small", 1, false).await.unwrap();
        let nodes = provisioner.get_provisioned_workers(None, false).await.unwrap();
        let ip = nodes[0].private_ip.clone();

        // Not "recent" (marked stale), but present in an all-time snapshot
        // with workers>0 and flagged as still in use by the batch system
        // despite having fallen silent.
        let batch = MockBatchSystem::new(true);
        batch.set_node_info(&ip, NodeInfo { cores_total: 4.0, cores_used: 4.0, requested_cores: 4.0, memory_total: 8, memory_used: 8, requested_memory: 8, workers: 2 });
        batch.mark_stale(&ip);
        batch.set_in_use(&ip, true);

        let merged = get_nodes(&provisioner, &batch, None, false).await.unwrap();
        let info = merged.values().next().unwrap();
        assert_eq!(info.workers, 2);
    }

    #[tokio::test]
    async fn stale_node_not_in_use_is_zeroed() {
        let provisioner = MockProvisioner::new("c", vec!["small".to_string()], vec![Shape::new(3600, 8, 4.0, 100, false)]);
        provisioner.add_nodes("small", 1, false).await.unwrap();
        let nodes = provisioner.get_provisioned_workers(None, false).await.unwrap();
        let ip = nodes[0].private_ip.clone();

        let batch = MockBatchSystem::new(true);
        batch.set_node_info(&ip, NodeInfo { cores_total: 4.0, cores_used: 4.0, requested_cores: 4.0, memory_total: 8, memory_used: 8, requested_memory: 8, workers: 2 });
        batch.mark_stale(&ip);

        let merged = get_nodes(&provisioner, &batch, None, false).await.unwrap();
        let info = merged.values().next().unwrap();
        assert_eq!(info.workers, 0);
    }
}
