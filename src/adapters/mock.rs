//! In-memory fixtures for the collaborator traits. Not a cloud integration —
//! these back the demo binary and the integration tests, the same role the
//! teacher's `domain::simulator::{SystemSimulator, MockSimulator}` split
//! plays for its own grid-component collaborators.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::adapters::batch_system::{BatchSystem, NodeReporter, NodeSignaller};
use crate::adapters::leader::{JobNode, Leader};
use crate::adapters::provisioner::Provisioner;
use crate::domain::node_state::{Node, NodeInfo};
use crate::domain::shape::Shape;
use crate::error::{Error, Result};

pub struct MockProvisioner {
    cluster_name: String,
    node_types: Vec<String>,
    node_shapes: Vec<Shape>,
    nodes: Mutex<Vec<Node>>,
    static_nodes: Mutex<HashMap<bool, HashSet<String>>>,
    next_ip: Mutex<u32>,
}

impl MockProvisioner {
    pub fn new(cluster_name: &str, node_types: Vec<String>, node_shapes: Vec<Shape>) -> Self {
        MockProvisioner {
            cluster_name: cluster_name.to_string(),
            node_types,
            node_shapes,
            nodes: Mutex::new(Vec::new()),
            static_nodes: Mutex::new(HashMap::new()),
            next_ip: Mutex::new(1),
        }
    }

    fn allocate_ip(&self) -> String {
        let mut next = self.next_ip.lock().unwrap();
        let ip = format!("10.0.0.{}", *next);
        *next += 1;
        ip
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    fn node_types(&self) -> &[String] {
        &self.node_types
    }

    fn node_shapes(&self) -> &[Shape] {
        &self.node_shapes
    }

    fn get_node_shape(&self, node_type: &str, preemptable: bool) -> Option<Shape> {
        self.node_types.iter().position(|t| t == node_type).map(|idx| {
            let mut shape = self.node_shapes[idx];
            shape.preemptable = preemptable;
            shape
        })
    }

    async fn get_provisioned_workers(&self, node_type: Option<&str>, preemptable: bool) -> Result<Vec<Node>> {
        let nodes = self.nodes.lock().unwrap();
        Ok(nodes
            .iter()
            .filter(|n| n.preemptable == preemptable && node_type.map_or(true, |t| t == n.node_type))
            .cloned()
            .collect())
    }

    async fn add_nodes(&self, node_type: &str, num_nodes: usize, preemptable: bool) -> Result<usize> {
        let mut nodes = self.nodes.lock().unwrap();
        for _ in 0..num_nodes {
            let private_ip = self.allocate_ip();
            nodes.push(Node { private_ip, node_type: node_type.to_string(), preemptable });
        }
        Ok(num_nodes)
    }

    async fn terminate_nodes(&self, to_remove: &[Node]) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        nodes.retain(|n| !to_remove.iter().any(|r| r.private_ip == n.private_ip));
        Ok(())
    }

    fn remaining_billing_interval(&self, _node: &Node) -> f64 {
        0.0
    }

    fn retry_predicate(&self, _error: &Error) -> bool {
        false
    }

    async fn set_static_nodes(&self, nodes: HashSet<String>, preemptable: bool) -> Result<()> {
        self.static_nodes.lock().unwrap().insert(preemptable, nodes);
        Ok(())
    }

    async fn get_static_nodes(&self, preemptable: bool) -> Result<HashSet<String>> {
        Ok(self.static_nodes.lock().unwrap().get(&preemptable).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MockBatchSystem {
    scalable: bool,
    node_info: Mutex<HashMap<String, NodeInfo>>,
    /// IPs whose last report falls outside any freshness window, simulating a
    /// node that has gone quiet.
    stale: Mutex<HashSet<String>>,
    in_use: Mutex<HashSet<String>>,
    ignored: Mutex<HashSet<String>>,
}

impl MockBatchSystem {
    pub fn new(scalable: bool) -> Self {
        MockBatchSystem { scalable, ..Default::default() }
    }

    pub fn set_node_info(&self, ip: &str, info: NodeInfo) {
        self.node_info.lock().unwrap().insert(ip.to_string(), info);
    }

    pub fn mark_stale(&self, ip: &str) {
        self.stale.lock().unwrap().insert(ip.to_string());
    }

    pub fn set_in_use(&self, ip: &str, in_use: bool) {
        let mut set = self.in_use.lock().unwrap();
        if in_use {
            set.insert(ip.to_string());
        } else {
            set.remove(ip);
        }
    }

    /// Test/observability hook: the set of IPs currently marked ignored via
    /// [`NodeSignaller::ignore_node`].
    pub fn ignored_ips(&self) -> HashSet<String> {
        self.ignored.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeReporter for MockBatchSystem {
    async fn get_nodes(&self, _preemptable: bool, freshness: Option<Duration>, _timeout: Option<Duration>) -> Result<HashMap<String, NodeInfo>> {
        let info = self.node_info.lock().unwrap();
        if freshness.is_none() {
            return Ok(info.clone());
        }
        let stale = self.stale.lock().unwrap();
        Ok(info.iter().filter(|(ip, _)| !stale.contains(ip.as_str())).map(|(ip, v)| (ip.clone(), *v)).collect())
    }

    async fn node_in_use(&self, ip: &str) -> Result<bool> {
        Ok(self.in_use.lock().unwrap().contains(ip))
    }
}

#[async_trait]
impl NodeSignaller for MockBatchSystem {
    async fn ignore_node(&self, ip: &str) -> Result<()> {
        self.ignored.lock().unwrap().insert(ip.to_string());
        Ok(())
    }

    async fn unignore_node(&self, ip: &str) -> Result<()> {
        self.ignored.lock().unwrap().remove(ip);
        Ok(())
    }
}

#[async_trait]
impl BatchSystem for MockBatchSystem {
    fn is_scalable(&self) -> bool {
        self.scalable
    }
}

#[derive(Default)]
pub struct MockLeader {
    jobs: Mutex<Vec<JobNode>>,
}

impl MockLeader {
    pub fn new(jobs: Vec<JobNode>) -> Self {
        MockLeader { jobs: Mutex::new(jobs) }
    }

    pub fn set_jobs(&self, jobs: Vec<JobNode>) {
        *self.jobs.lock().unwrap() = jobs;
    }
}

#[async_trait]
impl Leader for MockLeader {
    async fn get_jobs(&self) -> Result<Vec<JobNode>> {
        Ok(self.jobs.lock().unwrap().clone())
    }
}
