use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Scaler configuration. All fields optional except `min_nodes`/`max_nodes`
/// (spec §6): `sum(max_nodes) > 0` is required, and is checked by
/// [`ScalerConfig::validate`], which is called synchronously from
/// construction (spec §7, Configuration error).
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerConfig {
    pub min_nodes: Vec<u32>,
    pub max_nodes: Vec<u32>,

    #[serde(default = "default_memory")]
    pub default_memory: u64,
    #[serde(default = "default_cores")]
    pub default_cores: f64,
    #[serde(default = "default_disk")]
    pub default_disk: u64,

    #[serde(default = "default_scale_interval")]
    pub scale_interval_secs: u64,

    #[serde(default = "default_compensation")]
    pub preemptable_compensation: f64,

    #[serde(default)]
    pub cluster_stats_path: Option<String>,

    #[serde(default = "default_target_time")]
    pub target_time_secs: u64,

    #[serde(default = "default_recent_shapes_capacity")]
    pub recent_shapes_capacity: usize,
}

fn default_memory() -> u64 {
    1
}
fn default_cores() -> f64 {
    1.0
}
fn default_disk() -> u64 {
    1
}
fn default_scale_interval() -> u64 {
    60
}
fn default_compensation() -> f64 {
    0.0
}
fn default_target_time() -> u64 {
    3600
}
fn default_recent_shapes_capacity() -> usize {
    1000
}

impl ScalerConfig {
    /// Pads `max_nodes` with its first entry if shorter than `node_count`, and
    /// defaults `min_nodes` to zeros if empty, per spec §6.
    pub fn normalize(mut self, node_count: usize) -> Self {
        if self.min_nodes.is_empty() {
            self.min_nodes = vec![0; node_count];
        }
        if self.max_nodes.len() < node_count {
            let pad_value = self.max_nodes.first().copied().unwrap_or(0);
            self.max_nodes.resize(node_count, pad_value);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nodes.iter().sum::<u32>() == 0 {
            return Err(Error::Configuration("sum(maxNodes) must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.preemptable_compensation) {
            return Err(Error::Configuration("preemptableCompensation must be in [0, 1]".to_string()));
        }
        Ok(())
    }

    pub fn min_max_by_index(&self) -> HashMap<usize, (u32, u32)> {
        (0..self.max_nodes.len()).map(|i| (i, (self.min_nodes.get(i).copied().unwrap_or(0), self.max_nodes[i]))).collect()
    }
}
