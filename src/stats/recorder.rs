use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::adapters::batch_system::BatchSystem;
use crate::adapters::provisioner::Provisioner;
use crate::domain::node_state::NodeInfo;
use crate::error::Result;
use crate::scaler::consolidate;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
struct StatsSample {
    seconds_since_start: u64,
    preemptable: bool,
    nodes: HashMap<String, NodeInfo>,
}

/// Optional collaborator (spec §4.H). On [`StatsRecorder::start`], spawns one
/// sampler task per preemptability; each records a node-state snapshot every
/// 60 seconds. On [`StatsRecorder::shutdown`], the samplers are joined and
/// every sample collected is serialized to
/// `<cluster_stats_path>/<cluster_name>-statsNNN.json`, where `NNN` is the
/// smallest zero-padded counter not already present in that directory.
pub struct StatsRecorder {
    cluster_name: String,
    output_dir: PathBuf,
    provisioner: Arc<dyn Provisioner>,
    batch_system: Arc<dyn BatchSystem>,
    samples: Mutex<Vec<StatsSample>>,
    stop_flag: Arc<AtomicBool>,
    samplers: Mutex<Vec<JoinHandle<()>>>,
}

impl StatsRecorder {
    pub fn start(cluster_name: String, output_dir: impl AsRef<Path>, provisioner: Arc<dyn Provisioner>, batch_system: Arc<dyn BatchSystem>) -> Arc<Self> {
        let recorder = Arc::new(StatsRecorder {
            cluster_name,
            output_dir: output_dir.as_ref().to_path_buf(),
            provisioner,
            batch_system,
            samples: Mutex::new(Vec::new()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            samplers: Mutex::new(Vec::new()),
        });

        let started = tokio::time::Instant::now();
        let mut handles = Vec::new();
        for preemptable in [true, false] {
            let recorder = Arc::clone(&recorder);
            handles.push(tokio::spawn(async move {
                loop {
                    if recorder.stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    tokio::time::sleep(SAMPLE_INTERVAL).await;
                    if recorder.stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Err(e) = recorder.sample_once(preemptable, started.elapsed().as_secs()).await {
                        log::warn!("stats sampler (preemptable={preemptable}) failed to collect a snapshot: {e}");
                    }
                }
            }));
        }
        *recorder.samplers.lock().unwrap() = handles;

        recorder
    }

    async fn sample_once(&self, preemptable: bool, seconds_since_start: u64) -> Result<()> {
        let nodes = consolidate::get_nodes(self.provisioner.as_ref(), self.batch_system.as_ref(), None, preemptable).await?;
        let nodes = nodes.into_iter().map(|(node, info)| (node.private_ip, info)).collect();
        self.samples.lock().unwrap().push(StatsSample { seconds_since_start, preemptable, nodes });
        Ok(())
    }

    /// Called once per scale tick. The samplers run on their own 60s cadence
    /// independent of the scale interval; this is a liveness check-in only.
    pub async fn tick(&self) {
        let dead = self.samplers.lock().unwrap().iter().any(|h| h.is_finished());
        if dead {
            log::warn!("a stats sampler task exited unexpectedly");
        }
    }

    pub async fn shutdown(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        let handles = std::mem::take(&mut *self.samplers.lock().unwrap());
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
        if let Err(e) = self.flush() {
            log::error!("failed to write cluster stats file: {e}");
        }
    }

    fn flush(&self) -> Result<()> {
        let samples = self.samples.lock().unwrap();
        if samples.is_empty() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.next_output_path();
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &*samples)?;
        log::info!("wrote {} cluster stats samples to {}", samples.len(), path.display());
        Ok(())
    }

    fn next_output_path(&self) -> PathBuf {
        for n in 0.. {
            let candidate = self.output_dir.join(format!("{}-stats{:03}.json", self.cluster_name, n));
            if !candidate.exists() {
                return candidate;
            }
        }
        unreachable!("u32-range counter exhausted")
    }
}
