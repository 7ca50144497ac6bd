use async_trait::async_trait;

use crate::error::Result;

/// A queued job as reported by the leader's job queue.
#[derive(Debug, Clone)]
pub struct JobNode {
    pub job_name: String,
    pub memory: u64,
    pub cores: f64,
    pub disk: u64,
    pub preemptable: bool,
    pub is_service: bool,
}

/// The leader's job queue. Out of core scope per spec §1 — the core only
/// consumes this trait to pull the currently queued jobs each tick.
#[async_trait]
pub trait Leader: Send + Sync {
    async fn get_jobs(&self) -> Result<Vec<JobNode>>;
}
