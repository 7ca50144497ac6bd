use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::adapters::batch_system::BatchSystem;
use crate::adapters::leader::Leader;
use crate::adapters::provisioner::Provisioner;
use crate::config::ScalerConfig;
use crate::domain::recent_shapes::RecentShapesWindow;
use crate::domain::runtime_estimator::RuntimeEstimator;
use crate::domain::shape::Shape;
use crate::error::{Error, Result};
use crate::scaler::control_loop::ControlLoop;
use crate::scaler::state::ScalerState;
use crate::stats::recorder::StatsRecorder;

/// The scaler's public surface, exposed to the leader process (spec §6/§7).
///
/// Owns nothing of the control loop's per-tick bookkeeping directly — that
/// lives on the spawned task inside [`ControlLoop`] — but holds the two
/// pieces of state genuinely shared with it: the recent-shapes window and the
/// runtime estimator, both updated by [`Scaler::add_completed_job`].
pub struct Scaler {
    recent_shapes: Arc<RecentShapesWindow>,
    runtime_estimator: Arc<Mutex<RuntimeEstimator>>,
    stop_flag: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scaler {
    /// Validates `config`, builds initial state, and spawns the control-loop
    /// task. Returns a `Configuration` error synchronously if `config` is
    /// invalid (spec §7) rather than deferring it to the first tick.
    pub fn start(config: ScalerConfig, provisioner: Arc<dyn Provisioner>, batch_system: Arc<dyn BatchSystem>, leader: Arc<dyn Leader>) -> Result<Self> {
        let config = config.normalize(provisioner.node_types().len());
        config.validate()?;

        // Seeded with the smallest node type's wall-time and the configured
        // default resource demand, preemptable — matches spec §4.C exactly.
        let smallest_wall_time = provisioner.node_shapes().iter().min_by(|a, b| a.cmp_for_ffd(b)).map(|s| s.wall_time).unwrap_or(3600);
        let default_shape = Shape::new(smallest_wall_time, config.default_memory, config.default_cores, config.default_disk, true);

        let recent_shapes = Arc::new(RecentShapesWindow::seeded(config.recent_shapes_capacity, default_shape));
        let runtime_estimator = Arc::new(Mutex::new(RuntimeEstimator::new()));

        let state = ScalerState::new(Arc::clone(&recent_shapes), Arc::clone(&runtime_estimator));

        let stats = config.cluster_stats_path.as_ref().map(|path| {
            StatsRecorder::start(provisioner.cluster_name().to_string(), path, Arc::clone(&provisioner), Arc::clone(&batch_system))
        });

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_notify = Arc::new(Notify::new());

        let mut control_loop = ControlLoop {
            provisioner,
            batch_system,
            leader,
            config,
            state,
            stop_flag: Arc::clone(&stop_flag),
            stop_notify: Arc::clone(&stop_notify),
            stats,
        };
        control_loop.seed_min_max();

        let worker = tokio::spawn(control_loop.run());

        Ok(Scaler { recent_shapes, runtime_estimator, stop_flag, stop_notify, worker: Mutex::new(Some(worker)) })
    }

    /// Reports a job completion so future estimates and the recent-shapes
    /// prior reflect it (spec §4.C/§4.D).
    pub fn add_completed_job(&self, job_name: &str, wall_time: f64, shape: Shape) {
        self.runtime_estimator.lock().unwrap().add_completed(job_name, wall_time);
        self.recent_shapes.add(shape);
    }

    /// Health check exposed to the leader. Returns `WorkerDied` if the
    /// control-loop task has already exited — which only happens on an
    /// uncaught panic, since a graceful `shutdown()` consumes `self`.
    pub fn check(&self) -> Result<()> {
        let mut guard = self.worker.lock().unwrap();
        match guard.as_mut() {
            Some(handle) if handle.is_finished() => {
                *guard = None;
                Err(Error::WorkerDied("scaler control loop task exited unexpectedly".to_string()))
            }
            Some(_) => Ok(()),
            None => Err(Error::WorkerDied("scaler control loop task already exited".to_string())),
        }
    }

    /// Signals the control loop to stop, terminate all managed nodes, flush
    /// stats, and waits for it to finish (spec §7).
    pub async fn shutdown(self) -> Result<()> {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();

        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| Error::WorkerDied(e.to_string()))?;
        }
        Ok(())
    }
}
