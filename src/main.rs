use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use elastic_scaler::adapters::leader::JobNode;
use elastic_scaler::adapters::mock::{MockBatchSystem, MockLeader, MockProvisioner};
use elastic_scaler::adapters::provisioner::Provisioner;
use elastic_scaler::domain::shape::Shape;
use elastic_scaler::{logger, Scaler, ScalerConfig};

/// Runs one scaler lifecycle against in-memory collaborators. Demonstrates the
/// control loop end to end; a real deployment wires `Scaler::start` to a
/// cloud provisioner, a batch-system client, and the workflow leader instead.
#[derive(Parser, Debug)]
#[command(name = "elastic-scaler", about = "Elastic capacity scaling controller demo")]
struct Args {
    /// Path to a JSON-encoded ScalerConfig.
    #[arg(long)]
    config: String,

    /// How long to let the demo run before shutting the scaler down.
    #[arg(long, default_value_t = 15)]
    duration_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let args = Args::parse();
    let config_contents = std::fs::read_to_string(&args.config).with_context(|| format!("reading config file '{}'", args.config))?;
    let config: ScalerConfig = serde_json::from_str(&config_contents).context("parsing scaler config JSON")?;

    let provisioner: Arc<dyn Provisioner> = Arc::new(MockProvisioner::new(
        "demo-cluster",
        vec!["small".to_string(), "large".to_string()],
        vec![Shape::new(3600, 8, 4.0, 100, false), Shape::new(3600, 32, 16.0, 400, false)],
    ));
    let batch_system = Arc::new(MockBatchSystem::new(true));
    let leader = Arc::new(MockLeader::new(vec![
        JobNode { job_name: "ingest".to_string(), memory: 4, cores: 2.0, disk: 50, preemptable: false, is_service: false },
        JobNode { job_name: "ingest".to_string(), memory: 4, cores: 2.0, disk: 50, preemptable: false, is_service: false },
        JobNode { job_name: "web-frontend".to_string(), memory: 2, cores: 1.0, disk: 10, preemptable: false, is_service: true },
    ]));

    log::info!("starting scaler for cluster '{}'", provisioner.cluster_name());
    let scaler = Scaler::start(config, provisioner, batch_system, leader).context("starting scaler")?;

    scaler.add_completed_job("ingest", 1800.0, Shape::new(1800, 4, 2.0, 50, false));

    tokio::time::sleep(Duration::from_secs(args.duration_secs)).await;

    scaler.check().context("scaler health check")?;
    scaler.shutdown().await.context("shutting scaler down")?;

    log::info!("scaler demo finished cleanly");
    Ok(())
}
