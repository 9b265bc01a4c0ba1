use anyhow::Result;
use benor_consensus::core::{self, Config};
use benor_consensus::fleet::{Fleet, FleetSpec};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    core::logging::init_logging(&config.monitoring.log_level);

    tracing::info!("🚀 Ben-Or consensus fleet starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Nodes: {} (faulty: {:?}), base port {}",
        config.cluster.total_nodes,
        config.cluster.faulty_ids,
        config.network.base_port
    );

    let fleet = Fleet::launch(FleetSpec::from_config(&config)).await?;

    if config.protocol.auto_start {
        let refused = fleet
            .start_all()
            .await
            .into_iter()
            .filter(|started| started.is_err())
            .count();
        tracing::info!("✅ Consensus started ({} nodes refused)", refused);
    }

    let mut report = tokio::time::interval(config.monitoring.report_interval);
    loop {
        tokio::select! {
            _ = report.tick() => fleet.log_states().await,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    fleet.shutdown().await;
    Ok(())
}
