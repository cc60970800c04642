//! Gemma IPC broker — shared-memory request broker for a single LLM
//! summarization engine.
//!
//! Usage: gemma-broker-server
//! Configuration is entirely environment-variable driven; see
//! `config::BrokerConfig::from_env`.

use std::sync::Arc;

use gemma_ipc_broker::{BrokerConfig, ModelEngine};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod demo_engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = BrokerConfig::from_env();
    info!(shm_name = %config.shm_name, slot_count = config.slot_count, "starting gemma broker");

    let region = match gemma_ipc_broker::Region::create(&config) {
        Ok(region) => Arc::new(region),
        Err(e) => {
            error!(error = %e, "failed to create shared region");
            std::process::exit(1);
        }
    };

    // Administrative reset at startup recovers from stale slots a
    // crashed prior instance left behind.
    if let Err(e) = region.force_reset_all_slots() {
        error!(error = %e, "administrative reset failed");
        std::process::exit(1);
    }

    let engine: Arc<dyn ModelEngine> = Arc::new(demo_engine::EchoEngine::default());

    let broker = gemma_ipc_broker::spawn(region, engine, &config);

    info!("broker running; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received; draining in-flight work");
    broker.shutdown().await;
    info!("broker stopped");

    Ok(())
}
