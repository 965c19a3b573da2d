//! SWF fast monitoring agent
//!
//! Usage:
//!     fastmon-agent --config fastmon.toml
//!     FASTMON_MODE=continuous fastmon-agent --config fastmon.toml

use anyhow::Context;
use clap::Parser;
use fastmon_agent::{AgentArgs, AgentConfig, CancellationToken, FastMonitorAgent, HttpCatalog, ZmqBroker};
use fastmon_logging::{init_logging, LogConfig};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = AgentArgs::parse();

    init_logging(LogConfig {
        app_name: "fastmon-agent",
        debug: args.debug,
        log_dir: args.log_dir.clone(),
    })?;

    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            warn!("No config file given, using the built-in development profile");
            AgentConfig::default()
        }
    };
    args.apply_overrides(&mut config);
    config.validate()?;

    let mode = args.run_mode();
    info!("Starting fast monitoring agent");
    info!("  Mode: {}", mode);
    info!("  Catalog: {}", config.catalog.url);
    info!("  Destination: {}", config.broker.destination);
    info!("  Workflow tracking: {}", config.track_workflow);

    let catalog = HttpCatalog::new(&config.catalog).context("Failed to create catalog client")?;
    let broker = ZmqBroker::connect(&config.broker)
        .await
        .context("Failed to connect to broker")?;

    let mut agent = FastMonitorAgent::new(config, Arc::new(catalog), Box::new(broker))?;
    tokio::spawn(shutdown_signal(agent.cancellation_token()));

    agent.run(mode).await?;
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown requested");
    token.cancel();
}
