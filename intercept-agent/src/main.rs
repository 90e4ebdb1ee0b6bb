//! Interception Agent Binary Entry Point

use clap::Parser;
use intercept_agent::logging::init_logging;
use intercept_agent::{prepare, run_agent, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = prepare(&args)?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = init_logging(&config.logging)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = run_agent(config, shutdown).await {
        tracing::error!("Interception agent failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
