//! Interception Agent
//!
//! Launches Chromium, registers the configured interception rules on a fresh
//! page, navigates to the start URL and keeps intercepting until shutdown.

pub mod browser;
pub mod config;
pub mod error;
pub mod logging;
pub mod rules;

use crate::browser::ManagedBrowser;
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::rules::{register_rules, RegisteredRule};
use clap::Parser;
use intercept_core::PageInterceptor;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the agent configuration (.toml or .json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// URL to open once the rules are registered
    #[arg(long)]
    pub url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

/// Run the agent until `shutdown` resolves or the page goes away.
pub async fn run_agent<F>(config: AgentConfig, shutdown: F) -> AgentResult<()>
where
    F: Future<Output = ()>,
{
    // Logging should be initialized by the caller (main or test)
    info!("Starting Interception Agent...");
    info!("  Rules:    {}", config.rules.len());
    info!("  Start URL: {}", config.start_url.as_deref().unwrap_or("about:blank"));

    // Reject bad rules before a browser is started
    for rule in &config.rules {
        rule.compile()?;
    }

    let browser = ManagedBrowser::launch(&config.browser).await?;
    let result = drive(&browser, &config, shutdown).await;
    browser.close().await?;
    result
}

async fn drive<F>(browser: &ManagedBrowser, config: &AgentConfig, shutdown: F) -> AgentResult<()>
where
    F: Future<Output = ()>,
{
    let page = browser.new_page(config.browser.disable_cache).await?;
    let interceptor = PageInterceptor::for_page(page.clone());
    let registered = register_rules(&interceptor, &config.rules).await?;

    if let Some(url) = &config.start_url {
        info!("Navigating to {}", url);
        if let Err(e) = page.goto(url.as_str()).await {
            // Aborted documents surface as navigation errors
            warn!("Navigation to {} did not complete: {}", url, e);
        }
    }

    tokio::select! {
        _ = shutdown => {
            info!("Shutdown signal received, stopping agent...");
        }
        _ = page_closed(&registered) => {
            info!("Page closed, stopping agent...");
        }
    }

    Ok(())
}

/// Resolves once every registration has lost its event stream
async fn page_closed(registered: &[RegisteredRule]) {
    if registered.is_empty() {
        return std::future::pending().await;
    }
    let mut interval = tokio::time::interval(Duration::from_millis(500));
    loop {
        interval.tick().await;
        if registered.iter().all(|rule| !rule.handler.is_listening()) {
            return;
        }
    }
}

/// Parse arguments into a config, surfacing the first problem found
pub fn prepare(args: &Args) -> AgentResult<AgentConfig> {
    let config = config::load_agent_config(args)?;
    if !logging::levels::is_valid_level(&config.logging.level) {
        return Err(AgentError::Config(format!("Invalid log level: {}", config.logging.level)));
    }
    Ok(config)
}
