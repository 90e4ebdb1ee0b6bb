//! Agent configuration
//!
//! Loaded from a `.toml` or `.json` file; every section is optional. Command
//! line flags override the file.

use crate::error::{AgentError, AgentResult};
use crate::logging::LoggingConfig;
use crate::rules::RuleConfig;
use crate::Args;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Page opened once the rules are registered
    pub start_url: Option<String>,
    pub browser: BrowserSettings,
    pub logging: LoggingConfig,
    /// Registered in order, one registration per rule
    pub rules: Vec<RuleConfig>,
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run in headless mode (no visible UI)
    pub headless: bool,
    pub window_size: Option<(u32, u32)>,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
    pub ignore_ssl_errors: bool,
    /// Bypass the HTTP cache so every resource reaches the interception layer
    pub disable_cache: bool,
    /// Persistent profile directory. A throwaway one is created when unset.
    pub user_data_dir: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: Some((1920, 1080)),
            extra_args: Vec::new(),
            ignore_ssl_errors: false,
            disable_cache: true,
            user_data_dir: None,
        }
    }
}

/// Parse a configuration file, picking the format from its extension
pub fn load_config(path: &Path) -> AgentResult<AgentConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AgentError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Invalid JSON in {}: {}", path.display(), e))),
        Some("toml") => toml::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Invalid TOML in {}: {}", path.display(), e))),
        other => Err(AgentError::Config(format!(
            "Unsupported config format {:?} for {}",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

/// Load the configuration file named on the command line (if any) and apply
/// the command line overrides on top of it.
pub fn load_agent_config(args: &Args) -> AgentResult<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AgentConfig::default(),
    };

    if let Some(url) = &args.url {
        config.start_url = Some(url.clone());
    }
    if args.headed {
        config.browser.headless = false;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    Ok(config)
}
