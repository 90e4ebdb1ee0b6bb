use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Whether to enable JSON formatted logs
    pub json_format: bool,

    /// Whether to include thread names in logs
    pub include_thread_names: bool,

    /// Whether to include file and line number information
    pub include_file_info: bool,

    /// Whether to enable colored output (only when logging to the terminal)
    pub enable_colors: bool,

    /// Log file path (optional, if None logs only to stderr)
    pub log_file: Option<String>,

    /// Module-specific log levels
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();
        module_levels.insert("intercept_core".to_string(), "info".to_string());
        module_levels.insert("intercept_agent".to_string(), "info".to_string());
        // chromiumoxide reports every unknown CDP message at warn
        module_levels.insert("chromiumoxide".to_string(), "error".to_string());
        module_levels.insert("tungstenite".to_string(), "warn".to_string());

        Self {
            level: "info".to_string(),
            json_format: false,
            include_thread_names: false,
            include_file_info: false,
            enable_colors: true,
            log_file: None,
            module_levels,
        }
    }
}

/// Initialize logging based on the provided configuration.
///
/// The returned guard must be kept alive while logging to a file.
pub fn init_logging(config: &LoggingConfig) -> AgentResult<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    let (writer, guard) = match &config.log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(create_file_appender(path)?);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let base = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_names(config.include_thread_names)
        .with_file(config.include_file_info)
        .with_line_number(config.include_file_info)
        .with_ansi(config.enable_colors && config.log_file.is_none());
    let layer = if config.json_format {
        base.json().boxed()
    } else {
        base.boxed()
    };

    // Ignore if already initialized (tests)
    match tracing_subscriber::registry().with(filter).with(layer).try_init() {
        Ok(_) => tracing::info!("Logging initialized with level: {}", config.level),
        Err(_) => tracing::debug!("Logging already initialized, skipping"),
    }

    Ok(guard)
}

fn build_filter(config: &LoggingConfig) -> AgentResult<EnvFilter> {
    if !levels::is_valid_level(&config.level) {
        return Err(AgentError::Logging(format!("Invalid log level: {}", config.level)));
    }
    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| AgentError::Logging(format!("Invalid log directive {}: {}", directive, e)))?,
        );
    }
    Ok(filter)
}

fn create_file_appender(log_file: &str) -> AgentResult<tracing_appender::rolling::RollingFileAppender> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};

    let log_path = Path::new(log_file);
    let directory = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let filename = log_path
        .file_name()
        .ok_or_else(|| AgentError::Logging("Invalid log file name".to_string()))?
        .to_string_lossy()
        .into_owned();

    std::fs::create_dir_all(directory)
        .map_err(|e| AgentError::Logging(format!("Failed to create log directory: {}", e)))?;

    Ok(RollingFileAppender::new(Rotation::DAILY, directory, filename))
}

/// Log level utilities
pub mod levels {
    /// Check if a log level string is valid
    pub fn is_valid_level(level: &str) -> bool {
        matches!(level.to_lowercase().as_str(), "trace" | "debug" | "info" | "warn" | "error")
    }
}
