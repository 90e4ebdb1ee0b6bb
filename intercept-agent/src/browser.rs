//! Browser Management Module
//!
//! Launches Chromium through chromiumoxide and owns its profile directory.

use crate::config::BrowserSettings;
use crate::error::{AgentError, AgentResult};
use chromiumoxide::cdp::browser_protocol::network::SetCacheDisabledParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Managed browser instance
pub struct ManagedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    /// Profile directory created for this launch, removed on close
    temp_profile: Option<PathBuf>,
}

impl ManagedBrowser {
    /// Launch a new browser instance
    pub async fn launch(settings: &BrowserSettings) -> AgentResult<Self> {
        let (config, temp_profile) = build_config(settings)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AgentError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser event error: {:?}", e);
                }
            }
        });

        info!(
            "Browser launched (headless: {}, cache disabled: {})",
            settings.headless, settings.disable_cache
        );

        Ok(Self {
            browser,
            handler,
            temp_profile,
        })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Open a blank page, optionally with the HTTP cache bypassed
    pub async fn new_page(&self, disable_cache: bool) -> AgentResult<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AgentError::Browser(format!("Failed to open page: {}", e)))?;

        if disable_cache {
            page.execute(SetCacheDisabledParams::new(true))
                .await
                .map_err(|e| AgentError::Browser(format!("Failed to disable cache: {}", e)))?;
        }
        Ok(page)
    }

    /// Close the browser and remove the throwaway profile
    pub async fn close(mut self) -> AgentResult<()> {
        if let Err(e) = self.browser.close().await {
            warn!("Browser did not close cleanly: {}", e);
        }
        self.handler.abort();
        info!("Browser closed");

        if let Some(path) = self.temp_profile {
            if path.exists() {
                info!("Cleaning up browser profile: {:?}", path);
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!("Failed to remove browser profile dir: {:?}", e);
                }
            }
        }
        Ok(())
    }
}

/// Translate the settings into a chromiumoxide launch configuration.
/// Returns the profile directory when a throwaway one was chosen.
fn build_config(settings: &BrowserSettings) -> AgentResult<(BrowserConfig, Option<PathBuf>)> {
    let mut builder = BrowserConfig::builder();

    let temp_profile = temp_profile(settings);
    let profile = settings
        .user_data_dir
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| temp_profile.clone());
    if let Some(dir) = profile {
        builder = builder.user_data_dir(dir);
    }

    // chromiumoxide defaults to headless
    if !settings.headless {
        builder = builder.with_head();
    }

    for arg in launch_args(settings) {
        builder = builder.arg(arg);
    }

    let config = builder.build().map_err(AgentError::Browser)?;
    Ok((config, temp_profile))
}

/// Unique profile per launch avoids SingletonLock errors
fn temp_profile(settings: &BrowserSettings) -> Option<PathBuf> {
    settings
        .user_data_dir
        .is_none()
        .then(|| std::env::temp_dir().join(format!("intercept_browser_{}", Uuid::new_v4())))
}

fn launch_args(settings: &BrowserSettings) -> Vec<String> {
    let mut args = Vec::new();

    if settings.ignore_ssl_errors {
        args.push("--ignore-certificate-errors".to_string());
        args.push("--ignore-ssl-errors".to_string());
    }

    if let Some((width, height)) = settings.window_size {
        args.push(format!("--window-size={},{}", width, height));
    }

    args.extend(settings.extra_args.iter().cloned());

    // Standard args for automation
    args.extend(
        [
            "--disable-blink-features=AutomationControlled",
            "--disable-infobars",
            "--no-first-run",
            "--no-default-browser-check",
        ]
        .map(String::from),
    );
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_launch_args() {
        let args = launch_args(&BrowserSettings::default());
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--ignore-certificate-errors")));
        assert!(args.contains(&"--no-first-run".to_string()));
    }

    #[test]
    fn test_custom_launch_args() {
        let settings = BrowserSettings {
            ignore_ssl_errors: true,
            window_size: None,
            extra_args: vec!["--mute-audio".to_string()],
            ..Default::default()
        };
        let args = launch_args(&settings);
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));
        assert!(args.contains(&"--mute-audio".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--window-size")));
    }

    #[test]
    fn test_profile_directory_selection() {
        let temp = temp_profile(&BrowserSettings::default()).unwrap();
        assert!(temp.file_name().unwrap().to_string_lossy().starts_with("intercept_browser_"));
        assert_ne!(Some(temp), temp_profile(&BrowserSettings::default()));

        let settings = BrowserSettings {
            user_data_dir: Some("/tmp/intercept-profile".to_string()),
            ..Default::default()
        };
        assert!(temp_profile(&settings).is_none());
    }
}
