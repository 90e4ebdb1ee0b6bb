//! Declarative interception rules
//!
//! Each rule becomes one registration. Rules are validated as a whole before
//! the first one is registered, so a bad rule never leaves the page half
//! configured.

use crate::error::{AgentError, AgentResult};
use intercept_core::{
    patterns, ErrorReason, EventHandlers, HeaderEntry, InterceptOptions, Interception,
    InterceptionHandler, RequestPattern, ResponseOptions, SessionSource,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{debug, info};

/// A single glob or a list of globs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlPatterns {
    One(String),
    Many(Vec<String>),
}

impl UrlPatterns {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            UrlPatterns::One(glob) => vec![glob],
            UrlPatterns::Many(globs) => globs,
        }
    }
}

impl Default for UrlPatterns {
    fn default() -> Self {
        UrlPatterns::One("*".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    /// Resource category; all categories when omitted
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub url_patterns: UrlPatterns,
    #[serde(default)]
    pub options: InterceptOptions,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub action: RuleAction,
}

fn default_enabled() -> bool {
    true
}

fn default_status() -> i64 {
    200
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Fail matching requests before they complete
    Abort {
        #[serde(default)]
        reason: Option<String>,
        /// Only abort URLs containing this substring
        #[serde(default)]
        url_contains: Option<String>,
    },
    /// Answer with a synthesized response
    Fulfill {
        #[serde(default = "default_status")]
        status: i64,
        #[serde(default)]
        body: Option<String>,
        /// Base64 body, sent as-is
        #[serde(default)]
        encoded_body: Option<String>,
        /// Sent in order; a name may repeat
        #[serde(default)]
        headers: Vec<HeaderEntry>,
        #[serde(default)]
        phrase: Option<String>,
    },
    /// Regex match-and-replace on the real response body
    ReplaceBody { find: String, replace: String },
    /// Log every intercepted response
    Log,
}

/// A validated rule, ready to register
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub enabled: bool,
    pub patterns: Vec<RequestPattern>,
    pub handlers: EventHandlers,
    pub options: InterceptOptions,
}

impl CompiledRule {
    pub fn into_interception(self) -> Interception {
        Interception::new(self.patterns)
            .with_handlers(self.handlers)
            .with_options(self.options)
    }
}

/// Live registration created from a rule
#[derive(Debug)]
pub struct RegisteredRule {
    pub name: String,
    pub handler: InterceptionHandler,
}

impl RuleConfig {
    pub fn compile(&self) -> AgentResult<CompiledRule> {
        let invalid = |message: String| AgentError::InvalidRule {
            rule: self.name.clone(),
            message,
        };

        let globs = self.url_patterns.clone().into_vec();
        if globs.is_empty() {
            return Err(invalid("no url patterns".to_string()));
        }
        let patterns = match &self.resource_type {
            Some(name) => patterns::by_name(name, globs).map_err(|e| invalid(e.to_string()))?,
            None => patterns::all(globs),
        };

        let handlers = match &self.action {
            RuleAction::Abort { reason, url_contains } => {
                let reason = match reason {
                    Some(name) => name.parse::<ErrorReason>().map_err(|e| invalid(e.to_string()))?,
                    None => ErrorReason::default(),
                };
                abort_handlers(reason, url_contains.clone())
            }
            RuleAction::Fulfill {
                status,
                body,
                encoded_body,
                headers,
                phrase,
            } => {
                let mut options = ResponseOptions::new();
                options.body = body.clone();
                options.encoded_body = encoded_body.clone();
                options.response_phrase = phrase.clone();
                for entry in headers {
                    options = options.header(entry.name.as_str(), entry.value.as_str());
                }
                fulfill_handlers(*status, options)
            }
            RuleAction::ReplaceBody { find, replace } => {
                let regex = Regex::new(find).map_err(|e| invalid(format!("invalid regex: {}", e)))?;
                replace_body_handlers(regex, replace.clone())
            }
            RuleAction::Log => log_handlers(self.name.clone()),
        };

        Ok(CompiledRule {
            name: self.name.clone(),
            enabled: self.enabled,
            patterns,
            handlers,
            options: self.options,
        })
    }
}

fn abort_handlers(reason: ErrorReason, url_contains: Option<String>) -> EventHandlers {
    EventHandlers::new().on_interception(move |event, mut control| {
        let applies = abort_applies(&event.request.url, url_contains.as_deref());
        async move {
            if applies {
                control.abort(reason);
            }
            Ok(control)
        }
    })
}

fn fulfill_handlers(status: i64, options: ResponseOptions) -> EventHandlers {
    EventHandlers::new().on_interception(move |_event, mut control| {
        let options = options.clone();
        async move {
            control.fulfill(status, Some(options));
            Ok(control)
        }
    })
}

fn replace_body_handlers(regex: Regex, replace: String) -> EventHandlers {
    EventHandlers::new().on_response_received(move |event| {
        let replaced = apply_replace(&regex, &event.response.body, &replace);
        async move {
            Ok(replaced.map(|body| {
                let mut response = event.response;
                response.body = body;
                response.base64_body = None;
                response
            }))
        }
    })
}

fn log_handlers(rule: String) -> EventHandlers {
    EventHandlers::new().on_response_received(move |event| {
        info!(
            rule = %rule,
            url = %event.request.url,
            status = event.response.status_code,
            body_len = event.response.body.len(),
            "Intercepted response"
        );
        async move { Ok(None) }
    })
}

pub fn abort_applies(url: &str, url_contains: Option<&str>) -> bool {
    url_contains.map_or(true, |needle| url.contains(needle))
}

/// Rewritten body, or `None` when the regex does not match
pub fn apply_replace(regex: &Regex, body: &str, replace: &str) -> Option<String> {
    match regex.replace_all(body, replace) {
        Cow::Borrowed(_) => None,
        Cow::Owned(body) => Some(body),
    }
}

/// Validate every rule, then register them in order on `source`.
/// Disabled rules are registered and immediately switched off.
pub async fn register_rules<P: SessionSource>(source: &P, rules: &[RuleConfig]) -> AgentResult<Vec<RegisteredRule>> {
    let compiled = rules.iter().map(RuleConfig::compile).collect::<AgentResult<Vec<_>>>()?;

    let mut registered = Vec::with_capacity(compiled.len());
    for rule in compiled {
        let name = rule.name.clone();
        let enabled = rule.enabled;
        let handler = rule.into_interception().register(source).await?;
        if !enabled {
            handler.disable();
        }
        debug!("Rule '{}' registered (enabled: {})", name, enabled);
        registered.push(RegisteredRule { name, handler });
    }

    info!("{} interception rules registered", registered.len());
    Ok(registered)
}
