//! Request pattern builders
//!
//! Translates resource categories and URL globs into the filter descriptors
//! handed to `Fetch.enable`. Matching itself is done by the browser.

use crate::error::{InterceptError, InterceptResult};
use crate::session::PausedRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use wildmatch::WildMatch;

/// Resource categories understood by the browser's request filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    TextTrack,
    #[serde(rename = "XHR")]
    Xhr,
    Fetch,
    EventSource,
    WebSocket,
    Manifest,
    SignedExchange,
    Ping,
    #[serde(rename = "CSPViolationReport")]
    CspViolationReport,
    Other,
}

impl ResourceType {
    pub const ALL: [ResourceType; 16] = [
        ResourceType::Document,
        ResourceType::Stylesheet,
        ResourceType::Image,
        ResourceType::Media,
        ResourceType::Font,
        ResourceType::Script,
        ResourceType::TextTrack,
        ResourceType::Xhr,
        ResourceType::Fetch,
        ResourceType::EventSource,
        ResourceType::WebSocket,
        ResourceType::Manifest,
        ResourceType::SignedExchange,
        ResourceType::Ping,
        ResourceType::CspViolationReport,
        ResourceType::Other,
    ];

    /// Protocol name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Document => "Document",
            ResourceType::Stylesheet => "Stylesheet",
            ResourceType::Image => "Image",
            ResourceType::Media => "Media",
            ResourceType::Font => "Font",
            ResourceType::Script => "Script",
            ResourceType::TextTrack => "TextTrack",
            ResourceType::Xhr => "XHR",
            ResourceType::Fetch => "Fetch",
            ResourceType::EventSource => "EventSource",
            ResourceType::WebSocket => "WebSocket",
            ResourceType::Manifest => "Manifest",
            ResourceType::SignedExchange => "SignedExchange",
            ResourceType::Ping => "Ping",
            ResourceType::CspViolationReport => "CSPViolationReport",
            ResourceType::Other => "Other",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = InterceptError;

    /// Lookup by protocol name, ignoring case and `-`/`_` separators
    /// (`"text-track"`, `"text_track"` and `"TextTrack"` are the same tag)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| *c != '-' && *c != '_').collect();
        ResourceType::ALL
            .iter()
            .copied()
            .find(|t| !wanted.is_empty() && t.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| InterceptError::InvalidResourceType(s.to_string()))
    }
}

/// Point in the request lifecycle at which the browser pauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStage {
    Request,
    Response,
}

/// Filter descriptor consumed by the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
    pub url_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    /// `None` leaves the stage to the browser default (request stage)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_stage: Option<RequestStage>,
}

impl RequestPattern {
    /// Response-stage pattern, optionally restricted to one category
    pub fn new(url_pattern: impl Into<String>, resource_type: Option<ResourceType>) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            resource_type,
            request_stage: Some(RequestStage::Response),
        }
    }

    pub fn with_stage(mut self, stage: Option<RequestStage>) -> Self {
        self.request_stage = stage;
        self
    }

    /// Whether the browser would pause `event` for this pattern.
    ///
    /// An unset stage means the request stage, matching the browser default.
    pub fn matches(&self, event: &PausedRequest) -> bool {
        let stage_matches = match self.request_stage {
            Some(RequestStage::Response) => event.is_response_stage(),
            Some(RequestStage::Request) | None => !event.is_response_stage(),
        };
        let type_matches = self.resource_type.map_or(true, |t| event.resource_type == Some(t));
        stage_matches && type_matches && WildMatch::new(&self.url_pattern).matches(&event.request.url)
    }
}

/// One URL glob or a sequence of them
pub trait UrlGlobs {
    fn into_globs(self) -> Vec<String>;
}

impl UrlGlobs for &str {
    fn into_globs(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl UrlGlobs for String {
    fn into_globs(self) -> Vec<String> {
        vec![self]
    }
}

impl UrlGlobs for Vec<String> {
    fn into_globs(self) -> Vec<String> {
        self
    }
}

impl UrlGlobs for Vec<&str> {
    fn into_globs(self) -> Vec<String> {
        self.into_iter().map(String::from).collect()
    }
}

impl UrlGlobs for &[&str] {
    fn into_globs(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl UrlGlobs for &[String] {
    fn into_globs(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> UrlGlobs for [&str; N] {
    fn into_globs(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Response-stage patterns for `resource_type`, one per glob
pub fn for_resource_type(resource_type: ResourceType, globs: impl UrlGlobs) -> Vec<RequestPattern> {
    globs
        .into_globs()
        .into_iter()
        .map(|glob| RequestPattern::new(glob, Some(resource_type)))
        .collect()
}

/// Like [`for_resource_type`] but takes the category by name; unknown names fail.
pub fn by_name(resource_type: &str, globs: impl UrlGlobs) -> InterceptResult<Vec<RequestPattern>> {
    let resource_type = resource_type.parse::<ResourceType>()?;
    Ok(for_resource_type(resource_type, globs))
}

/// Response-stage patterns matching every category
pub fn all(globs: impl UrlGlobs) -> Vec<RequestPattern> {
    globs
        .into_globs()
        .into_iter()
        .map(|glob| RequestPattern::new(glob, None))
        .collect()
}

/// Patterns matching every category with no stage restriction.
///
/// Requests matched only by these pause before they are sent, so no response
/// body is ever available to `on_response_received`.
pub fn any_stage(globs: impl UrlGlobs) -> Vec<RequestPattern> {
    globs
        .into_globs()
        .into_iter()
        .map(|glob| RequestPattern::new(glob, None).with_stage(None))
        .collect()
}

macro_rules! category_builders {
    ($($(#[$doc:meta])* $name:ident => $variant:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(globs: impl UrlGlobs) -> Vec<RequestPattern> {
                for_resource_type(ResourceType::$variant, globs)
            }
        )*
    };
}

category_builders! {
    document => Document;
    stylesheet => Stylesheet;
    image => Image;
    media => Media;
    font => Font;
    script => Script;
    text_track => TextTrack;
    xhr => Xhr;
    fetch => Fetch;
    event_source => EventSource;
    web_socket => WebSocket;
    manifest => Manifest;
    signed_exchange => SignedExchange;
    ping => Ping;
    /// Content-Security-Policy violation reports
    csp_violation_report => CspViolationReport;
    other => Other;
}
