//! Browser-control channel
//!
//! Protocol data exchanged with the browser's `Fetch` domain and the traits an
//! adapter implements to carry it. [`crate::cdp`] provides the chromiumoxide
//! adapter; tests plug in an in-memory channel.

use crate::error::{InterceptError, InterceptResult};
use crate::patterns::{RequestPattern, ResourceType};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Network-level error reasons accepted by `Fetch.failRequest`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorReason {
    Failed,
    #[default]
    Aborted,
    TimedOut,
    AccessDenied,
    ConnectionClosed,
    ConnectionReset,
    ConnectionRefused,
    ConnectionAborted,
    ConnectionFailed,
    NameNotResolved,
    InternetDisconnected,
    AddressUnreachable,
    BlockedByClient,
    BlockedByResponse,
}

impl ErrorReason {
    pub const ALL: [ErrorReason; 14] = [
        ErrorReason::Failed,
        ErrorReason::Aborted,
        ErrorReason::TimedOut,
        ErrorReason::AccessDenied,
        ErrorReason::ConnectionClosed,
        ErrorReason::ConnectionReset,
        ErrorReason::ConnectionRefused,
        ErrorReason::ConnectionAborted,
        ErrorReason::ConnectionFailed,
        ErrorReason::NameNotResolved,
        ErrorReason::InternetDisconnected,
        ErrorReason::AddressUnreachable,
        ErrorReason::BlockedByClient,
        ErrorReason::BlockedByResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::Failed => "Failed",
            ErrorReason::Aborted => "Aborted",
            ErrorReason::TimedOut => "TimedOut",
            ErrorReason::AccessDenied => "AccessDenied",
            ErrorReason::ConnectionClosed => "ConnectionClosed",
            ErrorReason::ConnectionReset => "ConnectionReset",
            ErrorReason::ConnectionRefused => "ConnectionRefused",
            ErrorReason::ConnectionAborted => "ConnectionAborted",
            ErrorReason::ConnectionFailed => "ConnectionFailed",
            ErrorReason::NameNotResolved => "NameNotResolved",
            ErrorReason::InternetDisconnected => "InternetDisconnected",
            ErrorReason::AddressUnreachable => "AddressUnreachable",
            ErrorReason::BlockedByClient => "BlockedByClient",
            ErrorReason::BlockedByResponse => "BlockedByResponse",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorReason {
    type Err = InterceptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorReason::ALL
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| InterceptError::InvalidErrorReason(s.to_string()))
    }
}

/// Response header as carried by the `Fetch` domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The request as the browser was about to send it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
}

/// `Fetch.requestPaused` event
///
/// The `response_*` fields are only present when the request was paused at
/// the response stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedRequest {
    pub request_id: String,
    pub request: InterceptedRequest,
    pub resource_type: Option<ResourceType>,
    pub response_status_code: Option<i64>,
    pub response_status_text: Option<String>,
    pub response_headers: Option<Vec<HeaderEntry>>,
    pub response_error_reason: Option<ErrorReason>,
}

impl PausedRequest {
    /// Whether the request was paused after its response arrived
    pub fn is_response_stage(&self) -> bool {
        self.response_status_code.is_some() || self.response_error_reason.is_some()
    }
}

/// Parameters of `Fetch.fulfillRequest`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillRequest {
    pub request_id: String,
    pub response_code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_response_headers: Option<String>,
    /// Base64-encoded body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_phrase: Option<String>,
}

/// Result of `Fetch.getResponseBody`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub body: String,
    pub base64_encoded: bool,
}

/// Stream of paused-request events for one subscriber
pub type PausedRequestStream = BoxStream<'static, PausedRequest>;

/// A single protocol session with the `Fetch` domain.
///
/// Every command is independent; failures are reported as
/// [`InterceptError::Protocol`] and never retried by the caller.
#[async_trait]
pub trait FetchSession: Send + Sync + 'static {
    /// `Fetch.enable` with the given filter
    async fn enable(&self, patterns: &[RequestPattern]) -> InterceptResult<()>;

    /// Subscribe to `Fetch.requestPaused`
    async fn paused_requests(&self) -> InterceptResult<PausedRequestStream>;

    /// `Fetch.continueRequest`
    async fn continue_request(&self, request_id: &str) -> InterceptResult<()>;

    /// `Fetch.failRequest`
    async fn fail_request(&self, request_id: &str, reason: ErrorReason) -> InterceptResult<()>;

    /// `Fetch.fulfillRequest`
    async fn fulfill_request(&self, params: FulfillRequest) -> InterceptResult<()>;

    /// `Fetch.getResponseBody`
    async fn get_response_body(&self, request_id: &str) -> InterceptResult<ResponseBody>;
}

/// Something a session can be created from.
///
/// Every call is one registration; the returned session must carry only the
/// events that match the patterns later passed to its `enable`.
#[async_trait]
pub trait SessionSource: Send + Sync {
    type Session: FetchSession;

    async fn create_session(&self) -> InterceptResult<Arc<Self::Session>>;
}
