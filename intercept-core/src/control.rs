//! Interception-stage control
//!
//! [`InterceptControl`] is handed to `on_interception` by value and returned
//! from it. The engine reads the recorded decision afterwards; abort takes
//! precedence over fulfill no matter the call order.

use crate::response::encode_text;
use crate::session::{ErrorReason, FulfillRequest, HeaderEntry};
use serde::{Deserialize, Serialize};

/// Optional parts of a synthesized response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseOptions {
    pub response_headers: Option<Vec<HeaderEntry>>,
    /// Base64-encoded raw header block, passed through untouched
    pub binary_response_headers: Option<String>,
    /// Text body, base64-encoded before sending
    pub body: Option<String>,
    pub response_phrase: Option<String>,
    /// Pre-encoded body. Overrides `body`.
    pub encoded_body: Option<String>,
}

impl ResponseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn encoded_body(mut self, encoded: impl Into<String>) -> Self {
        self.encoded_body = Some(encoded.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_headers
            .get_or_insert_with(Vec::new)
            .push(HeaderEntry::new(name, value));
        self
    }

    pub fn phrase(mut self, phrase: impl Into<String>) -> Self {
        self.response_phrase = Some(phrase.into());
        self
    }

    fn into_fulfill(self, request_id: &str, response_code: i64) -> FulfillRequest {
        let body = match (self.encoded_body, self.body) {
            (Some(encoded), _) => Some(encoded),
            (None, Some(text)) => Some(encode_text(&text)),
            (None, None) => None,
        };
        FulfillRequest {
            request_id: request_id.to_string(),
            response_code,
            response_headers: self.response_headers,
            binary_response_headers: self.binary_response_headers,
            body,
            response_phrase: self.response_phrase,
        }
    }
}

/// Decision taken at the interception stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Neither abort nor fulfill was requested
    Continue,
    Abort(ErrorReason),
    Fulfill(FulfillRequest),
}

/// Per-event control state
#[derive(Debug, Clone)]
pub struct InterceptControl {
    request_id: String,
    abort: Option<ErrorReason>,
    fulfill: Option<FulfillRequest>,
}

impl InterceptControl {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            abort: None,
            fulfill: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Fail the request with `reason`. Wins over any `fulfill`.
    pub fn abort(&mut self, reason: ErrorReason) {
        self.abort = Some(reason);
    }

    /// Answer the request with a synthesized response. A later call replaces
    /// an earlier one.
    pub fn fulfill(&mut self, response_code: i64, options: Option<ResponseOptions>) {
        let options = options.unwrap_or_default();
        self.fulfill = Some(options.into_fulfill(&self.request_id, response_code));
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfill.is_some()
    }

    pub fn outcome(self) -> ControlOutcome {
        match (self.abort, self.fulfill) {
            (Some(reason), _) => ControlOutcome::Abort(reason),
            (None, Some(params)) => ControlOutcome::Fulfill(params),
            (None, None) => ControlOutcome::Continue,
        }
    }
}
