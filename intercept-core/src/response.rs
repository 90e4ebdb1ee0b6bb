//! Response assembly
//!
//! Builds the [`InterceptedResponse`] handed to `on_response_received` and
//! encodes replacement bodies for `Fetch.fulfillRequest`.

use crate::error::InterceptResult;
use crate::session::{ErrorReason, FulfillRequest, HeaderEntry, PausedRequest, ResponseBody};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// A real response exposed to user code, and returned by it to replace the original
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedResponse {
    /// Body as text. Non-UTF-8 bytes are replaced, so binary bodies must be
    /// returned through `base64_body` instead.
    pub body: String,
    /// Pre-encoded body. Takes precedence over `body` when fulfilling.
    pub base64_body: Option<String>,
    pub headers: Option<Vec<HeaderEntry>>,
    pub status_code: i64,
    pub status_message: Option<String>,
    pub error_reason: Option<ErrorReason>,
}

impl InterceptedResponse {
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let headers = self.headers.get_or_insert_with(Vec::new);
        match headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.value = value.into(),
            None => headers.push(HeaderEntry::new(name, value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Decode a fetched body to text
pub fn decode_body(raw: &ResponseBody) -> InterceptResult<String> {
    if raw.base64_encoded {
        let bytes = STANDARD.decode(raw.body.as_bytes())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(raw.body.clone())
    }
}

/// Build the response value for a response-stage paused event.
///
/// Status code, headers and error reason are copied from the event; a
/// missing status code becomes 0.
pub fn build_response(event: &PausedRequest, raw: &ResponseBody) -> InterceptResult<InterceptedResponse> {
    Ok(InterceptedResponse {
        body: decode_body(raw)?,
        base64_body: None,
        headers: event.response_headers.clone(),
        status_code: event.response_status_code.unwrap_or_default(),
        status_message: None,
        error_reason: event.response_error_reason,
    })
}

/// Wire body for a replacement response: `base64_body` verbatim, else the
/// encoded text body.
pub fn encode_for_fulfillment(response: &InterceptedResponse) -> String {
    match &response.base64_body {
        Some(encoded) => encoded.clone(),
        None => encode_text(&response.body),
    }
}

pub fn encode_text(body: &str) -> String {
    STANDARD.encode(body.as_bytes())
}

/// Fulfill parameters for a replacement response
pub fn fulfill_from_response(request_id: &str, response: &InterceptedResponse) -> FulfillRequest {
    FulfillRequest {
        request_id: request_id.to_string(),
        response_code: response.status_code,
        response_headers: response.headers.clone(),
        binary_response_headers: None,
        body: Some(encode_for_fulfillment(response)),
        response_phrase: response.status_message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InterceptError;
    use proptest::prelude::*;

    fn paused(status: i64) -> PausedRequest {
        PausedRequest {
            request_id: "req-1".to_string(),
            response_status_code: Some(status),
            response_headers: Some(vec![HeaderEntry::new("Content-Type", "text/javascript")]),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_from_base64_body() {
        let raw = ResponseBody {
            body: STANDARD.encode("Dynamic header"),
            base64_encoded: true,
        };
        let response = build_response(&paused(200), &raw).unwrap();
        assert_eq!(response.body, "Dynamic header");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.header("content-type"), Some("text/javascript"));
        assert_eq!(response.base64_body, None);
    }

    #[test]
    fn test_build_from_plain_body() {
        let raw = ResponseBody {
            body: "plain".to_string(),
            base64_encoded: false,
        };
        assert_eq!(build_response(&paused(404), &raw).unwrap().body, "plain");
    }

    #[test]
    fn test_invalid_base64_is_an_encoding_error() {
        let raw = ResponseBody {
            body: "***".to_string(),
            base64_encoded: true,
        };
        assert!(matches!(build_response(&paused(200), &raw), Err(InterceptError::Encoding(_))));
    }

    #[test]
    fn test_pre_encoded_body_wins() {
        let response = InterceptedResponse {
            body: "ignored".to_string(),
            base64_body: Some("iVBORw0KGgo=".to_string()),
            status_code: 200,
            ..Default::default()
        };
        assert_eq!(encode_for_fulfillment(&response), "iVBORw0KGgo=");
    }

    #[test]
    fn test_fulfill_copies_status_and_phrase() {
        let mut response = InterceptedResponse {
            body: "Intercepted header".to_string(),
            status_code: 201,
            status_message: Some("Created".to_string()),
            ..Default::default()
        };
        response.set_header("X-Intercepted", "1");
        response.set_header("x-intercepted", "2");

        let params = fulfill_from_response("req-9", &response);
        assert_eq!(params.request_id, "req-9");
        assert_eq!(params.response_code, 201);
        assert_eq!(params.response_phrase.as_deref(), Some("Created"));
        assert_eq!(params.response_headers, Some(vec![HeaderEntry::new("X-Intercepted", "2")]));
        assert_eq!(params.body.as_deref(), Some("SW50ZXJjZXB0ZWQgaGVhZGVy"));
    }

    proptest! {
        #[test]
        fn prop_text_body_survives_encoding(body in ".*") {
            let response = InterceptedResponse { body: body.clone(), ..Default::default() };
            let decoded = STANDARD.decode(encode_for_fulfillment(&response)).unwrap();
            prop_assert_eq!(String::from_utf8(decoded).unwrap(), body);
        }

        #[test]
        fn prop_binary_body_passes_through(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = STANDARD.encode(&bytes);
            let response = InterceptedResponse {
                body: "text".to_string(),
                base64_body: Some(encoded.clone()),
                ..Default::default()
            };
            prop_assert_eq!(encode_for_fulfillment(&response), encoded);
        }
    }
}
