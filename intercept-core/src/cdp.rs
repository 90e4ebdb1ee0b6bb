//! chromiumoxide adapter
//!
//! Carries the `Fetch` domain over a [`chromiumoxide::Page`]. A page has one
//! target session, so registrations go through a [`PageInterceptor`], which
//! keeps the union of their patterns enabled and routes each paused request
//! to the registrations it belongs to.

use crate::error::{InterceptError, InterceptResult};
use crate::mux::SessionMux;
use crate::patterns::{RequestPattern, RequestStage, ResourceType};
use crate::session::{
    ErrorReason, FetchSession, FulfillRequest, HeaderEntry, InterceptedRequest, PausedRequest,
    PausedRequestStream, ResponseBody,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, FulfillRequestParams,
    GetResponseBodyParams, HeaderEntry as CdpHeaderEntry, RequestId, RequestPattern as CdpRequestPattern,
    RequestStage as CdpRequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason as CdpErrorReason, Request as CdpRequest, ResourceType as CdpResourceType,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::BTreeMap;

/// `Fetch` session bound to one page
#[derive(Debug, Clone)]
pub struct PageSession {
    page: Page,
}

impl PageSession {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl FetchSession for PageSession {
    async fn enable(&self, patterns: &[RequestPattern]) -> InterceptResult<()> {
        let params = EnableParams {
            patterns: Some(patterns.iter().map(to_cdp_pattern).collect()),
            handle_auth_requests: None,
        };
        self.page
            .execute(params)
            .await
            .map_err(|e| InterceptError::protocol("Fetch.enable", e))?;
        Ok(())
    }

    async fn paused_requests(&self) -> InterceptResult<PausedRequestStream> {
        let events = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| InterceptError::protocol("Fetch.requestPaused", e))?;
        Ok(events.map(|event| from_cdp_event(&event)).boxed())
    }

    async fn continue_request(&self, request_id: &str) -> InterceptResult<()> {
        self.page
            .execute(ContinueRequestParams::new(RequestId::new(request_id)))
            .await
            .map_err(|e| InterceptError::protocol("Fetch.continueRequest", e))?;
        Ok(())
    }

    async fn fail_request(&self, request_id: &str, reason: ErrorReason) -> InterceptResult<()> {
        let params = FailRequestParams::new(RequestId::new(request_id), to_cdp_error_reason(reason));
        self.page
            .execute(params)
            .await
            .map_err(|e| InterceptError::protocol("Fetch.failRequest", e))?;
        Ok(())
    }

    async fn fulfill_request(&self, params: FulfillRequest) -> InterceptResult<()> {
        let mut cdp_params = FulfillRequestParams::new(RequestId::new(params.request_id), params.response_code);
        cdp_params.response_headers = params.response_headers.map(|headers| {
            headers
                .into_iter()
                .map(|h| CdpHeaderEntry {
                    name: h.name,
                    value: h.value,
                })
                .collect()
        });
        cdp_params.binary_response_headers = params.binary_response_headers.map(Into::into);
        cdp_params.body = params.body.map(Into::into);
        cdp_params.response_phrase = params.response_phrase;

        self.page
            .execute(cdp_params)
            .await
            .map_err(|e| InterceptError::protocol("Fetch.fulfillRequest", e))?;
        Ok(())
    }

    async fn get_response_body(&self, request_id: &str) -> InterceptResult<ResponseBody> {
        let returns = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await
            .map_err(|e| InterceptError::protocol("Fetch.getResponseBody", e))?
            .result;
        Ok(ResponseBody {
            body: returns.body,
            base64_encoded: returns.base64_encoded,
        })
    }
}

/// Registration point for every interception made on one page
pub type PageInterceptor = SessionMux<PageSession>;

impl SessionMux<PageSession> {
    pub fn for_page(page: Page) -> Self {
        Self::new(PageSession::new(page))
    }

    pub fn page(&self) -> &Page {
        self.channel().page()
    }
}

fn to_cdp_pattern(pattern: &RequestPattern) -> CdpRequestPattern {
    CdpRequestPattern {
        url_pattern: Some(pattern.url_pattern.clone()),
        resource_type: pattern.resource_type.map(to_cdp_resource_type),
        request_stage: pattern.request_stage.map(|stage| match stage {
            RequestStage::Request => CdpRequestStage::Request,
            RequestStage::Response => CdpRequestStage::Response,
        }),
    }
}

fn to_cdp_resource_type(resource_type: ResourceType) -> CdpResourceType {
    match resource_type {
        ResourceType::Document => CdpResourceType::Document,
        ResourceType::Stylesheet => CdpResourceType::Stylesheet,
        ResourceType::Image => CdpResourceType::Image,
        ResourceType::Media => CdpResourceType::Media,
        ResourceType::Font => CdpResourceType::Font,
        ResourceType::Script => CdpResourceType::Script,
        ResourceType::TextTrack => CdpResourceType::TextTrack,
        ResourceType::Xhr => CdpResourceType::Xhr,
        ResourceType::Fetch => CdpResourceType::Fetch,
        ResourceType::EventSource => CdpResourceType::EventSource,
        ResourceType::WebSocket => CdpResourceType::WebSocket,
        ResourceType::Manifest => CdpResourceType::Manifest,
        ResourceType::SignedExchange => CdpResourceType::SignedExchange,
        ResourceType::Ping => CdpResourceType::Ping,
        ResourceType::CspViolationReport => CdpResourceType::CspViolationReport,
        ResourceType::Other => CdpResourceType::Other,
    }
}

#[allow(unreachable_patterns)]
fn from_cdp_resource_type(resource_type: &CdpResourceType) -> ResourceType {
    match resource_type {
        CdpResourceType::Document => ResourceType::Document,
        CdpResourceType::Stylesheet => ResourceType::Stylesheet,
        CdpResourceType::Image => ResourceType::Image,
        CdpResourceType::Media => ResourceType::Media,
        CdpResourceType::Font => ResourceType::Font,
        CdpResourceType::Script => ResourceType::Script,
        CdpResourceType::TextTrack => ResourceType::TextTrack,
        CdpResourceType::Xhr => ResourceType::Xhr,
        CdpResourceType::Fetch => ResourceType::Fetch,
        CdpResourceType::EventSource => ResourceType::EventSource,
        CdpResourceType::WebSocket => ResourceType::WebSocket,
        CdpResourceType::Manifest => ResourceType::Manifest,
        CdpResourceType::SignedExchange => ResourceType::SignedExchange,
        CdpResourceType::Ping => ResourceType::Ping,
        CdpResourceType::CspViolationReport => ResourceType::CspViolationReport,
        _ => ResourceType::Other,
    }
}

fn to_cdp_error_reason(reason: ErrorReason) -> CdpErrorReason {
    match reason {
        ErrorReason::Failed => CdpErrorReason::Failed,
        ErrorReason::Aborted => CdpErrorReason::Aborted,
        ErrorReason::TimedOut => CdpErrorReason::TimedOut,
        ErrorReason::AccessDenied => CdpErrorReason::AccessDenied,
        ErrorReason::ConnectionClosed => CdpErrorReason::ConnectionClosed,
        ErrorReason::ConnectionReset => CdpErrorReason::ConnectionReset,
        ErrorReason::ConnectionRefused => CdpErrorReason::ConnectionRefused,
        ErrorReason::ConnectionAborted => CdpErrorReason::ConnectionAborted,
        ErrorReason::ConnectionFailed => CdpErrorReason::ConnectionFailed,
        ErrorReason::NameNotResolved => CdpErrorReason::NameNotResolved,
        ErrorReason::InternetDisconnected => CdpErrorReason::InternetDisconnected,
        ErrorReason::AddressUnreachable => CdpErrorReason::AddressUnreachable,
        ErrorReason::BlockedByClient => CdpErrorReason::BlockedByClient,
        ErrorReason::BlockedByResponse => CdpErrorReason::BlockedByResponse,
    }
}

#[allow(unreachable_patterns)]
fn from_cdp_error_reason(reason: &CdpErrorReason) -> ErrorReason {
    match reason {
        CdpErrorReason::Aborted => ErrorReason::Aborted,
        CdpErrorReason::TimedOut => ErrorReason::TimedOut,
        CdpErrorReason::AccessDenied => ErrorReason::AccessDenied,
        CdpErrorReason::ConnectionClosed => ErrorReason::ConnectionClosed,
        CdpErrorReason::ConnectionReset => ErrorReason::ConnectionReset,
        CdpErrorReason::ConnectionRefused => ErrorReason::ConnectionRefused,
        CdpErrorReason::ConnectionAborted => ErrorReason::ConnectionAborted,
        CdpErrorReason::ConnectionFailed => ErrorReason::ConnectionFailed,
        CdpErrorReason::NameNotResolved => ErrorReason::NameNotResolved,
        CdpErrorReason::InternetDisconnected => ErrorReason::InternetDisconnected,
        CdpErrorReason::AddressUnreachable => ErrorReason::AddressUnreachable,
        CdpErrorReason::BlockedByClient => ErrorReason::BlockedByClient,
        CdpErrorReason::BlockedByResponse => ErrorReason::BlockedByResponse,
        _ => ErrorReason::Failed,
    }
}

fn from_cdp_headers(headers: &[CdpHeaderEntry]) -> Vec<HeaderEntry> {
    headers
        .iter()
        .map(|h| HeaderEntry::new(h.name.clone(), h.value.clone()))
        .collect()
}

/// Request body reassembled from its base64 post data entries
fn post_data(request: &CdpRequest) -> Option<String> {
    let entries = request.post_data_entries.as_ref()?;
    let mut bytes = Vec::new();
    for chunk in entries.iter().filter_map(|entry| entry.bytes.as_ref()) {
        let chunk: &str = chunk.as_ref();
        bytes.extend(STANDARD.decode(chunk).ok()?);
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn from_cdp_event(event: &EventRequestPaused) -> PausedRequest {
    let mut headers = BTreeMap::new();
    if let Some(obj) = event.request.headers.inner().as_object() {
        for (name, value) in obj {
            let value = value.as_str().map(String::from).unwrap_or_else(|| value.to_string());
            headers.insert(name.clone(), value);
        }
    }

    PausedRequest {
        request_id: event.request_id.inner().clone(),
        request: InterceptedRequest {
            url: event.request.url.clone(),
            method: event.request.method.clone(),
            headers,
            post_data: post_data(&event.request),
        },
        resource_type: Some(from_cdp_resource_type(&event.resource_type)),
        response_status_code: event.response_status_code,
        response_status_text: event.response_status_text.clone(),
        response_headers: event.response_headers.as_deref().map(from_cdp_headers),
        response_error_reason: event.response_error_reason.as_ref().map(from_cdp_error_reason),
    }
}
