//! Interception decision engine
//!
//! Resolves each paused request with exactly one terminal command:
//!
//! 1. disabled registration: `continue`, no user code runs
//! 2. `on_interception`: abort (wins) / fulfill / fall through
//! 3. `on_response_received`: only for response-stage events that survive
//!    the configured filters and whose body could be fetched
//! 4. `fulfill` with the returned replacement, otherwise `continue`
//!
//! Command failures are reported to the diagnostic sink and never retried.
//! A callback that errors or panics resolves its request with `continue`.

use crate::config::InterceptOptions;
use crate::control::{ControlOutcome, InterceptControl};
use crate::diagnostics::DiagnosticSink;
use crate::error::{InterceptError, InterceptResult};
use crate::response::{build_response, fulfill_from_response, InterceptedResponse};
use crate::session::{ErrorReason, FetchSession, FulfillRequest, InterceptedRequest, PausedRequest};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info_span, Instrument, Level};

pub type InterceptionFuture = BoxFuture<'static, anyhow::Result<InterceptControl>>;

/// `on_interception`: receives the paused event and the control state, and
/// hands the control state back once it has decided.
pub type InterceptionCallback =
    Arc<dyn Fn(Arc<PausedRequest>, InterceptControl) -> InterceptionFuture + Send + Sync>;

pub type ResponseFuture = BoxFuture<'static, anyhow::Result<Option<InterceptedResponse>>>;

/// `on_response_received`: `Some(response)` replaces the real response.
pub type ResponseCallback = Arc<dyn Fn(ResponseReceivedEvent) -> ResponseFuture + Send + Sync>;

/// Argument of `on_response_received`
#[derive(Debug, Clone)]
pub struct ResponseReceivedEvent {
    pub request: InterceptedRequest,
    pub response: InterceptedResponse,
}

/// User callbacks of one registration
#[derive(Clone, Default)]
pub struct EventHandlers {
    on_interception: Option<InterceptionCallback>,
    on_response_received: Option<ResponseCallback>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_interception<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Arc<PausedRequest>, InterceptControl) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<InterceptControl>> + Send + 'static,
    {
        self.on_interception = Some(Arc::new(move |event, control| callback(event, control).boxed()));
        self
    }

    pub fn on_response_received<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(ResponseReceivedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<InterceptedResponse>>> + Send + 'static,
    {
        self.on_response_received = Some(Arc::new(move |event| callback(event).boxed()));
        self
    }

    pub fn has_interception(&self) -> bool {
        self.on_interception.is_some()
    }

    pub fn has_response_received(&self) -> bool {
        self.on_response_received.is_some()
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_interception", &self.has_interception())
            .field("on_response_received", &self.has_response_received())
            .finish()
    }
}

/// Terminal command issued for a paused request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Continued,
    Failed(ErrorReason),
    Fulfilled(i64),
}

/// What the engine sent, and whether the browser accepted it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub resolution: Resolution,
    pub accepted: bool,
}

pub struct InterceptionEngine {
    session: Arc<dyn FetchSession>,
    handlers: EventHandlers,
    options: InterceptOptions,
    sink: Arc<dyn DiagnosticSink>,
    enabled: Arc<AtomicBool>,
}

impl InterceptionEngine {
    pub fn new(
        session: Arc<dyn FetchSession>,
        handlers: EventHandlers,
        options: InterceptOptions,
        sink: Arc<dyn DiagnosticSink>,
        enabled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            handlers,
            options,
            sink,
            enabled,
        }
    }

    pub fn options(&self) -> &InterceptOptions {
        &self.options
    }

    /// Evaluate one paused request and send its terminal command
    pub async fn handle(&self, event: PausedRequest) -> Dispatch {
        let span = info_span!(
            "paused_request",
            request_id = %event.request_id,
            url = %event.request.url
        );
        self.evaluate(event).instrument(span).await
    }

    async fn evaluate(&self, event: PausedRequest) -> Dispatch {
        let request_id = event.request_id.clone();

        if !self.enabled.load(Ordering::Acquire) {
            self.log(Level::DEBUG, format!("Interception handler disabled, continuing request {}", request_id));
            return self.continue_request(&request_id).await;
        }

        self.log(
            Level::DEBUG,
            format!("Request {} ({}) paused", event.request.url, request_id),
        );
        let event = Arc::new(event);

        if let Some(callback) = &self.handlers.on_interception {
            match self.run_interception(callback, &event).await {
                Ok(ControlOutcome::Abort(reason)) => return self.fail_request(&request_id, reason).await,
                Ok(ControlOutcome::Fulfill(params)) => return self.fulfill_request(params).await,
                Ok(ControlOutcome::Continue) => {}
                Err(err) => {
                    self.log(Level::ERROR, format!("onInterception failed for {}: {}", request_id, err));
                    return self.continue_request(&request_id).await;
                }
            }
        }

        let replacement = match &self.handlers.on_response_received {
            Some(callback) => match self.run_response_stage(callback, &event).await {
                Ok(replacement) => replacement,
                Err(err) => {
                    self.log(Level::ERROR, format!("onResponseReceived failed for {}: {}", request_id, err));
                    return self.continue_request(&request_id).await;
                }
            },
            None => None,
        };

        match replacement {
            Some(response) => {
                self.log(
                    Level::DEBUG,
                    format!("Fulfilling request {} with response returned from onResponseReceived", request_id),
                );
                self.fulfill_request(fulfill_from_response(&request_id, &response)).await
            }
            None => self.continue_request(&request_id).await,
        }
    }

    async fn run_interception(
        &self,
        callback: &InterceptionCallback,
        event: &Arc<PausedRequest>,
    ) -> InterceptResult<ControlOutcome> {
        let control = InterceptControl::new(event.request_id.clone());
        let control = AssertUnwindSafe(callback(Arc::clone(event), control))
            .catch_unwind()
            .await
            .map_err(panic_to_error)?
            .map_err(|e| InterceptError::Callback(format!("{:#}", e)))?;
        Ok(control.outcome())
    }

    /// Returns the replacement response, if the callback produced one.
    /// Skips and body-fetch failures yield `Ok(None)`.
    async fn run_response_stage(
        &self,
        callback: &ResponseCallback,
        event: &Arc<PausedRequest>,
    ) -> InterceptResult<Option<InterceptedResponse>> {
        let request_id = &event.request_id;

        let status = match event.response_status_code {
            Some(status) => status,
            None => {
                self.log(
                    Level::WARN,
                    format!(
                        "onResponseReceived handler passed but {} intercepted at Request stage. Handler can not be called.",
                        request_id
                    ),
                );
                return Ok(None);
            }
        };

        if let Some(reason) = self.options.skip_reason(status) {
            self.log(
                Level::WARN,
                format!(
                    "onResponseReceived handler passed but {} {} {}. Handler can not be called.",
                    request_id, reason, status
                ),
            );
            return Ok(None);
        }

        let raw = match self.session.get_response_body(request_id).await {
            Ok(raw) => raw,
            Err(err) => {
                self.log(Level::INFO, format!("Error in getting response body for {}: {}", request_id, err));
                return Ok(None);
            }
        };

        let response = match build_response(event, &raw) {
            Ok(response) => response,
            Err(err) => {
                self.log(Level::INFO, format!("Could not decode response body for {}: {}", request_id, err));
                return Ok(None);
            }
        };

        let received = ResponseReceivedEvent {
            request: event.request.clone(),
            response,
        };

        AssertUnwindSafe(callback(received))
            .catch_unwind()
            .await
            .map_err(panic_to_error)?
            .map_err(|e| InterceptError::Callback(format!("{:#}", e)))
    }

    async fn continue_request(&self, request_id: &str) -> Dispatch {
        let accepted = match self.session.continue_request(request_id).await {
            Ok(()) => true,
            Err(err) => {
                self.log(Level::WARN, format!("Error in Fetch.continueRequest for {}: {}", request_id, err));
                false
            }
        };
        Dispatch {
            resolution: Resolution::Continued,
            accepted,
        }
    }

    async fn fail_request(&self, request_id: &str, reason: ErrorReason) -> Dispatch {
        self.log(Level::DEBUG, format!("Aborting request {} with reason \"{}\"", request_id, reason));
        let accepted = match self.session.fail_request(request_id, reason).await {
            Ok(()) => true,
            Err(err) => {
                self.log(Level::WARN, format!("Error in Fetch.failRequest for {}: {}", request_id, err));
                false
            }
        };
        Dispatch {
            resolution: Resolution::Failed(reason),
            accepted,
        }
    }

    async fn fulfill_request(&self, params: FulfillRequest) -> Dispatch {
        let request_id = params.request_id.clone();
        let status = params.response_code;
        self.log(
            Level::DEBUG,
            format!("Fulfilling request {} with responseCode \"{}\"", request_id, status),
        );
        let accepted = match self.session.fulfill_request(params).await {
            Ok(()) => true,
            Err(err) => {
                self.log(Level::WARN, format!("Error in Fetch.fulfillRequest for {}: {}", request_id, err));
                false
            }
        };
        Dispatch {
            resolution: Resolution::Fulfilled(status),
            accepted,
        }
    }

    fn log(&self, level: Level, message: String) {
        self.sink.log(level, &message);
    }
}

fn panic_to_error(payload: Box<dyn Any + Send>) -> InterceptError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    InterceptError::Callback(format!("callback panicked: {}", message))
}
