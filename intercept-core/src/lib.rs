//! Intercept Core
//!
//! Pauses requests made by a browser page and lets calling code abort them,
//! answer them with a synthesized response, or rewrite the real response
//! before the page sees it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use intercept_core::{patterns, register_interception, EventHandlers, ErrorReason, InterceptOptions, PageInterceptor};
//!
//! let handlers = EventHandlers::new()
//!     .on_interception(|event, mut control| async move {
//!         if event.request.url.contains("tracker.js") {
//!             control.abort(ErrorReason::BlockedByClient);
//!         }
//!         Ok(control)
//!     })
//!     .on_response_received(|mut event| async move {
//!         event.response.body = event.response.body.replace("Dynamic", "Intercepted");
//!         Ok(Some(event.response))
//!     });
//!
//! let interceptor = PageInterceptor::for_page(page);
//! let handler = register_interception(&interceptor, patterns::script("*"), handlers, InterceptOptions::default()).await?;
//! handler.disable();
//! ```

pub mod cdp;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod handler;
pub mod mux;
pub mod patterns;
pub mod response;
pub mod session;

pub use cdp::{PageInterceptor, PageSession};
pub use config::InterceptOptions;
pub use control::{ControlOutcome, InterceptControl, ResponseOptions};
pub use diagnostics::{DiagnosticSink, MemorySink, NoopSink, TracingSink};
pub use engine::{Dispatch, EventHandlers, InterceptionEngine, Resolution, ResponseReceivedEvent};
pub use error::{InterceptError, InterceptResult};
pub use handler::{register_interception, Interception, InterceptionHandler};
pub use mux::{RoutedSession, SessionMux};
pub use patterns::{RequestPattern, RequestStage, ResourceType, UrlGlobs};
pub use response::InterceptedResponse;
pub use session::{
    ErrorReason, FetchSession, FulfillRequest, HeaderEntry, InterceptedRequest, PausedRequest,
    ResponseBody, SessionSource,
};
