//! Registrations
//!
//! A registration owns one subscription to the paused-request stream of one
//! session. Every event is evaluated on its own task; the only state shared
//! between those tasks is the enabled flag.

use crate::config::InterceptOptions;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::engine::{EventHandlers, InterceptionEngine};
use crate::error::InterceptResult;
use crate::patterns::RequestPattern;
use crate::session::{FetchSession, SessionSource};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Registration settings, consumed by [`Interception::register`]
#[derive(Clone)]
pub struct Interception {
    patterns: Vec<RequestPattern>,
    handlers: EventHandlers,
    options: InterceptOptions,
    sink: Arc<dyn DiagnosticSink>,
}

impl Interception {
    pub fn new(patterns: Vec<RequestPattern>) -> Self {
        Self {
            patterns,
            handlers: EventHandlers::default(),
            options: InterceptOptions::default(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_options(mut self, options: InterceptOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Open a session on `source`, subscribe, and activate the filter.
    ///
    /// Resolves once `Fetch.enable` has been acknowledged.
    pub async fn register<P: SessionSource>(self, source: &P) -> InterceptResult<InterceptionHandler> {
        debug!("Registering interceptors for {} patterns", self.patterns.len());

        let session = source.create_session().await?;
        let session: Arc<dyn FetchSession> = session;

        // Subscribe before enabling so no paused event slips past the listener
        let mut events = session.paused_requests().await?;
        session.enable(&self.patterns).await?;

        let enabled = Arc::new(AtomicBool::new(true));
        let engine = Arc::new(InterceptionEngine::new(
            session,
            self.handlers,
            self.options,
            self.sink,
            Arc::clone(&enabled),
        ));

        let listener = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine.handle(event).await;
                });
            }
            debug!("Paused-request stream closed");
        });

        info!("Interception registered for {} patterns", self.patterns.len());

        Ok(InterceptionHandler {
            patterns: self.patterns,
            options: self.options,
            enabled,
            listener,
        })
    }
}

/// Live registration.
///
/// Dropping it does not stop interception: the subscription lives as long as
/// the session. Use [`disable`](Self::disable) to let requests through.
#[derive(Debug)]
pub struct InterceptionHandler {
    patterns: Vec<RequestPattern>,
    options: InterceptOptions,
    enabled: Arc<AtomicBool>,
    listener: JoinHandle<()>,
}

impl InterceptionHandler {
    /// Evaluate subsequent paused events normally
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Continue subsequent paused events untouched. Events already being
    /// evaluated are unaffected.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn patterns(&self) -> &[RequestPattern] {
        &self.patterns
    }

    pub fn options(&self) -> &InterceptOptions {
        &self.options
    }

    /// False once the session's event stream has ended
    pub fn is_listening(&self) -> bool {
        !self.listener.is_finished()
    }
}

/// Register `handlers` for `patterns` on `source` with default diagnostics.
pub async fn register_interception<P: SessionSource>(
    source: &P,
    patterns: Vec<RequestPattern>,
    handlers: EventHandlers,
    options: InterceptOptions,
) -> InterceptResult<InterceptionHandler> {
    Interception::new(patterns)
        .with_handlers(handlers)
        .with_options(options)
        .register(source)
        .await
}
