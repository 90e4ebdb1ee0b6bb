//! Registration multiplexer
//!
//! A page exposes one `Fetch` domain: a single active pattern set and a single
//! stream of paused requests that every listener sees. [`SessionMux`] splits it
//! into independent registrations. The page is enabled with the union of the
//! patterns of every registration, and each paused request is routed only to
//! the registrations whose own patterns match it. Requests no registration
//! claims are continued.

use crate::error::InterceptResult;
use crate::patterns::RequestPattern;
use crate::session::{
    ErrorReason, FetchSession, FulfillRequest, PausedRequest, PausedRequestStream, ResponseBody, SessionSource,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace, warn};

#[derive(Default)]
struct Route {
    patterns: Vec<RequestPattern>,
    sender: Option<mpsc::UnboundedSender<PausedRequest>>,
}

struct Shared<S> {
    channel: Arc<S>,
    routes: Mutex<Vec<Route>>,
    /// Whether the routing task holds a subscription on `channel`
    routing: tokio::sync::Mutex<bool>,
    /// `Fetch.enable` calls are applied one at a time
    enable_lock: tokio::sync::Mutex<()>,
}

impl<S: FetchSession> Shared<S> {
    fn routes(&self) -> MutexGuard<'_, Vec<Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Patterns of every registration, with `patterns` standing in for `index`
    fn union_with(&self, index: usize, patterns: &[RequestPattern]) -> Vec<RequestPattern> {
        let routes = self.routes();
        let mut union: Vec<RequestPattern> = Vec::new();
        for (i, route) in routes.iter().enumerate() {
            let own = if i == index { patterns } else { route.patterns.as_slice() };
            for pattern in own {
                if !union.contains(pattern) {
                    union.push(pattern.clone());
                }
            }
        }
        union
    }

    /// Deliver `event` to every matching registration, returning how many got it
    fn dispatch(&self, event: &PausedRequest) -> usize {
        let mut routes = self.routes();
        let mut delivered = 0;
        for route in routes.iter_mut() {
            if !route.patterns.iter().any(|p| p.matches(event)) {
                continue;
            }
            let Some(sender) = &route.sender else { continue };
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                route.sender = None;
            }
        }
        delivered
    }

    fn close_routes(&self) {
        for route in self.routes().iter_mut() {
            route.sender = None;
        }
    }

    async fn start_routing(self: &Arc<Self>) -> InterceptResult<()> {
        let mut routing = self.routing.lock().await;
        if *routing {
            return Ok(());
        }
        let events = self.channel.paused_requests().await?;
        tokio::spawn(route_events(Arc::clone(self), events));
        *routing = true;
        Ok(())
    }
}

async fn route_events<S: FetchSession>(shared: Arc<Shared<S>>, mut events: PausedRequestStream) {
    while let Some(event) = events.next().await {
        let delivered = shared.dispatch(&event);
        trace!("Routed {} to {} registration(s)", event.request_id, delivered);
        if delivered > 0 {
            continue;
        }

        let channel = Arc::clone(&shared.channel);
        tokio::spawn(async move {
            debug!("No registration claims {}, continuing", event.request.url);
            if let Err(e) = channel.continue_request(&event.request_id).await {
                warn!("Error in Fetch.continueRequest for unclaimed {}: {}", event.request_id, e);
            }
        });
    }

    debug!("Paused request stream ended, closing registrations");
    *shared.routing.lock().await = false;
    shared.close_routes();
}

/// Splits one shared [`FetchSession`] into independent registrations.
///
/// Create one per page and register every interception on that page through
/// it; each [`SessionSource::create_session`] call is one registration.
pub struct SessionMux<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for SessionMux<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: FetchSession> SessionMux<S> {
    pub fn new(channel: S) -> Self {
        Self::from_arc(Arc::new(channel))
    }

    pub fn from_arc(channel: Arc<S>) -> Self {
        Self {
            shared: Arc::new(Shared {
                channel,
                routes: Mutex::new(Vec::new()),
                routing: tokio::sync::Mutex::new(false),
                enable_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The shared session every registration sends its commands through
    pub fn channel(&self) -> &Arc<S> {
        &self.shared.channel
    }

    /// Number of registrations created so far
    pub fn registrations(&self) -> usize {
        self.shared.routes().len()
    }

    /// Pattern set currently applied to the shared session
    pub fn active_patterns(&self) -> Vec<RequestPattern> {
        self.shared.union_with(usize::MAX, &[])
    }
}

#[async_trait]
impl<S: FetchSession> SessionSource for SessionMux<S> {
    type Session = RoutedSession<S>;

    async fn create_session(&self) -> InterceptResult<Arc<RoutedSession<S>>> {
        let index = {
            let mut routes = self.shared.routes();
            routes.push(Route::default());
            routes.len() - 1
        };
        Ok(Arc::new(RoutedSession {
            shared: Arc::clone(&self.shared),
            index,
        }))
    }
}

/// One registration's view of a [`SessionMux`]
pub struct RoutedSession<S> {
    shared: Arc<Shared<S>>,
    index: usize,
}

#[async_trait]
impl<S: FetchSession> FetchSession for RoutedSession<S> {
    async fn enable(&self, patterns: &[RequestPattern]) -> InterceptResult<()> {
        let _guard = self.shared.enable_lock.lock().await;
        let union = self.shared.union_with(self.index, patterns);
        self.shared.channel.enable(&union).await?;
        self.shared.routes()[self.index].patterns = patterns.to_vec();
        Ok(())
    }

    async fn paused_requests(&self) -> InterceptResult<PausedRequestStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.routes()[self.index].sender = Some(tx);
        if let Err(e) = self.shared.start_routing().await {
            self.shared.routes()[self.index].sender = None;
            return Err(e);
        }
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn continue_request(&self, request_id: &str) -> InterceptResult<()> {
        self.shared.channel.continue_request(request_id).await
    }

    async fn fail_request(&self, request_id: &str, reason: ErrorReason) -> InterceptResult<()> {
        self.shared.channel.fail_request(request_id, reason).await
    }

    async fn fulfill_request(&self, params: FulfillRequest) -> InterceptResult<()> {
        self.shared.channel.fulfill_request(params).await
    }

    async fn get_response_body(&self, request_id: &str) -> InterceptResult<ResponseBody> {
        self.shared.channel.get_response_body(request_id).await
    }
}
