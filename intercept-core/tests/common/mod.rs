//! In-memory page used by the integration tests.
//!
//! A [`FakePage`] behaves like a real page target: it has one active pattern
//! set (the last `Fetch.enable` wins) and every subscriber receives every
//! paused event. Registrations are kept apart by a [`SessionMux`] on top of
//! it, exactly as with a chromiumoxide page. The first terminal command per
//! request wins; later ones fail the way the real browser rejects an unknown
//! interception id.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use futures::StreamExt;
use intercept_core::session::PausedRequestStream;
use intercept_core::{
    ErrorReason, FetchSession, FulfillRequest, HeaderEntry, InterceptError, InterceptResult,
    InterceptedRequest, PausedRequest, RequestPattern, ResourceType, ResponseBody, SessionMux,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Enable(Vec<RequestPattern>),
    Continue(String),
    Fail(String, ErrorReason),
    Fulfill(FulfillRequest),
    GetBody(String),
}

impl Command {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Continue(_) | Command::Fail(..) | Command::Fulfill(_))
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Command::Enable(_) => None,
            Command::Continue(id) | Command::Fail(id, _) | Command::GetBody(id) => Some(id),
            Command::Fulfill(params) => Some(&params.request_id),
        }
    }
}

#[derive(Default)]
struct PageState {
    commands: Vec<Command>,
    /// Pattern set of the most recent `Fetch.enable`
    patterns: Vec<RequestPattern>,
    listeners: Vec<mpsc::UnboundedSender<PausedRequest>>,
    /// Requests still waiting for a terminal command, with their body
    pending: HashMap<String, Option<ResponseBody>>,
    /// Terminal command that resolved each request
    resolved: HashMap<String, Command>,
    failing: HashSet<&'static str>,
}

#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<PageState>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration point over this page
    pub fn interceptor(&self) -> SessionMux<FakePage> {
        SessionMux::new(self.clone())
    }

    /// Make every call of `command` fail ("enable", "continueRequest", ...)
    pub fn fail_command(&self, command: &'static str) {
        self.state.lock().unwrap().failing.insert(command);
    }

    /// Pause `event` if the active pattern set covers it and deliver it to
    /// every listener. Returns whether the page paused it.
    pub fn pause(&self, event: PausedRequest, body: Option<ResponseBody>) -> bool {
        let covered = self.state.lock().unwrap().patterns.iter().any(|p| p.matches(&event));
        if covered {
            self.deliver(event, body);
        }
        covered
    }

    /// Pause `event` whatever the active patterns are, like a request paused
    /// under an earlier pattern set
    pub fn deliver(&self, event: PausedRequest, body: Option<ResponseBody>) {
        let mut state = self.state.lock().unwrap();
        state.pending.insert(event.request_id.clone(), body);
        state.listeners.retain(|listener| listener.send(event.clone()).is_ok());
    }

    /// Track `event` as paused without delivering it to any listener
    pub fn hold(&self, event: &PausedRequest, body: Option<ResponseBody>) {
        self.state.lock().unwrap().pending.insert(event.request_id.clone(), body);
    }

    /// Close every subscription
    pub fn close(&self) {
        self.state.lock().unwrap().listeners.clear();
    }

    pub fn listeners(&self) -> usize {
        self.state.lock().unwrap().listeners.len()
    }

    pub fn active_patterns(&self) -> Vec<RequestPattern> {
        self.state.lock().unwrap().patterns.clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn commands_for(&self, request_id: &str) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|c| c.request_id() == Some(request_id))
            .collect()
    }

    pub fn terminal_commands_for(&self, request_id: &str) -> Vec<Command> {
        self.commands_for(request_id)
            .into_iter()
            .filter(Command::is_terminal)
            .collect()
    }

    pub fn resolution(&self, request_id: &str) -> Option<Command> {
        self.state.lock().unwrap().resolved.get(request_id).cloned()
    }

    /// Wait until `count` terminal commands were sent for `request_id`
    pub async fn wait_for_terminal(&self, request_id: &str, count: usize) -> Vec<Command> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let commands = self.terminal_commands_for(request_id);
            if commands.len() >= count {
                return commands;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("request {} got {} terminal commands, expected {}", request_id, commands.len(), count);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// What the page ends up receiving for `request_id`: `None` when the
    /// request failed, the fulfilled body, or the original body.
    pub fn delivered_body(&self, request_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        match state.resolved.get(request_id)? {
            Command::Fail(..) => None,
            Command::Fulfill(params) => {
                let body = params.body.as_deref().unwrap_or_default();
                Some(String::from_utf8(STANDARD.decode(body).unwrap()).unwrap())
            }
            Command::Continue(_) => {
                // Continued requests keep their body, which the engine may have consumed
                let body = state.pending.get(request_id).cloned().flatten();
                body.map(|b| decode(&b))
            }
            _ => None,
        }
    }

    fn record(&self, command: Command) -> InterceptResult<()> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.clone());

        let name = match &command {
            Command::Enable(_) => "enable",
            Command::Continue(_) => "continueRequest",
            Command::Fail(..) => "failRequest",
            Command::Fulfill(_) => "fulfillRequest",
            Command::GetBody(_) => "getResponseBody",
        };
        if state.failing.contains(name) {
            return Err(InterceptError::protocol(format!("Fetch.{}", name), "injected failure"));
        }

        match command {
            Command::Enable(patterns) => state.patterns = patterns,
            command if command.is_terminal() => {
                let id = command.request_id().unwrap_or_default().to_string();
                if !state.pending.contains_key(&id) || state.resolved.contains_key(&id) {
                    return Err(InterceptError::protocol(format!("Fetch.{}", name), "Invalid InterceptionId."));
                }
                state.resolved.insert(id, command);
            }
            _ => {}
        }
        Ok(())
    }
}

fn decode(body: &ResponseBody) -> String {
    if body.base64_encoded {
        String::from_utf8(STANDARD.decode(&body.body).unwrap()).unwrap()
    } else {
        body.body.clone()
    }
}

#[async_trait]
impl FetchSession for FakePage {
    async fn enable(&self, patterns: &[RequestPattern]) -> InterceptResult<()> {
        self.record(Command::Enable(patterns.to_vec()))
    }

    async fn paused_requests(&self) -> InterceptResult<PausedRequestStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().listeners.push(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn continue_request(&self, request_id: &str) -> InterceptResult<()> {
        self.record(Command::Continue(request_id.to_string()))
    }

    async fn fail_request(&self, request_id: &str, reason: ErrorReason) -> InterceptResult<()> {
        self.record(Command::Fail(request_id.to_string(), reason))
    }

    async fn fulfill_request(&self, params: FulfillRequest) -> InterceptResult<()> {
        self.record(Command::Fulfill(params))
    }

    async fn get_response_body(&self, request_id: &str) -> InterceptResult<ResponseBody> {
        self.record(Command::GetBody(request_id.to_string()))?;
        let state = self.state.lock().unwrap();
        state
            .pending
            .get(request_id)
            .cloned()
            .flatten()
            .ok_or_else(|| InterceptError::protocol("Fetch.getResponseBody", "No resource with given identifier found"))
    }
}

/// Paused at the request stage
pub fn request_event(id: &str, url: &str, resource_type: ResourceType) -> PausedRequest {
    PausedRequest {
        request_id: id.to_string(),
        request: InterceptedRequest {
            url: url.to_string(),
            method: "GET".to_string(),
            ..Default::default()
        },
        resource_type: Some(resource_type),
        ..Default::default()
    }
}

/// Paused at the response stage with `status`
pub fn response_event(id: &str, url: &str, resource_type: ResourceType, status: i64) -> PausedRequest {
    PausedRequest {
        response_status_code: Some(status),
        response_headers: Some(vec![HeaderEntry::new("Content-Type", "application/javascript")]),
        ..request_event(id, url, resource_type)
    }
}

pub fn base64_body(text: &str) -> ResponseBody {
    ResponseBody {
        body: STANDARD.encode(text),
        base64_encoded: true,
    }
}
