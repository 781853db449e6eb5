//! A deterministic in-memory transport.
//!
//! # Design
//! `ScriptedTransport` plays back canned outcomes instead of touching the
//! network. Each `send` consumes the next queued `Script`; with none queued
//! the cycle stalls at `Opened` until the host calls `complete`. Every
//! request the transport saw is recorded so callers can assert on the exact
//! method, url, credentials, headers and body that went out.
//!
//! A script is planned as a queue of steps and each `next_event` applies one
//! of them, so status, headers and body only change when the matching
//! readiness notification is handed out. `abort` drops whatever is still
//! pending and plans a single failed `Done`.

use std::collections::VecDeque;

use crate::http::{Body, ReadyState, ResponseBody, ResponseFormat};
use crate::transport::{Transport, TransportEvent};

/// The outcome of one request cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Walk through every readiness state and finish with this response.
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },

    /// Finish with status 0 and no response.
    NetworkError,

    /// Time out: status 0, `Done`, then a `Timeout` notification. Without a
    /// configured timeout the cycle stalls instead.
    TimeOut,

    /// Stay at `Opened` until `complete` or `abort`.
    Stall,
}

impl Script {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Script::Respond {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a response header; no-op on anything but `Respond`.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Script::Respond { headers, .. } = &mut self {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }
}

/// A request as the transport received it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub asynchronous: bool,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
}

/// One pending change, applied when its notification is popped.
#[derive(Debug)]
enum Step {
    Open,
    Headers {
        status: u16,
        headers: Vec<(String, String)>,
    },
    Loading,
    Done {
        body: Vec<u8>,
    },
    Fail,
    Timeout,
}

impl Step {
    fn is_terminal(&self) -> bool {
        matches!(self, Step::Done { .. } | Step::Fail)
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: VecDeque<Script>,
    requests: Vec<RecordedRequest>,
    opened: Option<RecordedRequest>,
    in_flight: bool,
    state: ReadyState,
    status: u16,
    response_headers: Vec<(String, String)>,
    response: Option<ResponseBody>,
    format: ResponseFormat,
    timeout: u64,
    steps: VecDeque<Step>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.scripts.push_back(script);
        self
    }

    pub fn push_script(&mut self, script: Script) {
        self.scripts.push_back(script);
    }

    /// Requests sent so far, oldest first.
    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    pub fn last_request(&self) -> Option<&RecordedRequest> {
        self.requests.last()
    }

    /// A request was sent and its `Done` has not been delivered yet.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Finish a stalled cycle with `script`. Ignored when nothing is in
    /// flight or the cycle already has an ending planned.
    pub fn complete(&mut self, script: Script) {
        if self.in_flight && !self.steps.iter().any(Step::is_terminal) {
            self.plan(script);
        }
    }

    fn plan(&mut self, script: Script) {
        match script {
            Script::Respond {
                status,
                headers,
                body,
            } => {
                self.steps.push_back(Step::Headers { status, headers });
                self.steps.push_back(Step::Loading);
                self.steps.push_back(Step::Done { body });
            }
            Script::NetworkError => self.steps.push_back(Step::Fail),
            Script::TimeOut => {
                if self.timeout > 0 {
                    self.steps.push_back(Step::Fail);
                    self.steps.push_back(Step::Timeout);
                }
            }
            Script::Stall => {}
        }
    }

    fn apply(&mut self, step: Step) -> TransportEvent {
        match step {
            Step::Open => self.advance(ReadyState::Opened),
            Step::Headers { status, headers } => {
                self.status = status;
                self.response_headers = headers;
                self.advance(ReadyState::HeadersReceived)
            }
            Step::Loading => self.advance(ReadyState::Loading),
            Step::Done { body } => {
                self.response = ResponseBody::decode(self.format, &body);
                self.in_flight = false;
                self.advance(ReadyState::Done)
            }
            Step::Fail => {
                self.status = 0;
                self.response_headers.clear();
                self.response = None;
                self.in_flight = false;
                self.advance(ReadyState::Done)
            }
            Step::Timeout => TransportEvent::Timeout,
        }
    }

    fn advance(&mut self, state: ReadyState) -> TransportEvent {
        self.state = state;
        TransportEvent::ReadyStateChange(state)
    }
}

impl Transport for ScriptedTransport {
    fn open(
        &mut self,
        method: &str,
        url: &str,
        asynchronous: bool,
        user_name: Option<&str>,
        password: Option<&str>,
    ) {
        self.in_flight = false;
        self.status = 0;
        self.response_headers.clear();
        self.response = None;
        self.steps.clear();
        self.opened = Some(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            asynchronous,
            user_name: user_name.map(str::to_string),
            password: password.map(str::to_string),
            headers: Vec::new(),
            body: None,
        });
        self.steps.push_back(Step::Open);
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        if let Some(request) = self.opened.as_mut() {
            request.headers.push((name.to_string(), value.to_string()));
        }
    }

    fn send(&mut self, body: Option<&Body>) {
        let Some(mut request) = self.opened.take() else {
            return;
        };
        request.body = body.cloned();
        self.requests.push(request);
        self.in_flight = true;
        let script = self.scripts.pop_front().unwrap_or(Script::Stall);
        self.plan(script);
    }

    fn abort(&mut self) {
        if self.in_flight {
            self.steps.clear();
            self.steps.push_back(Step::Fail);
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.state
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn response(&self) -> Option<&ResponseBody> {
        self.response.as_ref()
    }

    fn response_text(&self) -> Option<&str> {
        if !self.format.is_text() {
            return None;
        }
        Some(self.response.as_ref().and_then(ResponseBody::as_text).unwrap_or(""))
    }

    fn all_response_headers(&self) -> String {
        self.response_headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}\r\n"))
            .collect()
    }

    fn response_header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .response_headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    fn response_format(&self) -> ResponseFormat {
        self.format
    }

    fn set_response_format(&mut self, format: ResponseFormat) {
        self.format = format;
    }

    fn timeout(&self) -> u64 {
        self.timeout
    }

    fn set_timeout(&mut self, ms: u64) {
        self.timeout = ms;
    }

    fn next_event(&mut self) -> Option<TransportEvent> {
        let step = self.steps.pop_front()?;
        Some(self.apply(step))
    }
}
