//! Chainable request controller over a host-supplied transport.
//!
//! # Design
//! `RequestController` owns its transport and the request configuration
//! (url, method, body, headers, credentials, aux data). Configuration
//! methods return `&mut Self` so calls chain; `send` returns a `Result`
//! because an empty url is the one misuse it reports.
//!
//! Notifications are pulled from the transport and handed to the single
//! installed `Dispatcher`. While a handler runs the dispatcher is taken out
//! of its slot, so the handler gets `&mut RequestController` and may abort,
//! reconfigure or rebind. A rebind bumps `generation`; the running
//! dispatcher is then dropped rather than put back. Nested drains (an
//! `abort` from inside a handler) return immediately and the outer loop
//! delivers what they queued.
//!
//! State queries read the transport directly. Transports only move to a
//! readiness state when they hand out its notification, so a handler always
//! sees the status and body that belong to the state it was called for.

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::completion::Completion;
use crate::config::Config;
use crate::dispatch::{Dispatcher, Handler, Outcome};
use crate::error::{Error, ErrorState};
use crate::headers::ResponseHeaders;
use crate::http::{Body, Credentials, ReadyState, ResponseBody, ResponseFormat};
use crate::query::{self, encode_component};
use crate::transport::{Transport, TransportEvent};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const COOKIE: &str = "Cookie";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub struct RequestController<T> {
    id: Uuid,
    transport: T,
    url: String,
    method: String,
    body: Option<Body>,
    headers: Vec<(String, String)>,
    aux_data: Map<String, Value>,
    credentials: Option<Credentials>,
    default_url: Option<String>,
    strict_url: bool,
    dispatcher: Option<Dispatcher<T>>,
    generation: u64,
    timeout_handler: Option<Handler<T>>,
    timeout_generation: u64,
    timeout_fired: bool,
    dispatching: bool,
}

impl<T: Transport> RequestController<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &Config::default())
    }

    pub fn with_config(mut transport: T, config: &Config) -> Self {
        transport.set_timeout(config.timeout_ms);
        Self {
            id: Uuid::new_v4(),
            transport,
            url: String::new(),
            method: String::new(),
            body: None,
            headers: Vec::new(),
            aux_data: Map::new(),
            credentials: None,
            default_url: config.default_url.clone(),
            strict_url: config.strict_url,
            dispatcher: None,
            generation: 0,
            timeout_handler: None,
            timeout_generation: 0,
            timeout_fired: false,
            dispatching: false,
        }
    }

    /// Shorthand for `new` followed by `reset`.
    pub fn with_url(transport: T, url: &str, body: Option<Body>, method: Option<&str>) -> Self {
        let mut ctl = Self::new(transport);
        ctl.reset(url, body, method);
        ctl
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Replace url, body and method. Headers, aux data and credentials are
    /// kept.
    pub fn reset(&mut self, url: &str, body: Option<Body>, method: Option<&str>) -> &mut Self {
        self.url = url.to_string();
        self.body = body.filter(|body| !body.is_empty());
        self.method = method.unwrap_or_default().to_string();
        self
    }

    /// Set or clear HTTP authentication.
    pub fn http_auth(&mut self, user_name: Option<&str>, password: Option<&str>) -> &mut Self {
        self.credentials = if user_name.is_none() && password.is_none() {
            None
        } else {
            Some(Credentials {
                user_name: user_name.map(str::to_string),
                password: password.map(str::to_string),
            })
        };
        self
    }

    /// Set the timeout in milliseconds. `None` or 0 disables it.
    pub fn set_timeout(&mut self, ms: Option<u64>) -> &mut Self {
        self.transport.set_timeout(ms.unwrap_or(0));
        self
    }

    /// Attach (or with `None`, detach) an arbitrary value that handlers can
    /// read back through `aux_data`. Empty names are ignored.
    pub fn set_aux_data(&mut self, name: &str, value: Option<Value>) -> &mut Self {
        if name.is_empty() {
            return self;
        }
        match value {
            Some(value) => {
                self.aux_data.insert(name.to_string(), value);
            }
            None => {
                self.aux_data.shift_remove(name);
            }
        }
        self
    }

    /// Set a request header. An absent or empty value removes it; empty
    /// names are ignored.
    pub fn set_header(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        if name.is_empty() {
            return self;
        }
        match value.filter(|value| !value.is_empty()) {
            Some(value) => match self.headers.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => self.headers.push((name.to_string(), value.to_string())),
            },
            None => self.headers.retain(|(key, _)| key != name),
        }
        self
    }

    /// Replace every request header with the non-empty pairs of `headers`.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.headers.clear();
        for (name, value) in headers {
            let value = value.as_ref();
            if !value.is_empty() {
                self.set_header(name.as_ref(), Some(value));
            }
        }
        self
    }

    pub fn clear_headers(&mut self) -> &mut Self {
        self.headers.clear();
        self
    }

    /// Append `name=value` to the `Cookie` header. Both must be non-empty.
    pub fn set_cookie(&mut self, name: &str, value: &str) -> &mut Self {
        if name.is_empty() || value.is_empty() {
            return self;
        }
        let cookie = format!("{name}={}", encode_component(value));
        let combined = match self.header(COOKIE) {
            Some(existing) => format!("{existing}; {cookie}"),
            None => cookie,
        };
        self.set_header(COOKIE, Some(&combined))
    }

    /// Rebuild the `Cookie` header from the non-empty pairs of `cookies`,
    /// removing it when none qualify.
    pub fn set_cookies<I, K, V>(&mut self, cookies: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded: Vec<String> = cookies
            .into_iter()
            .filter(|(name, value)| !name.as_ref().is_empty() && !value.as_ref().is_empty())
            .map(|(name, value)| format!("{}={}", name.as_ref(), encode_component(value.as_ref())))
            .collect();
        let header = encoded.join("; ");
        self.set_header(COOKIE, Some(&header))
    }

    pub fn set_form_content_type(&mut self) -> &mut Self {
        self.set_header(CONTENT_TYPE, Some(FORM_CONTENT_TYPE))
    }

    /// Use the bracket-notation encoding of `value` as a form-encoded body.
    pub fn load_query(&mut self, value: &Value) -> &mut Self {
        let encoded = query::encode_query(value);
        self.body = Some(Body::Text(encoded)).filter(|body| !body.is_empty());
        self.set_form_content_type()
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.transport.response_format()
    }

    pub fn set_response_format(&mut self, format: ResponseFormat) -> &mut Self {
        self.transport.set_response_format(format);
        self
    }

    /// `set_response_format` by name (`""`, `"text"`, `"arraybuffer"`,
    /// `"blob"`, `"document"`, `"json"`).
    pub fn set_response_format_name(&mut self, name: &str) -> Result<&mut Self, Error> {
        let format = name.parse()?;
        Ok(self.set_response_format(format))
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn install(&mut self, dispatcher: Option<Dispatcher<T>>) {
        self.generation = self.generation.wrapping_add(1);
        trace!(
            id = %self.id,
            strategy = dispatcher.as_ref().map_or("none", Dispatcher::kind),
            "installing completion strategy"
        );
        self.dispatcher = dispatcher;
    }

    /// Call `handler` on every readiness transition.
    pub fn on_change<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&mut RequestController<T>) + 'static,
    {
        self.install(Some(Dispatcher::Change(Box::new(handler))));
        self
    }

    /// Call `handler` once per cycle, when the request completes for any
    /// reason.
    pub fn on_ready<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&mut RequestController<T>) + 'static,
    {
        self.install(Some(Dispatcher::Ready(Box::new(handler))));
        self
    }

    /// Split completion into success / error, then finally. An empty
    /// `Outcome` clears the slot.
    pub fn on_outcome(&mut self, outcome: Outcome<T>) -> &mut Self {
        if outcome.is_empty() {
            self.install(None);
        } else {
            self.install(Some(Dispatcher::Outcome(outcome)));
        }
        self
    }

    /// Remove whichever completion strategy is installed.
    pub fn clear_notifications(&mut self) -> &mut Self {
        self.install(None);
        self
    }

    pub fn has_notifications(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// Call `handler` when the transport reports a timeout. Independent of
    /// the completion strategy.
    pub fn on_timeout<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&mut RequestController<T>) + 'static,
    {
        self.timeout_generation = self.timeout_generation.wrapping_add(1);
        self.timeout_handler = Some(Box::new(handler));
        self
    }

    pub fn clear_on_timeout(&mut self) -> &mut Self {
        self.timeout_generation = self.timeout_generation.wrapping_add(1);
        self.timeout_handler = None;
        self
    }

    /// Send with a strategy that settles the returned `Completion`.
    ///
    /// `body` overrides the stored body for this send only.
    pub fn future(&mut self, body: Option<Body>) -> Result<Completion, Error> {
        let (sender, receiver) = oneshot::channel();
        self.install(Some(Dispatcher::Deferred(Some(sender))));
        self.send(body)?;
        Ok(Completion::new(receiver))
    }

    // -----------------------------------------------------------------------
    // Send / abort
    // -----------------------------------------------------------------------

    fn effective_url(&self) -> Result<String, Error> {
        if !self.url.is_empty() {
            return Ok(self.url.clone());
        }
        match self.default_url.as_deref() {
            Some(url) if !self.strict_url && !url.is_empty() => Ok(url.to_string()),
            _ => Err(Error::EmptyUrl),
        }
    }

    /// Open the transport, apply headers and send.
    ///
    /// `body` replaces the stored body for this send when non-empty. Without
    /// an explicit method, a request with a body is a POST and one without
    /// is a GET. Notifications the transport queued are delivered before
    /// returning.
    pub fn send(&mut self, body: Option<Body>) -> Result<&mut Self, Error> {
        let url = self.effective_url()?;
        let body = body
            .filter(|body| !body.is_empty())
            .or_else(|| self.body.clone());
        let method = match (self.method.as_str(), &body) {
            ("", Some(_)) => "POST",
            ("", None) => "GET",
            (method, _) => method,
        };
        debug!(id = %self.id, method, url = %url, has_body = body.is_some(), "sending request");

        let (user_name, password) = match &self.credentials {
            Some(credentials) => (
                credentials.user_name.as_deref(),
                credentials.password.as_deref(),
            ),
            None => (None, None),
        };
        self.transport.open(method, &url, true, user_name, password);
        for (name, value) in &self.headers {
            self.transport.set_request_header(name, value);
        }
        self.timeout_fired = false;
        self.transport.send(body.as_ref());

        Ok(self.process_events())
    }

    /// Abort the running cycle. The transport forces it to `Done`, which
    /// reaches the installed strategy like any other completion.
    pub fn abort(&mut self) -> &mut Self {
        debug!(id = %self.id, "aborting request");
        self.transport.abort();
        self.process_events()
    }

    /// Deliver every notification the transport has queued.
    ///
    /// `send` and `abort` call this themselves; hosts whose transport makes
    /// progress later call it when that happens.
    pub fn process_events(&mut self) -> &mut Self {
        if self.dispatching {
            return self;
        }
        self.dispatching = true;
        while let Some(event) = self.transport.next_event() {
            match event {
                TransportEvent::ReadyStateChange(state) => {
                    trace!(id = %self.id, state = state.code(), "ready state changed");
                    self.notify();
                }
                TransportEvent::Timeout => self.notify_timeout(),
            }
        }
        self.dispatching = false;
        self
    }

    fn notify(&mut self) {
        let Some(mut dispatcher) = self.dispatcher.take() else {
            return;
        };
        let generation = self.generation;
        dispatcher.dispatch(self);
        if self.generation == generation {
            self.dispatcher = Some(dispatcher);
        }
    }

    fn notify_timeout(&mut self) {
        if self.timeout_fired {
            return;
        }
        self.timeout_fired = true;
        debug!(id = %self.id, timeout_ms = self.transport.timeout(), "request timed out");
        let Some(mut handler) = self.timeout_handler.take() else {
            return;
        };
        let generation = self.timeout_generation;
        handler(self);
        if self.timeout_generation == generation {
            self.timeout_handler = Some(handler);
        }
    }

    // -----------------------------------------------------------------------
    // Status and classification
    // -----------------------------------------------------------------------

    pub fn is_completed(&self) -> bool {
        self.ready_state() == ReadyState::Done
    }

    /// Status is 2XX.
    pub fn is_status_ok(&self) -> bool {
        (200..300).contains(&self.status())
    }

    /// Status is 2XX and the body decoded as the requested format. A text
    /// response always qualifies.
    pub fn is_success_response(&self) -> bool {
        self.is_status_ok()
            && (self.response_format().is_text() || self.transport.response().is_some())
    }

    /// Why the request failed, checked in order: no status, non-2XX status,
    /// undecodable body. Only meaningful once `is_completed`.
    pub fn error_state(&self) -> ErrorState {
        if self.status() == 0 {
            ErrorState::Connection
        } else if !self.is_status_ok() {
            ErrorState::HttpStatus
        } else if !self.is_success_response() {
            ErrorState::BodyType
        } else {
            ErrorState::None
        }
    }

    /// `error_state` as a human-readable message.
    pub fn error_message(&self) -> String {
        self.error_state().message(self.status())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn aux_data(&self) -> &Map<String, Value> {
        &self.aux_data
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn timeout(&self) -> u64 {
        self.transport.timeout()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.transport.ready_state()
    }

    pub fn status(&self) -> u16 {
        self.transport.status()
    }

    pub fn response(&self) -> Option<&ResponseBody> {
        self.transport.response()
    }

    pub fn response_text(&self) -> Option<&str> {
        self.transport.response_text()
    }

    pub fn response_header(&self, name: &str) -> Option<String> {
        self.transport.response_header(name)
    }

    /// The raw CRLF-separated header block.
    pub fn response_headers(&self) -> String {
        self.transport.all_response_headers()
    }

    pub fn response_headers_map(&self) -> ResponseHeaders {
        ResponseHeaders::parse(&self.transport.all_response_headers())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
