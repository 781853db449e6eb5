//! The transport contract the controller drives.
//!
//! # Design
//! The host supplies the transport and keeps doing the I/O; the controller
//! only calls `open`/`set_request_header`/`send`/`abort` and reads state back.
//! Readiness and timeout notifications are queued by the transport and pulled
//! with `next_event`, which keeps the controller the single owner of its
//! handlers instead of having the transport call back into it.
//!
//! Readbacks (`ready_state`, `status`, `response`, headers) must describe the
//! most recent notification handed out by `next_event`, not a later one still
//! queued. A transport that finishes its I/O inside `send` therefore holds
//! the result back and applies it one step per `next_event`; an asynchronous
//! one queues steps as they happen and the host calls
//! `RequestController::process_events`.

use crate::http::{Body, ReadyState, ResponseBody, ResponseFormat};

/// A notification queued by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The readiness state changed to the given value.
    ReadyStateChange(ReadyState),

    /// The configured timeout elapsed before the request completed.
    Timeout,
}

/// An XMLHttpRequest-style transport handle.
///
/// Network failures are not errors here: a failed cycle reaches
/// `ReadyState::Done` with status 0. `abort` on a cycle whose `Done` has not
/// been handed out drops anything still pending and queues a single failed
/// `ReadyStateChange(Done)`.
pub trait Transport {
    fn open(
        &mut self,
        method: &str,
        url: &str,
        asynchronous: bool,
        user_name: Option<&str>,
        password: Option<&str>,
    );

    fn set_request_header(&mut self, name: &str, value: &str);

    fn send(&mut self, body: Option<&Body>);

    fn abort(&mut self);

    /// The state of the last `ReadyStateChange` handed out.
    fn ready_state(&self) -> ReadyState;

    /// HTTP status code, 0 until headers arrive or when the cycle failed.
    fn status(&self) -> u16;

    /// The decoded body, `None` when absent or not decodable as the current
    /// response format.
    fn response(&self) -> Option<&ResponseBody>;

    /// The body as text; only available for `ResponseFormat::Text`.
    fn response_text(&self) -> Option<&str>;

    /// All response headers as CRLF-terminated `Name: value` lines.
    fn all_response_headers(&self) -> String;

    fn response_header(&self, name: &str) -> Option<String>;

    fn response_format(&self) -> ResponseFormat;

    fn set_response_format(&mut self, format: ResponseFormat);

    /// Timeout in milliseconds, 0 for none.
    fn timeout(&self) -> u64;

    fn set_timeout(&mut self, ms: u64);

    /// Pop the oldest queued notification.
    fn next_event(&mut self) -> Option<TransportEvent>;
}
