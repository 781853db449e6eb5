//! Chainable request controller and bracket-notation query encoder.
//!
//! # Overview
//! `RequestController` wraps an XMLHttpRequest-style `Transport` supplied by
//! the host and gives it a chainable configuration API, one completion
//! strategy at a time (`on_change`, `on_ready`, `on_outcome` or `future`),
//! and a fixed error classification. `query::encode` flattens nested JSON
//! values into `a[b][0]=c` pairs for form-encoded bodies.
//!
//! # Design
//! - The host does the I/O. The transport queues readiness notifications
//!   and the controller delivers them; nothing here blocks or spawns.
//! - Request failures are data (`ErrorState`), not errors. `send` only fails
//!   on an empty url.
//! - `ScriptedTransport` is a deterministic transport for hosts and tests.

pub mod completion;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod http;
pub mod query;
pub mod request;
pub mod scripted;
pub mod transport;

pub use completion::Completion;
pub use config::Config;
pub use dispatch::{Handler, Outcome};
pub use error::{Error, ErrorState};
pub use headers::ResponseHeaders;
pub use http::{Body, Credentials, ReadyState, ResponseBody, ResponseFormat};
pub use query::{encode, encode_query, encode_serialize};
pub use request::RequestController;
pub use scripted::{RecordedRequest, Script, ScriptedTransport};
pub use transport::{Transport, TransportEvent};
