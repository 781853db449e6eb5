//! Error types for the request controller.
//!
//! # Design
//! Two layers. `ErrorState` is the classification of a finished request
//! cycle and is never raised: callers query it through
//! `RequestController::error_state`. `Error` covers the few conditions that
//! are reported through `Result`: misuse of `send` and the rejection branch
//! of the future surface.

use std::fmt;

/// Why a completed request cycle did not succeed.
///
/// Variants are listed in detection order; the first one that applies wins.
/// The integer codes are stable and match `code()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorState {
    /// No error.
    None,

    /// The transport reported no status at all: the connection failed or the
    /// cycle has not completed yet.
    Connection,

    /// The response status code is not 2XX.
    HttpStatus,

    /// Status is 2XX but the body could not be decoded as the requested
    /// response format.
    BodyType,
}

impl ErrorState {
    pub const ERR_NONE: u8 = 0;
    pub const ERR_CONNECTION: u8 = 1;
    pub const ERR_HTTPSTATUS: u8 = 2;
    pub const ERR_BODYTYPE: u8 = 3;

    pub fn code(self) -> u8 {
        match self {
            ErrorState::None => Self::ERR_NONE,
            ErrorState::Connection => Self::ERR_CONNECTION,
            ErrorState::HttpStatus => Self::ERR_HTTPSTATUS,
            ErrorState::BodyType => Self::ERR_BODYTYPE,
        }
    }

    pub fn is_error(self) -> bool {
        self != ErrorState::None
    }

    /// Human-readable message. `status` is only used by `HttpStatus`.
    pub fn message(self, status: u16) -> String {
        match self {
            ErrorState::None => "No error".to_string(),
            ErrorState::Connection => "Connection failed".to_string(),
            ErrorState::HttpStatus => format!("HTTP {status}"),
            ErrorState::BodyType => "Unexpected response body format".to_string(),
        }
    }
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorState::None => write!(f, "none"),
            ErrorState::Connection => write!(f, "connection"),
            ErrorState::HttpStatus => write!(f, "http status"),
            ErrorState::BodyType => write!(f, "body type"),
        }
    }
}

/// Errors reported through `Result` by the controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `send` was called without a url and no default url is configured.
    #[error("the request URL is empty")]
    EmptyUrl,

    /// The request completed but did not qualify as a success response.
    #[error("{}", failure_message(.state, .status))]
    Failed { state: ErrorState, status: u16 },

    /// The completion strategy backing a `Completion` was replaced or dropped
    /// before the request finished.
    #[error("completion handler was replaced before the request finished")]
    Superseded,

    /// A response format name the transport does not know.
    #[error("unknown response format: {0:?}")]
    UnknownResponseFormat(String),

    /// A value handed to the query encoder could not be represented as JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn failure_message(state: &ErrorState, status: &u16) -> String {
    state.message(*status)
}
