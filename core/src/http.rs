//! Plain data types shared by the controller and transports.
//!
//! # Design
//! Everything here is owned data with no behavior beyond conversions, so a
//! host can implement `Transport` on top of any HTTP stack without pulling in
//! the controller.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::Error;

/// Progress of one request cycle as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReadyState {
    #[default]
    Unsent,
    Opened,
    HeadersReceived,
    Loading,
    Done,
}

impl ReadyState {
    pub fn code(self) -> u8 {
        match self {
            ReadyState::Unsent => 0,
            ReadyState::Opened => 1,
            ReadyState::HeadersReceived => 2,
            ReadyState::Loading => 3,
            ReadyState::Done => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ReadyState::Unsent),
            1 => Some(ReadyState::Opened),
            2 => Some(ReadyState::HeadersReceived),
            3 => Some(ReadyState::Loading),
            4 => Some(ReadyState::Done),
            _ => None,
        }
    }
}

/// How the transport should decode the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseFormat {
    /// Plain text; also selected by the empty name.
    #[default]
    Text,
    ArrayBuffer,
    Blob,
    Document,
    Json,
}

impl ResponseFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseFormat::Text => "text",
            ResponseFormat::ArrayBuffer => "arraybuffer",
            ResponseFormat::Blob => "blob",
            ResponseFormat::Document => "document",
            ResponseFormat::Json => "json",
        }
    }

    pub fn is_text(self) -> bool {
        self == ResponseFormat::Text
    }
}

impl FromStr for ResponseFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "text" => Ok(ResponseFormat::Text),
            "arraybuffer" => Ok(ResponseFormat::ArrayBuffer),
            "blob" => Ok(ResponseFormat::Blob),
            "document" => Ok(ResponseFormat::Document),
            "json" => Ok(ResponseFormat::Json),
            other => Err(Error::UnknownResponseFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Bytes(Vec<u8>),
    Document(String),
    Json(Value),
}

impl ResponseBody {
    /// Decode raw bytes according to `format`.
    ///
    /// Returns `None` when the bytes cannot be represented in that format:
    /// invalid JSON, or a document that is not markup.
    pub fn decode(format: ResponseFormat, raw: &[u8]) -> Option<Self> {
        match format {
            ResponseFormat::Text => Some(ResponseBody::Text(
                String::from_utf8_lossy(raw).into_owned(),
            )),
            ResponseFormat::ArrayBuffer | ResponseFormat::Blob => {
                Some(ResponseBody::Bytes(raw.to_vec()))
            }
            ResponseFormat::Document => std::str::from_utf8(raw)
                .ok()
                .filter(|text| text.trim_start().starts_with('<'))
                .map(|text| ResponseBody::Document(text.to_string())),
            ResponseFormat::Json => serde_json::from_slice(raw).ok().map(ResponseBody::Json),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) | ResponseBody::Document(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseBody::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// A request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    /// An empty body counts as no body at all when sending.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Text(text) => text.is_empty(),
            Body::Bytes(bytes) => bytes.is_empty(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Bytes(bytes) => bytes,
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

/// HTTP authentication passed to `Transport::open`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user_name: Option<String>,
    pub password: Option<String>,
}
