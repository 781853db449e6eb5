//! Controller defaults and their environment overrides.

/// Environment variable holding the url used when a request has none.
pub const DEFAULT_URL_ENV_VAR: &str = "XHRLESS_DEFAULT_URL";

/// Environment variable holding the default timeout in milliseconds.
pub const TIMEOUT_ENV_VAR: &str = "XHRLESS_TIMEOUT_MS";

/// Defaults applied by `RequestController::with_config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Url to fall back to when `strict_url` is off and the request url is
    /// empty.
    pub default_url: Option<String>,

    /// Initial transport timeout, 0 for none.
    pub timeout_ms: u64,

    /// Reject an empty url at send time even if `default_url` is set.
    pub strict_url: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_url: None,
            timeout_ms: 0,
            strict_url: true,
        }
    }
}

impl Config {
    /// Relaxed config that sends to `default_url` when no url is given.
    pub fn relaxed(default_url: &str) -> Self {
        Self {
            default_url: Some(default_url.to_string()),
            strict_url: false,
            ..Self::default()
        }
    }

    /// Build a config from the environment. A default url switches to
    /// relaxed mode; an unparsable timeout is ignored.
    pub fn from_env() -> Self {
        let default_url = std::env::var_os(DEFAULT_URL_ENV_VAR)
            .and_then(|val| val.into_string().ok())
            .filter(|url| !url.is_empty());
        let timeout_ms = std::env::var(TIMEOUT_ENV_VAR)
            .ok()
            .and_then(|val| val.trim().parse().ok())
            .unwrap_or(0);
        Self {
            strict_url: default_url.is_none(),
            default_url,
            timeout_ms,
        }
    }
}
