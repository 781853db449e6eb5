use std::time::Duration;

use axum::{
    extract::RawQuery,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use url::form_urlencoded;

pub fn app() -> Router {
    Router::new()
        .route("/ajax", any(ajax))
        .route("/echo", post(echo))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Query flags understood by `/ajax`.
#[derive(Debug, Default)]
struct Flags {
    error: bool,
    json: bool,
    invalid: bool,
    headers: bool,
    cookies: bool,
    delay_ms: u64,
    q: Option<String>,
}

impl Flags {
    fn parse(query: &str) -> Self {
        let mut flags = Flags::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                "error" => flags.error = true,
                "json" => flags.json = true,
                "invalid" => flags.invalid = true,
                "headers" => flags.headers = true,
                "cookies" => flags.cookies = true,
                "delay" => flags.delay_ms = value.parse().unwrap_or(0),
                "q" => flags.q = Some(value.into_owned()),
                _ => {}
            }
        }
        flags
    }
}

/// Echo endpoint. The query string picks the behavior:
/// `error` → 404, `json` (+ `invalid`) → JSON summary, `headers` → received
/// `X-*` headers, `cookies` → received cookies, otherwise a text summary of
/// method, query and the `q` field from query and form body.
async fn ajax(
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    let query = query.unwrap_or_default();
    let flags = Flags::parse(&query);
    tracing::debug!(%method, %query, "ajax request");

    if flags.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(flags.delay_ms)).await;
    }

    let post_q = form_urlencoded::parse(body.as_bytes())
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned());

    if flags.error {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    if flags.json {
        let summary = Value::Array(vec![
            Value::from(method.as_str()),
            Value::from(query.as_str()),
            flags.q.map_or(Value::Null, Value::from),
            post_q.map_or(Value::Null, Value::from),
        ]);
        let prefix = if flags.invalid { "{" } else { "" };
        return (
            [(header::CONTENT_TYPE, "application/json; charset=UTF-8")],
            format!("{prefix}{summary}"),
        )
            .into_response();
    }

    if flags.headers {
        let lines: String = headers
            .iter()
            .filter(|(name, _)| name.as_str().starts_with("x-"))
            .map(|(name, value)| format!("{}: {}\n", name, value.to_str().unwrap_or_default()))
            .collect();
        return lines.into_response();
    }

    if flags.cookies {
        let lines: String = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(name, value)| {
                format!("{name}: {}\n", percent_decode_str(value).decode_utf8_lossy())
            })
            .collect();
        return lines.into_response();
    }

    format!(
        "{method} {query}\nGET[q]: {}\nPOST[q]: {}",
        flags.q.as_deref().unwrap_or("-"),
        post_q.as_deref().unwrap_or("-"),
    )
    .into_response()
}

/// Decode a bracket-notation form body and return it as JSON.
async fn echo(body: String) -> Json<Value> {
    Json(decode_nested_form(&body))
}

/// Rebuild the nested structure behind `a[b][0]=c` style form pairs.
///
/// Every leaf becomes a string. A map whose keys are exactly `0..n` in order
/// becomes an array.
pub fn decode_nested_form(body: &str) -> Value {
    let mut root = Map::new();
    for (key, value) in form_urlencoded::parse(body.as_bytes()) {
        let segments = key_segments(&key);
        insert(&mut root, &segments, value.into_owned());
    }
    collapse(Value::Object(root))
}

fn key_segments(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            break;
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    segments
}

fn insert(map: &mut Map<String, Value>, segments: &[String], value: String) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(first.clone(), Value::String(value));
        return;
    }
    let child = map
        .entry(first.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(child) = child {
        insert(child, rest, value);
    }
}

fn collapse(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let is_sequence = !map.is_empty()
        && map
            .keys()
            .enumerate()
            .all(|(index, key)| *key == index.to_string());
    if is_sequence {
        Value::Array(map.into_iter().map(|(_, item)| collapse(item)).collect())
    } else {
        Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, collapse(item)))
                .collect(),
        )
    }
}
