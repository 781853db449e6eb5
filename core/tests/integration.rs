//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the controller over
//! real HTTP through `UreqTransport`, a blocking `Transport` built on ureq.
//! The exchange finishes inside `send`; its result is handed to a
//! `ScriptedTransport`, which releases it one readiness step per
//! notification.

use std::time::Duration;

use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use xhrless_core::{
    encode_query, Body, ErrorState, Outcome, ReadyState, RecordedRequest, RequestController,
    ResponseBody, ResponseFormat, Script, ScriptedTransport, Transport, TransportEvent,
};

// ---------------------------------------------------------------------------
// Host transport
// ---------------------------------------------------------------------------

/// A `Transport` that performs the request with ureq.
///
/// Disables ureq's status-code-as-error behavior so 4xx/5xx responses reach
/// the controller as data. Credentials are not forwarded.
#[derive(Default)]
struct UreqTransport {
    steps: ScriptedTransport,
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl UreqTransport {
    fn agent(&self) -> ureq::Agent {
        let timeout = self.steps.timeout();
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global((timeout > 0).then(|| Duration::from_millis(timeout)))
            .build()
            .new_agent()
    }

    fn exchange(&self, request: &RecordedRequest) -> Script {
        let agent = self.agent();
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let result = match (request.method.as_str(), request.body.as_ref()) {
            ("GET", _) => with_headers(agent.get(url), headers).call(),
            ("HEAD", _) => with_headers(agent.head(url), headers).call(),
            ("DELETE", _) => with_headers(agent.delete(url), headers).call(),
            ("PUT", Some(body)) => with_headers(agent.put(url), headers).send(body.as_bytes()),
            ("PUT", None) => with_headers(agent.put(url), headers).send_empty(),
            (_, Some(body)) => with_headers(agent.post(url), headers).send(body.as_bytes()),
            (_, None) => with_headers(agent.post(url), headers).send_empty(),
        };

        let mut response = match result {
            Ok(response) => response,
            Err(ureq::Error::Timeout(_)) => return Script::TimeOut,
            Err(_) => return Script::NetworkError,
        };
        let status = response.status().as_u16();
        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        match response.body_mut().read_to_vec() {
            Ok(body) => Script::Respond {
                status,
                headers: response_headers,
                body,
            },
            Err(ureq::Error::Timeout(_)) => Script::TimeOut,
            Err(_) => Script::NetworkError,
        }
    }
}

impl Transport for UreqTransport {
    fn open(
        &mut self,
        method: &str,
        url: &str,
        asynchronous: bool,
        user_name: Option<&str>,
        password: Option<&str>,
    ) {
        self.steps.open(method, url, asynchronous, user_name, password);
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        self.steps.set_request_header(name, value);
    }

    fn send(&mut self, body: Option<&Body>) {
        self.steps.send(body);
        let Some(request) = self.steps.last_request().cloned() else {
            return;
        };
        let script = self.exchange(&request);
        self.steps.complete(script);
    }

    fn abort(&mut self) {
        self.steps.abort();
    }

    fn ready_state(&self) -> ReadyState {
        self.steps.ready_state()
    }

    fn status(&self) -> u16 {
        self.steps.status()
    }

    fn response(&self) -> Option<&ResponseBody> {
        self.steps.response()
    }

    fn response_text(&self) -> Option<&str> {
        self.steps.response_text()
    }

    fn all_response_headers(&self) -> String {
        self.steps.all_response_headers()
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.steps.response_header(name)
    }

    fn response_format(&self) -> ResponseFormat {
        self.steps.response_format()
    }

    fn set_response_format(&mut self, format: ResponseFormat) {
        self.steps.set_response_format(format);
    }

    fn timeout(&self) -> u64 {
        self.steps.timeout()
    }

    fn set_timeout(&mut self, ms: u64) {
        self.steps.set_timeout(ms);
    }

    fn next_event(&mut self) -> Option<TransportEvent> {
        self.steps.next_event()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

/// Start the mock server on a random port and return its base url.
fn start_server() -> String {
    init_tracing();
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn controller(url: &str) -> RequestController<UreqTransport> {
    RequestController::with_url(UreqTransport::default(), url, None, None)
}

fn text(ctl: &RequestController<UreqTransport>) -> String {
    ctl.response_text().unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn get_with_outcome_reaches_success_handler() {
    let base = start_server();
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let (ok, failed) = (seen.clone(), seen.clone());

    let mut ctl = controller(&format!("{base}/ajax?q=7"));
    ctl.on_outcome(
        Outcome::new()
            .success(move |x| ok.borrow_mut().push(format!("ok {}", text(x))))
            .error(move |x| failed.borrow_mut().push(format!("error {}", x.error_message()))),
    );
    ctl.send(None).unwrap();

    assert_eq!(
        seen.borrow().as_slice(),
        ["ok GET q=7\nGET[q]: 7\nPOST[q]: -"]
    );
}

#[test]
fn post_body_and_override() {
    let base = start_server();
    let url = format!("{base}/ajax");

    let mut ctl = controller(&url);
    ctl.reset(&url, Some(Body::from("q=1234")), None)
        .set_form_content_type()
        .send(None)
        .unwrap();
    assert_eq!(text(&ctl), "POST \nGET[q]: -\nPOST[q]: 1234");

    ctl.send(Some(Body::from("q=5678"))).unwrap();
    assert_eq!(text(&ctl), "POST \nGET[q]: -\nPOST[q]: 5678");
}

#[test]
fn load_query_posts_encoded_form() {
    let base = start_server();
    let mut ctl = controller(&format!("{base}/ajax"));
    ctl.load_query(&json!({"q": 4567})).send(None).unwrap();
    assert!(ctl.is_success_response());
    assert_eq!(text(&ctl), "POST \nGET[q]: -\nPOST[q]: 4567");
}

#[test]
fn custom_method() {
    let base = start_server();
    let url = format!("{base}/ajax?q=1");
    let mut ctl = controller(&url);
    ctl.reset(&url, Some(Body::from("q=2")), Some("PUT"))
        .set_form_content_type()
        .send(None)
        .unwrap();
    assert_eq!(text(&ctl), "PUT q=1\nGET[q]: 1\nPOST[q]: 2");
}

#[test]
fn not_found_is_http_status() {
    let base = start_server();
    let mut ctl = controller(&format!("{base}/ajax?error"));
    ctl.send(None).unwrap();
    assert!(ctl.is_completed());
    assert_eq!(ctl.status(), 404);
    assert_eq!(ctl.error_state(), ErrorState::HttpStatus);
    assert_eq!(ctl.error_message(), "HTTP 404");
}

#[test]
fn json_format_valid_and_invalid() {
    let base = start_server();

    let mut ctl = controller(&format!("{base}/ajax?q=3&json"));
    ctl.set_response_format(ResponseFormat::Json).send(None).unwrap();
    assert_eq!(ctl.error_state(), ErrorState::None);
    assert_eq!(
        ctl.response().and_then(ResponseBody::as_json),
        Some(&json!(["GET", "q=3&json", "3", null]))
    );
    assert!(ctl.response_text().is_none());
    assert!(ctl
        .response_header("content-type")
        .unwrap()
        .starts_with("application/json"));

    let mut ctl = controller(&format!("{base}/ajax?json&invalid"));
    ctl.set_response_format(ResponseFormat::Json).send(None).unwrap();
    assert!(ctl.is_status_ok());
    assert_eq!(ctl.error_state(), ErrorState::BodyType);
}

#[test]
fn headers_reach_server() {
    let base = start_server();
    let mut ctl = controller(&format!("{base}/ajax?headers"));
    ctl.set_headers([("X-One", "1"), ("X-Two", ""), ("X-Three", "3")])
        .send(None)
        .unwrap();
    let body = text(&ctl);
    assert!(body.contains("x-one: 1\n"));
    assert!(body.contains("x-three: 3\n"));
    assert!(!body.contains("x-two"));
}

#[test]
fn cookies_reach_server() {
    let base = start_server();
    let mut ctl = controller(&format!("{base}/ajax?cookies"));
    ctl.set_cookie("C-One", "1")
        .set_cookie("C-Two", "")
        .set_cookie("C-Three", "3 4")
        .send(None)
        .unwrap();
    assert_eq!(text(&ctl), "C-One: 1\nC-Three: 3 4\n");
}

#[test]
fn response_headers_map_groups_values() {
    let base = start_server();
    let mut ctl = controller(&format!("{base}/ajax?json"));
    ctl.send(None).unwrap();
    let headers = ctl.response_headers_map();
    assert_eq!(
        headers.get("content-type").unwrap(),
        ["application/json; charset=UTF-8"]
    );
    assert!(ctl.response_headers().contains("content-type: application/json"));
}

#[test]
fn query_round_trips_through_nested_form_decoder() {
    let base = start_server();
    let original = json!({
        "a0": "A0", "a1": "A 1",
        "b": ["B0", "B1"],
        "c": {"c0": "C0", "c1": "C1"},
        "d": [["D00", "D01"], ["D10", "D11"]],
        "e": {"e0": {"e00": "E00"}, "e1": {"e10": "E10"}},
        "f": [{"f00": 0}, {"f10": true}],
        "g": {"g0": ["G&0"], "g1": {"g10": "G=10"}}
    });

    let mut ctl = controller(&format!("{base}/echo"));
    ctl.set_form_content_type()
        .set_response_format(ResponseFormat::Json)
        .send(Some(Body::from(encode_query(&original))))
        .unwrap();

    assert!(ctl.is_success_response(), "{}", ctl.error_message());
    let decoded = ctl.response().and_then(ResponseBody::as_json).unwrap();
    assert_eq!(decoded, &stringify_leaves(&original));
}

fn stringify_leaves(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(stringify_leaves).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), stringify_leaves(item)))
                .collect(),
        ),
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

#[test]
fn timeout_fires_timeout_handler() {
    let base = start_server();
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let (timed_out, ready) = (seen.clone(), seen.clone());

    let mut ctl = controller(&format!("{base}/ajax?delay=1000"));
    ctl.set_timeout(Some(100))
        .on_timeout(move |x| timed_out.borrow_mut().push(format!("timeout {}", x.timeout())))
        .on_ready(move |x| ready.borrow_mut().push(format!("ready {}", x.status())));
    ctl.send(None).unwrap();

    assert_eq!(seen.borrow().as_slice(), ["ready 0", "timeout 100"]);
    assert_eq!(ctl.error_state(), ErrorState::Connection);
}

#[test]
fn refused_connection_is_connection_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut ctl = controller(&format!("http://127.0.0.1:{port}/ajax"));
    ctl.send(None).unwrap();
    assert!(ctl.is_completed());
    assert_eq!(ctl.error_state(), ErrorState::Connection);
    assert_eq!(ctl.error_message(), "Connection failed");
}

#[tokio::test]
async fn future_resolves_and_rejects() {
    let base = start_server();

    let mut ctl = controller(&format!("{base}/ajax?q=9"));
    let status = ctl.future(None).unwrap().await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(text(&ctl), "GET q=9\nGET[q]: 9\nPOST[q]: -");

    let mut ctl = controller(&format!("{base}/ajax?error"));
    let err = ctl.future(None).unwrap().await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 404");
}
