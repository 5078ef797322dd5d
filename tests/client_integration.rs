use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use guarded_fetch::{
    execute, Body, CancellationToken, ErrorKind, FetchError, FetchOptions, Fetcher,
    FetcherDefaults, FormValue, RequestInit, Retry,
};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
enum MockBody {
    Text(&'static str),
    /// Sends the request body back.
    Echo,
}

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    content_type: &'static str,
    body: MockBody,
    delay: Duration,
}

impl MockResponse {
    fn text(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: MockBody::Text(body),
            delay: Duration::from_millis(0),
        }
    }

    fn json(status: StatusCode, body: &'static str) -> Self {
        Self {
            content_type: "application/json",
            ..Self::text(status, body)
        }
    }

    fn echo() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json",
            body: MockBody::Echo,
            delay: Duration::from_millis(0),
        }
    }

    fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct Recorded {
    method: Method,
    path: String,
    headers: HeaderMap,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    hits: Arc<AtomicUsize>,
}

async fn mock_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .recorded
        .lock()
        .expect("recorded mutex must not be poisoned")
        .push(Recorded {
            method,
            path: uri.path().to_owned(),
            headers,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "no mock response available")
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let payload = match response.body {
        MockBody::Text(text) => Bytes::from_static(text.as_bytes()),
        MockBody::Echo => body,
    };
    (
        response.status,
        [(header::CONTENT_TYPE, response.content_type)],
        payload,
    )
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn recorded(&self) -> Vec<Recorded> {
        self.recorded
            .lock()
            .expect("recorded mutex must not be poisoned")
            .clone()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        recorded: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .fallback(mock_handler)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        recorded: state.recorded,
        task,
    }
}

#[tokio::test]
async fn base_uri_is_prefixed_to_target() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        r#"{"isCorrect":true}"#,
    )])
    .await;
    let fetcher = Fetcher::new(FetcherDefaults::default().with_base_uri(server.base_url.clone()));

    let value: JsonValue = fetcher
        .get("/api/v1/users/1")
        .json()
        .await
        .expect("request must succeed");

    assert_eq!(value, json!({"isCorrect": true}));
    let recorded = server.recorded();
    assert_eq!(recorded[0].path, "/api/v1/users/1");
    assert_eq!(recorded[0].method, Method::GET);
    assert_eq!(recorded[0].headers[header::ACCEPT], "application/json");
}

#[tokio::test]
async fn posted_json_body_round_trips() {
    let server = spawn_server(vec![MockResponse::echo()]).await;
    let user = json!({"name": "Han Solo"});

    let value: JsonValue = execute(
        &server.url("/api/v1/users"),
        RequestInit::post().body(json!({ "user": user.clone() })),
        FetchOptions::default(),
    )
    .json()
    .await
    .expect("echo must succeed");

    assert_eq!(value, json!({ "user": user }));
    let recorded = server.recorded();
    assert_eq!(recorded[0].method, Method::POST);
    assert_eq!(recorded[0].headers[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn raw_text_body_is_sent_unchanged() {
    let server = spawn_server(vec![MockResponse::echo().with_content_type("text/plain")]).await;

    let text = execute(
        &server.url("/notes"),
        RequestInit::post().body(Body::text("not json")),
        FetchOptions::default(),
    )
    .text()
    .await
    .expect("echo must succeed");

    assert_eq!(text, "not json");
    assert!(server.recorded()[0]
        .headers
        .get(header::CONTENT_TYPE)
        .is_none());
}

#[tokio::test]
async fn retries_request_timeout_status_then_succeeds() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::REQUEST_TIMEOUT, ""),
        MockResponse::text(StatusCode::OK, ""),
    ])
    .await;

    let text = execute(
        &server.url("/api/v1/users/1"),
        RequestInit::get(),
        FetchOptions::default(),
    )
    .text()
    .await
    .expect("second attempt must succeed");

    assert_eq!(text, "");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn non_existing_page_is_status_error() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::NOT_FOUND, "missing"),
        MockResponse::text(StatusCode::OK, "unreachable"),
    ])
    .await;

    let err = execute(
        &server.url("/api/v1/users/2"),
        RequestInit::get(),
        FetchOptions::default(),
    )
    .json::<JsonValue>()
    .await
    .expect_err("404 must fail");

    match err {
        FetchError::Status { request, response } => {
            assert!(request.uri().ends_with("/api/v1/users/2"));
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.text(), "missing");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn disabled_retry_surfaces_first_server_error() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        MockResponse::text(StatusCode::OK, ""),
    ])
    .await;

    let err = execute(
        &server.url("/"),
        RequestInit::get(),
        FetchOptions::default().with_retry(Retry::Disabled),
    )
    .text()
    .await
    .expect_err("retry disabled");

    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn slow_server_surfaces_timeout_error() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "late").with_delay(Duration::from_millis(500))
    ])
    .await;

    let err = execute(
        &server.url("/slow"),
        RequestInit::get(),
        FetchOptions::default()
            .with_timeout_ms(50)
            .without_retry(),
    )
    .text()
    .await
    .expect_err("request must time out");

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn timed_out_attempt_is_retried() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "late").with_delay(Duration::from_millis(500)),
        MockResponse::text(StatusCode::OK, "fast"),
    ])
    .await;

    let text = execute(
        &server.url("/flaky"),
        RequestInit::get(),
        FetchOptions::default().with_timeout_ms(100),
    )
    .text()
    .await
    .expect("second attempt must succeed");

    assert_eq!(text, "fast");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn external_signal_aborts_in_flight_request() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "late").with_delay(Duration::from_millis(1_000))
    ])
    .await;

    let signal = CancellationToken::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = execute(
        &server.url("/users"),
        RequestInit::get().signal(signal),
        FetchOptions::default(),
    )
    .text()
    .await
    .expect_err("signal must abort");

    assert_eq!(err.kind(), ErrorKind::Aborted);
    assert_eq!(err.to_string(), "the operation was aborted");
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn connection_failure_is_not_retried() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let err = execute(
        &format!("http://{address}/"),
        RequestInit::get(),
        FetchOptions::default(),
    )
    .text()
    .await
    .expect_err("nothing listens there");

    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn form_data_decodes_urlencoded_response() {
    let server = spawn_server(vec![MockResponse::text(
        StatusCode::OK,
        "name=Han+Solo&ship=Falcon",
    )
    .with_content_type("application/x-www-form-urlencoded")])
    .await;

    let form = execute(&server.url("/form"), RequestInit::get(), FetchOptions::default())
        .form_data()
        .await
        .expect("form must decode");

    assert_eq!(form.get("name").and_then(FormValue::as_text), Some("Han Solo"));
    assert_eq!(
        server.recorded()[0].headers[header::ACCEPT],
        "multipart/form-data"
    );
}

#[tokio::test]
async fn binary_reports_content_type() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "PNG").with_content_type("image/png")
    ])
    .await;

    let binary = execute(&server.url("/img"), RequestInit::get(), FetchOptions::default())
        .binary()
        .await
        .expect("binary must succeed");

    assert_eq!(binary.content_type.as_deref(), Some("image/png"));
    assert_eq!(binary.data, &b"PNG"[..]);
    assert_eq!(server.recorded()[0].headers[header::ACCEPT], "*/*");
}
