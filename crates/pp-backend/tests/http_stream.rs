//! Integration tests for the HTTP transport and decoder using wiremock.

use std::sync::{Arc, Mutex};

use pp_backend::{AgentStream, HttpTransport, StreamCallbacks};
use pp_protocol::HistoryEntry;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Token(String),
    FinalState(Value),
    Error(String),
    Complete,
}

fn recording_callbacks() -> (StreamCallbacks, Arc<Mutex<Vec<Call>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (token, state, error, complete) = (calls.clone(), calls.clone(), calls.clone(), calls.clone());
    let callbacks = StreamCallbacks::new()
        .on_token(move |d| token.lock().unwrap().push(Call::Token(d.to_string())))
        .on_final_state(move |s| state.lock().unwrap().push(Call::FinalState(s.clone())))
        .on_error(move |m| error.lock().unwrap().push(Call::Error(m.to_string())))
        .on_complete(move || complete.lock().unwrap().push(Call::Complete));
    (callbacks, calls)
}

fn client_for(server: &MockServer) -> (AgentStream<HttpTransport>, Arc<Mutex<Vec<Call>>>) {
    let transport = HttpTransport::new(format!("{}/api/chat", server.uri())).unwrap();
    let (callbacks, calls) = recording_callbacks();
    (AgentStream::new(transport, callbacks), calls)
}

fn sse_body(events: &[Value]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

#[tokio::test]
async fn posts_history_region_and_stream_modes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "text/event-stream"))
        .and(body_json(json!({
            "messages": [
                {"role": "user", "content": "fones bluetooth baratos"}
            ],
            "region": "br",
            "stream_mode": ["messages", "state"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, calls) = client_for(&server);
    client
        .stream(&[HistoryEntry::user("fones bluetooth baratos")], Some("br"))
        .await;

    assert_eq!(*calls.lock().unwrap(), vec![Call::Complete]);
}

#[tokio::test]
async fn streams_tokens_and_final_state() {
    let server = MockServer::start().await;
    let products = json!([{
        "name": "Fone XR-200",
        "brand": "Acme",
        "price": "R$ 199,90",
        "availability": "In Stock",
        "average_rating": 4.5,
        "total_reviews": 1234,
        "images": ["https://img.example/1.jpg"],
        "url": "https://shop.example/p/xr200"
    }]);
    let mut body = sse_body(&[
        json!({"type": "token", "delta": "Encontrei "}),
        json!({"type": "token", "delta": "um fone."}),
        json!({"type": "final_state", "state": {"last_search": products}}),
        json!({"type": "done"}),
    ]);
    body.push_str("data: [DONE]\n\n");

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let (client, calls) = client_for(&server);
    client.stream(&[HistoryEntry::user("fone")], None).await;

    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            Call::Token("Encontrei ".to_string()),
            Call::Token("um fone.".to_string()),
            Call::FinalState(json!({"last_search": products})),
            Call::Complete,
        ]
    );
    assert_eq!(client.accumulated(), "Encontrei um fone.");

    let Call::FinalState(state) = &calls[2] else {
        panic!("expected final state");
    };
    let found = pp_protocol::last_search(state).unwrap();
    assert_eq!(found[0].name, "Fone XR-200");
}

#[tokio::test]
async fn trailing_event_without_newline() {
    let server = MockServer::start().await;
    let body = "data: {\"type\":\"token\",\"delta\":\"last words\"}";

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let (client, calls) = client_for(&server);
    client.stream(&[HistoryEntry::user("hi")], None).await;

    assert_eq!(
        *calls.lock().unwrap(),
        vec![Call::Token("last words".to_string()), Call::Complete]
    );
}

#[tokio::test]
async fn server_error_reports_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": "Failed to connect to agent"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, calls) = client_for(&server);
    client.stream(&[HistoryEntry::user("hi")], None).await;

    assert_eq!(
        *calls.lock().unwrap(),
        vec![Call::Error("HTTP error: status 500".to_string())]
    );
    assert!(!client.is_active());
}

#[tokio::test]
async fn unreachable_endpoint_reports_once() {
    let server = MockServer::builder().start().await;
    let uri = server.uri();
    drop(server);

    let transport = HttpTransport::new(format!("{uri}/api/chat")).unwrap();
    let (callbacks, calls) = recording_callbacks();
    let client = AgentStream::new(transport, callbacks);
    client.stream(&[HistoryEntry::user("hi")], None).await;

    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1, "calls: {calls:?}");
    assert!(
        matches!(&calls[0], Call::Error(m) if m.starts_with("HTTP error:")),
        "calls: {calls:?}"
    );
}

#[tokio::test]
async fn stop_during_slow_response_is_silent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&[json!({"type": "token", "delta": "late"})]), "text/event-stream")
                .set_delay(std::time::Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let (client, calls) = client_for(&server);
    let history = [HistoryEntry::user("hi")];
    tokio::join!(client.stream(&history, None), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        client.stop();
    });

    assert!(calls.lock().unwrap().is_empty());
    assert!(!client.is_active());
}

async fn slow_answer_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&[json!({"type": "token", "delta": "ok"})]), "text/event-stream")
                .set_delay(std::time::Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn request_timeout_cuts_off_slow_answer() {
    let server = slow_answer_server().await;
    let transport = HttpTransport::with_timeouts(
        format!("{}/api/chat", server.uri()),
        None,
        Some(std::time::Duration::from_millis(50)),
    )
    .unwrap();
    let (callbacks, calls) = recording_callbacks();
    let client = AgentStream::new(transport, callbacks);
    client.stream(&[HistoryEntry::user("hi")], None).await;

    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1, "calls: {calls:?}");
    assert!(matches!(&calls[0], Call::Error(_)), "calls: {calls:?}");
}

#[tokio::test]
async fn no_request_timeout_waits_for_slow_answer() {
    let server = slow_answer_server().await;
    let transport =
        HttpTransport::with_timeouts(format!("{}/api/chat", server.uri()), None, None).unwrap();
    let (callbacks, calls) = recording_callbacks();
    let client = AgentStream::new(transport, callbacks);
    client.stream(&[HistoryEntry::user("hi")], None).await;

    assert_eq!(
        *calls.lock().unwrap(),
        vec![Call::Token("ok".to_string()), Call::Complete]
    );
}
