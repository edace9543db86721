// tests/telegram.rs
//
// TelegramChannel against a local axum stand-in for the Bot API:
// retries, bounded attempts and the plain-text fallbacks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use reddit_digest::error::DeliveryError;
use reddit_digest::notify::{DeliveryChannel, TelegramChannel};

const TOKEN: &str = "TOKEN";

/// Scripted replies, served in order; `{"ok":true}` once the script runs out.
#[derive(Default)]
struct FakeBotApi {
    replies: Mutex<VecDeque<(u16, Value)>>,
    received: Mutex<Vec<Value>>,
}

impl FakeBotApi {
    fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

async fn send_message(
    State(api): State<Arc<FakeBotApi>>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    api.received.lock().unwrap().push(payload);
    let (code, body) = api
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((200, json!({ "ok": true, "result": {} })));
    (StatusCode::from_u16(code).unwrap(), Json(body))
}

async fn start(replies: Vec<(u16, Value)>) -> (TelegramChannel, Arc<FakeBotApi>) {
    let api = Arc::new(FakeBotApi {
        replies: Mutex::new(replies.into()),
        ..FakeBotApi::default()
    });
    let app = Router::new()
        .route(&format!("/bot{TOKEN}/sendMessage"), post(send_message))
        .with_state(api.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let channel = TelegramChannel::new(TOKEN.into())
        .unwrap()
        .with_api_base(format!("http://{addr}/"))
        .with_timeout(5)
        .with_retries(3);
    (channel, api)
}

#[tokio::test]
async fn html_payload_is_sent_to_the_chat() {
    let (ch, api) = start(vec![]).await;
    ch.send("42", "**Key** a < b").await.unwrap();

    let got = api.received();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0]["chat_id"], "42");
    assert_eq!(got[0]["parse_mode"], "HTML");
    assert_eq!(got[0]["text"], "<b>Key</b> a &lt; b");
}

#[tokio::test]
async fn rate_limit_waits_retry_after_then_succeeds() {
    let (ch, api) = start(vec![(
        429,
        json!({ "ok": false, "error_code": 429, "description": "Too Many Requests", "parameters": { "retry_after": 1 } }),
    )])
    .await;

    let t0 = Instant::now();
    ch.send("42", "hello").await.unwrap();
    assert!(t0.elapsed() >= Duration::from_secs(1));
    assert_eq!(api.received().len(), 2);
}

#[tokio::test]
async fn server_errors_are_retried_with_bounded_attempts() {
    let bad = (502, json!({ "ok": false, "error_code": 502, "description": "Bad Gateway" }));
    let (ch, api) = start(vec![bad.clone(), bad.clone(), bad.clone(), bad]).await;

    let err = ch.send("42", "hello").await.unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { code: 502, .. }));
    assert_eq!(api.received().len(), 3);
}

#[tokio::test]
async fn server_error_then_success_delivers() {
    let (ch, api) = start(vec![(
        500,
        json!({ "ok": false, "error_code": 500, "description": "Internal" }),
    )])
    .await;
    ch.send("42", "hello").await.unwrap();
    assert_eq!(api.received().len(), 2);
}

#[tokio::test]
async fn client_rejection_is_not_retried() {
    let (ch, api) = start(vec![(
        403,
        json!({ "ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user" }),
    )])
    .await;

    let err = ch.send("42", "hello").await.unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { code: 403, .. }));
    assert_eq!(api.received().len(), 1);
}

#[tokio::test]
async fn markup_rejection_falls_back_to_plain_text() {
    let (ch, api) = start(vec![(
        400,
        json!({ "ok": false, "error_code": 400, "description": "Bad Request: can't parse entities: unexpected end tag" }),
    )])
    .await;

    ch.send("42", "**Key** insight").await.unwrap();
    let got = api.received();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0]["parse_mode"], "HTML");
    assert!(got[1].get("parse_mode").is_none());
    assert_eq!(got[1]["text"], "**Key** insight");
}

#[tokio::test]
async fn text_that_grows_past_the_limit_when_escaped_goes_plain() {
    let (ch, api) = start(vec![]).await;
    let text = "&".repeat(2000);

    ch.send("42", &text).await.unwrap();
    let got = api.received();
    assert_eq!(got.len(), 1);
    assert!(got[0].get("parse_mode").is_none());
    assert_eq!(got[0]["text"], text.as_str());
}
