use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use quoteflow_agent::{GatewayError, HttpModelGateway, ModelGateway};
use quoteflow_core::LlmConfig;
use secrecy::SecretString;
use serde_json::{json, Value};

#[derive(Clone)]
struct FakeCompletions {
    status: StatusCode,
    body: String,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl FakeCompletions {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self { status, body: body.into(), seen: Arc::default() }
    }

    fn content(text: &str) -> Self {
        Self::new(
            StatusCode::OK,
            json!({"choices": [{"message": {"role": "assistant", "content": text}}]}).to_string(),
        )
    }

    fn requests(&self) -> Vec<(Option<String>, Value)> {
        self.seen.lock().expect("request log").clone()
    }
}

async fn completions(
    State(fake): State<FakeCompletions>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    fake.seen.lock().expect("request log").push((authorization, body));
    (fake.status, fake.body.clone())
}

async fn serve(fake: FakeCompletions) -> String {
    let router = Router::new().route("/chat/completions", post(completions)).with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind fake server");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake server");
    });
    format!("http://{address}")
}

fn gateway(base_url: String) -> HttpModelGateway {
    HttpModelGateway::new(&LlmConfig {
        api_key: Some(SecretString::from("sk-test".to_string())),
        base_url,
        model: "deepseek-chat".to_string(),
    })
}

#[tokio::test]
async fn successful_completion_returns_decoded_object() {
    let fake = FakeCompletions::content(r#"{"questions": [{"id": 1, "question": "平台？", "options": ["网页"]}]}"#);
    let base_url = serve(fake.clone()).await;

    let payload = gateway(base_url).complete("用户需求：官网", "系统指令").await.expect("completion");

    assert_eq!(payload["questions"][0]["question"], "平台？");
    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    let (authorization, body) = &requests[0];
    assert_eq!(authorization.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "deepseek-chat");
    assert_eq!(body["response_format"], json!({"type": "json_object"}));
    assert_eq!(body["messages"][0], json!({"role": "system", "content": "系统指令"}));
    assert_eq!(body["messages"][1], json!({"role": "user", "content": "用户需求：官网"}));
}

#[tokio::test]
async fn base_url_with_trailing_slash_reaches_the_same_endpoint() {
    let fake = FakeCompletions::content(r#"{"ok": true}"#);
    let base_url = serve(fake.clone()).await;

    gateway(format!("{base_url}/")).complete("u", "s").await.expect("completion");

    assert_eq!(fake.requests().len(), 1);
}

#[tokio::test]
async fn prose_around_the_object_is_tolerated() {
    let fake = FakeCompletions::content("当然！\n```json\n{\"tiers\": []}\n```\n祝顺利");
    let base_url = serve(fake).await;

    let payload = gateway(base_url).complete("u", "s").await.expect("completion");

    assert_eq!(payload, json!({"tiers": []}));
}

#[tokio::test]
async fn error_status_surfaces_the_service_message() {
    let fake = FakeCompletions::new(
        StatusCode::UNAUTHORIZED,
        json!({"error": {"message": "Authentication Fails, Your api key is invalid"}}).to_string(),
    );
    let base_url = serve(fake).await;

    let error = gateway(base_url).complete("u", "s").await.expect_err("unauthorized");

    assert_eq!(
        error,
        GatewayError::Http {
            status: 401,
            message: "Authentication Fails, Your api key is invalid".to_string(),
        }
    );
    assert_eq!(error.to_string(), "Authentication Fails, Your api key is invalid");
}

#[tokio::test]
async fn error_status_without_message_uses_status_code() {
    let fake = FakeCompletions::new(StatusCode::BAD_GATEWAY, "upstream down");
    let base_url = serve(fake).await;

    let error = gateway(base_url).complete("u", "s").await.expect_err("bad gateway");

    assert_eq!(error.to_string(), "API Error: 502");
}

#[tokio::test]
async fn blank_content_is_an_empty_response() {
    let fake = FakeCompletions::content("   ");
    let base_url = serve(fake).await;

    let error = gateway(base_url).complete("u", "s").await.expect_err("no content");

    assert_eq!(error, GatewayError::EmptyResponse);
}

#[tokio::test]
async fn missing_choices_is_an_empty_response() {
    let fake = FakeCompletions::new(StatusCode::OK, r#"{"choices": []}"#);
    let base_url = serve(fake).await;

    let error = gateway(base_url).complete("u", "s").await.expect_err("no choices");

    assert_eq!(error, GatewayError::EmptyResponse);
}

#[tokio::test]
async fn content_without_json_is_an_extraction_error() {
    let fake = FakeCompletions::content("抱歉，我无法回答。");
    let base_url = serve(fake).await;

    let error = gateway(base_url).complete("u", "s").await.expect_err("not json");

    assert!(matches!(error, GatewayError::Extraction(ref failure) if failure.excerpt == "抱歉，我无法回答。"));
}

#[tokio::test]
async fn missing_key_never_reaches_the_server() {
    let fake = FakeCompletions::content(r#"{"ok": true}"#);
    let base_url = serve(fake.clone()).await;
    let gateway = HttpModelGateway::new(&LlmConfig {
        api_key: None,
        base_url,
        model: "deepseek-chat".to_string(),
    });

    let error = gateway.complete("u", "s").await.expect_err("no key");

    assert!(matches!(error, GatewayError::Config(_)));
    assert!(fake.requests().is_empty());
}
