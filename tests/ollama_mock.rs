//! HTTP mock tests for the Ollama client and the toxicity tool.
//!
//! Uses wiremock to simulate the language-model server.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use firewall::adapters::{GenerateRequest, OllamaClient, OllamaError};
use firewall::core::RetryPolicy;
use firewall::tools::{DetectToxic, Tool, ToolError};
use firewall::ValidationResult;

/// Retries with a 1ms backoff so tests stay fast
fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2.0,
    }
}

fn client(server: &MockServer) -> OllamaClient {
    OllamaClient::new(server.uri()).with_retry_policy(fast_retry())
}

fn generate_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "guard",
        "response": text,
        "done": true,
    }))
}

// =============================================================================
// Client Tests
// =============================================================================

#[tokio::test]
async fn test_generate_sends_non_streaming_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "guard",
            "prompt": "hi",
            "stream": false,
        })))
        .respond_with(generate_reply("通过"))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server)
        .generate(&GenerateRequest::new("guard", "hi"))
        .await
        .unwrap();

    assert_eq!(reply.response, "通过");
    assert!(reply.done);
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(generate_reply("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server)
        .with_api_key(Some("secret-key".to_string()))
        .generate(&GenerateRequest::new("guard", "hi"))
        .await
        .unwrap();

    assert_eq!(reply.response, "ok");
}

#[tokio::test]
async fn test_gateway_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(generate_reply("recovered"))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server)
        .generate(&GenerateRequest::new("guard", "hi"))
        .await
        .unwrap();

    assert_eq!(reply.response, "recovered");
}

#[tokio::test]
async fn test_retries_give_up_after_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    let result = client(&server)
        .generate(&GenerateRequest::new("guard", "hi"))
        .await;

    match result {
        Err(OllamaError::Status { status, body }) => {
            assert_eq!(status, 502);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("Expected Status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .generate(&GenerateRequest::new("guard", "hi"))
        .await;

    assert!(matches!(result, Err(OllamaError::Status { status: 500, .. })));
}

#[tokio::test]
async fn test_malformed_reply_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = client(&server)
        .generate(&GenerateRequest::new("guard", "hi"))
        .await;

    assert!(matches!(result, Err(OllamaError::Decode(_))));
}

#[tokio::test]
async fn test_list_models_and_health() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "guard:latest", "size": 4661224676u64, "modified_at": "2024-05-01T10:00:00Z" },
                { "name": "qwen2:7b" }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "0.3.12" })))
        .mount(&server)
        .await;

    let client = client(&server);
    let models = client.list_models().await.unwrap();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "guard:latest");
    assert_eq!(models[0].size, 4661224676);
    assert_eq!(models[1].size, 0);

    assert_eq!(client.version().await.unwrap(), "0.3.12");
    assert!(client.health_check().await.is_ok());
}

// =============================================================================
// detect_toxic Tests
// =============================================================================

#[tokio::test]
async fn test_detect_toxic_passes_clean_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "guard",
            "options": { "num_predict": 10 },
        })))
        .respond_with(generate_reply("通过"))
        .expect(1)
        .mount(&server)
        .await;

    let tool = DetectToxic::new(Arc::new(client(&server)));
    let result = tool.call(json!({ "query": "今天天气很好" })).await.unwrap();

    assert_eq!(result, ValidationResult::Pass);
}

#[tokio::test]
async fn test_detect_toxic_fails_on_marker() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(generate_reply("未通过：包含辱骂内容"))
        .mount(&server)
        .await;

    let tool = DetectToxic::new(Arc::new(client(&server)));
    let result = tool.validate_query("你这个笨蛋").await.unwrap();

    match result {
        ValidationResult::Fail {
            error_message,
            fix_value,
            error_spans,
        } => {
            assert_eq!(error_message, "未通过：包含辱骂内容");
            assert_eq!(fix_value, "");
            assert!(error_spans.is_empty());
        }
        ValidationResult::Pass => panic!("Expected failure"),
    }
}

#[tokio::test]
async fn test_detect_toxic_renders_template() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama-guard3",
            "prompt": "Judge: hello there",
        })))
        .respond_with(generate_reply("safe"))
        .expect(1)
        .mount(&server)
        .await;

    let tool = DetectToxic::new(Arc::new(client(&server)))
        .with_model("llama-guard3")
        .with_template("Judge: {query}")
        .with_fail_marker("unsafe");

    let result = tool.validate_query("hello there").await.unwrap();
    assert!(result.is_pass());
}

#[tokio::test]
async fn test_detect_toxic_surfaces_backend_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'guard' not found"))
        .mount(&server)
        .await;

    let tool = DetectToxic::new(Arc::new(client(&server)));
    let result = tool.call(json!({ "query": "hi" })).await;

    match result {
        Err(ToolError::Failed(e)) => {
            let message = format!("{:#}", e);
            assert!(message.contains("404"), "unexpected error: {}", message);
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}
