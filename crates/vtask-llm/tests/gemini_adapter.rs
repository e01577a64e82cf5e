use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vtask_llm::{
    collect_stream, structured_output_as, GeminiAdapter, GeminiConfig, LlmAdapter, LlmError, ModelCredentials,
};

fn adapter(server: &MockServer) -> GeminiAdapter {
    GeminiAdapter::new(GeminiConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        max_retries: 0,
    })
    .unwrap()
}

fn creds() -> ModelCredentials {
    ModelCredentials::new("gemini-2.5-flash", "test-key")
}

fn text_response(text: &str) -> serde_json::Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct Answer {
    value: u32,
}

#[tokio::test]
async fn structured_output_sends_schema_and_parses_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {"type": "object"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("```json\n{\"value\": 42}\n```")))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let answer: Answer = structured_output_as(&adapter, "what is it?", &creds()).await.unwrap();
    assert_eq!(answer.value, 42);
}

#[tokio::test]
async fn structured_output_rejects_wrong_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("{\"other\": true}")))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let err = structured_output_as::<Answer>(&adapter, "q", &creds()).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidResponse(_)));
}

#[tokio::test]
async fn client_errors_are_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .structured_output("q", &creds(), json!({"type": "object"}))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RequestFailed(ref msg) if msg.contains("bad key")));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn generate_stream_concatenates_sse_chunks() {
    let body = format!(
        "data: {}\r\n\r\ndata: {}\r\n\r\n",
        text_response("noise<updated_content>HEL"),
        text_response("LO</updated_content>trailer")
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let stream = adapter(&server).generate_stream("rewrite", &creds()).await.unwrap();
    let text = collect_stream(stream).await.unwrap();
    assert_eq!(text, "noise<updated_content>HELLO</updated_content>trailer");
}

#[tokio::test]
async fn generate_stream_surfaces_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = adapter(&server).generate_stream("rewrite", &creds()).await;
    assert!(matches!(result, Err(LlmError::ServiceUnavailable(_))));
}
