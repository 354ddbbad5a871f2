//! Integration tests for the OpenAI-compatible backend against a mock
//! chat-completions endpoint.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ensemble_agent::{FinishReason, ModelClient, ModelConfig, OpenAiModel};
use ensemble_core::{EnsembleError, Message, ParameterField, ToolSpecification};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> OpenAiModel {
    OpenAiModel::new(ModelConfig::new("test-model", "sk-test").with_base_url(server.uri()))
}

fn add_spec() -> ToolSpecification {
    ToolSpecification::new("add", "Add two integers")
        .with_parameter(ParameterField::new("a", "integer", true))
        .with_parameter(ParameterField::new("b", "integer", true))
}

#[tokio::test]
async fn stop_turn_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello there."},
                "finish_reason": "stop",
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let turn = backend(&server)
        .chat(&[Message::user("hi")], &[])
        .await
        .expect("chat");

    assert_eq!(turn.content, "Hello there.");
    assert_eq!(turn.finish_reason, FinishReason::Stop);
    assert!(turn.tool_calls.is_empty());

    server.verify().await;
}

#[tokio::test]
async fn tool_call_turn_round_trip() {
    let server = MockServer::start().await;
    // The request must declare the tool in function-calling shape.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "add"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "add", "arguments": "{\"a\":17,\"b\":25}"},
                    }],
                },
                "finish_reason": "tool_calls",
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let turn = backend(&server)
        .chat(&[Message::user("add 17 and 25")], &[add_spec()])
        .await
        .expect("chat");

    assert_eq!(turn.finish_reason, FinishReason::ToolCalls);
    assert_eq!(turn.tool_calls.len(), 1);
    assert_eq!(turn.tool_calls[0].id, "call_abc");
    assert_eq!(turn.tool_calls[0].arguments["b"], 25);

    server.verify().await;
}

#[tokio::test]
async fn api_error_surfaces_as_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "rate limited", "type": "rate_limit_exceeded"}
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .chat(&[Message::user("hi")], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, EnsembleError::Http(_)));
    assert!(err.to_string().contains("429"));
}
