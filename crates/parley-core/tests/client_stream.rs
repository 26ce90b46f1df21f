//! Provider adapters against a mock HTTP server.
//!
//! Each test serves a canned vendor response and checks the neutral events
//! `AiClient` produces from it.

use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley_core::ai::providers::{ProviderConfig, ProviderId};
use parley_core::ai::stream::{CompletionProvider, CompletionRequest, EventStream};
use parley_core::ai::types::Usage;
use parley_core::{AiClient, AiClientConfig, AiTool, Message, StreamEvent, ToolCall};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client(provider: ProviderId, base_url: &str, key: Option<&str>) -> AiClient {
    let config = AiClientConfig::new(ProviderConfig::builtin(provider)).with_base_url(base_url);
    AiClient::new(config, key.map(str::to_string))
}

fn request(model: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        messages: vec![Message::system("be brief"), Message::user("hello")],
        tools: vec![AiTool {
            name: "read_file".to_string(),
            description: "Read a file".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
        }],
        max_tokens: 256,
    }
}

async fn collect(mut stream: EventStream) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) =
        tokio::time::timeout(Duration::from_secs(10), stream.next()).await.expect("stream stalled")
    {
        events.push(event);
    }
    events
}

fn text_of(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Content { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

fn terminal_count(events: &[StreamEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

const ANTHROPIC_STREAM: &str = r#"event: message_start
data: {"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":12,"output_tokens":1}}}

event: content_block_start
data: {"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}

event: ping
data: {"type":"ping"}

event: content_block_delta
data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}

event: content_block_delta
data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta"

event: content_block_delta
data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" world"}}

event: content_block_stop
data: {"type":"content_block_stop","index":0}

event: content_block_start
data: {"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"read_file","input":{}}}

event: content_block_delta
data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"file_pa"}}

event: content_block_delta
data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"th\": \"/a.ts\"}"}}

event: content_block_stop
data: {"type":"content_block_stop","index":1}

event: message_delta
data: {"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":30}}

event: message_stop
data: {"type":"message_stop"}

"#;

#[tokio::test]
async fn test_anthropic_stream_skips_malformed_frame() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(sse(ANTHROPIC_STREAM))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(ProviderId::Anthropic, &server.uri(), Some("test-key"));
    let events = collect(client.stream(
        request("claude-sonnet-4-5"),
        CancellationToken::new(),
    ))
    .await;

    assert_eq!(text_of(&events), "Hello world");
    assert!(events.contains(&StreamEvent::ToolCall {
        tool_call: ToolCall::new("toolu_1", "read_file", r#"{"file_path": "/a.ts"}"#),
    }));
    assert!(events.contains(&StreamEvent::Usage {
        usage: Usage::new(12, 30),
    }));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(terminal_count(&events), 1);

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["system"], "be brief");
    assert_eq!(body["stream"], true);
    assert_eq!(body["tools"][0]["name"], "read_file");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_success_status_is_single_error() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        ))
        .mount(&server)
        .await;

    let client = client(ProviderId::Anthropic, &server.uri(), Some("bad"));
    let events = collect(client.stream(request("claude-sonnet-4-5"), CancellationToken::new())).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error { error } => {
            assert!(error.contains("401"));
            assert!(error.contains("invalid x-api-key"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_single_error() {
    let client = client(ProviderId::OpenAI, "http://127.0.0.1:1", Some("k"));
    let events = collect(client.stream(request("gpt-4o"), CancellationToken::new())).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], StreamEvent::Error { .. }));
}

#[tokio::test]
async fn test_openai_indexed_tool_calls_and_usage() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let body = [
        r#"data: {"choices":[{"index":0,"delta":{"role":"assistant","content":"Checking"}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"read_file","arguments":""}}]}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":1,"id":"call_b","type":"function","function":{"name":"read_file","arguments":"{\"file_path\":"}}]}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"file_path\":\"/a\"}"}}]}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":1,"function":{"arguments":"\"/b\"}"}}]}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        r#"data: {"choices":[],"usage":{"prompt_tokens":20,"completion_tokens":9,"total_tokens":29}}"#,
        "data: [DONE]",
        "",
    ]
    .join("\n\n");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(sse(&body))
        .mount(&server)
        .await;

    let client = client(ProviderId::OpenAI, &server.uri(), Some("sk-test"));
    let events = collect(client.stream(request("gpt-4o"), CancellationToken::new())).await;

    let calls: Vec<&ToolCall> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolCall { tool_call } => Some(tool_call),
            _ => None,
        })
        .collect();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].id, "call_a");
    assert_eq!(calls[0].arguments, r#"{"file_path":"/a"}"#);
    assert_eq!(calls[1].id, "call_b");
    assert_eq!(calls[1].arguments, r#"{"file_path":"/b"}"#);
    assert!(events.contains(&StreamEvent::Usage {
        usage: Usage::new(20, 9),
    }));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(terminal_count(&events), 1);

    let received = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(sent["stream_options"]["include_usage"], true);
    assert_eq!(sent["messages"][0]["role"], "system");
}

#[tokio::test]
async fn test_google_synthesizes_call_ids() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let body = [
        r#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"Let me read it."}]}}]}"#,
        r#"data: {"candidates":[{"content":{"role":"model","parts":[{"functionCall":{"name":"read_file","args":{"file_path":"/a"}}},{"functionCall":{"name":"read_file","args":{"file_path":"/b"}}}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":7,"candidatesTokenCount":5}}"#,
        "",
    ]
    .join("\r\n\r\n");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(query_param("key", "g-key"))
        .respond_with(sse(&body))
        .mount(&server)
        .await;

    let client = client(ProviderId::Google, &server.uri(), Some("g-key"));
    let events = collect(client.stream(
        request("gemini-2.5-flash"),
        CancellationToken::new(),
    ))
    .await;

    assert_eq!(text_of(&events), "Let me read it.");
    let ids: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolCall { tool_call } => Some(tool_call.id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert!(ids.iter().all(|id| !id.is_empty()));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(terminal_count(&events), 1);
}

#[tokio::test]
async fn test_ollama_json_lines() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let body = [
        r#"{"model":"qwen3","message":{"role":"assistant","content":"","thinking":"hmm"},"done":false}"#,
        r#"{"model":"qwen3","message":{"role":"assistant","content":"Hi"},"done":false}"#,
        r#"not json at all"#,
        r#"{"model":"qwen3","message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"read_file","arguments":{"file_path":"/a"}}}]},"done":false}"#,
        r#"{"model":"qwen3","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","prompt_eval_count":11,"eval_count":4}"#,
    ]
    .join("\n");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-ndjson")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client = client(ProviderId::Ollama, &server.uri(), None);
    let events = collect(client.stream(request("qwen3"), CancellationToken::new())).await;

    assert_eq!(
        events.first(),
        Some(&StreamEvent::Reasoning {
            content: "hmm".to_string()
        })
    );
    assert_eq!(text_of(&events), "Hi");
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::ToolCall { tool_call } if tool_call.arguments == r#"{"file_path":"/a"}"#
    )));
    assert!(events.contains(&StreamEvent::Usage {
        usage: Usage::new(11, 4),
    }));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(terminal_count(&events), 1);
}

#[tokio::test]
async fn test_cancel_yields_single_cancelled() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(sse(ANTHROPIC_STREAM).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let client = client(ProviderId::Anthropic, &server.uri(), Some("k"));
    let cancel = CancellationToken::new();
    let stream = client.stream(request("claude-sonnet-4-5"), cancel.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    cancel.cancel();

    let events = collect(stream).await;
    assert_eq!(events, vec![StreamEvent::Cancelled]);
}
