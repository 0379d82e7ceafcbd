#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STREAM_REPLY: &str = "你好！有什么可以帮你？";

/// Load a test fixture relative to the crate root.
pub fn load_fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to load test fixture: {path}"))
}

/// A non-streaming chat completion whose message content is `content`.
pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "deepseek-v3.1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

pub async fn mount_completion(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(content)))
        .mount(server)
        .await;
}

pub async fn mount_stream(server: &MockServer, fixture: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(load_fixture(fixture))
                .insert_header("content-type", "text/event-stream")
                .insert_header("cache-control", "no-cache"),
        )
        .mount(server)
        .await;
}
