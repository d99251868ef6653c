use parley::completion::catalog::ModelCatalog;
use parley::completion::{CompletionClient, RetryPolicy};
use parley::config::ApiConfig;
use parley::providers::OpenAiBackend;
use parley::storage::ConversationStore;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_test_store() -> (ConversationStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = ConversationStore::new_with_path(tmp.path().join("chat_history"))
        .expect("failed to create conversation store");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// API settings pointing at a mock server
#[allow(dead_code)]
pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        api_key: Some("sk-test".to_string()),
        timeout_seconds: 5,
        ..Default::default()
    }
}

/// Client over the HTTP backend with `attempts` attempts and no backoff
#[allow(dead_code)]
pub fn http_client(base_url: &str, attempts: u32) -> CompletionClient {
    let backend = OpenAiBackend::new(&api_config(base_url)).expect("backend");
    CompletionClient::new(
        Arc::new(backend),
        ModelCatalog::builtin(),
        RetryPolicy::immediate(attempts),
    )
    .with_timeout(Duration::from_secs(5))
}

/// A successful `/chat/completions` body
#[allow(dead_code)]
pub fn completion_body(content: &str, total_tokens: u64) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 5,
            "completion_tokens": total_tokens.saturating_sub(5),
            "total_tokens": total_tokens
        }
    })
}
