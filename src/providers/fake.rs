//! In-process scripted backend for unit and integration tests
//!
//! [`ScriptedBackend`] replays queued outcomes instead of doing network
//! I/O and records every request it receives, so tests can assert both on
//! what the retry loop sent and on how many attempts it made.

use crate::providers::{BackendError, ChatRequest, ChatResponse, CompletionBackend};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type Outcome = std::result::Result<ChatResponse, BackendError>;

/// Backend that replays a script of outcomes
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Outcome>>,
    repeat: Option<Outcome>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    /// Replay `outcomes` in order; calls beyond the script fail as unexpected
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return `outcome` for every call
    pub fn repeating(outcome: Outcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(outcome),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: every call succeeds with `content`
    pub fn replying(content: &str) -> Self {
        Self::repeating(Ok(ChatResponse {
            content: Some(content.to_string()),
            total_tokens: Some(10),
        }))
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Copies of every request received, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn chat_completion(&self, request: &ChatRequest) -> Outcome {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match (next, &self.repeat) {
            (Some(outcome), _) => outcome,
            (None, Some(outcome)) => outcome.clone(),
            (None, None) => Err(BackendError::Unexpected("script exhausted".to_string())),
        }
    }
}
