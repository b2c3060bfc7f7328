// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM for deterministic testing.
//!
//! `MockLlm` implements `LlmService` with pre-configured responses and counts
//! every invocation, so tests can assert that a path never reached the LLM.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use ragline_core::{
    AdapterType, HealthStatus, LlmService, PluginAdapter, RaglineError, TokenStream,
};

/// A mock LLM that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty,
/// a default "mock response" text is returned.
pub struct MockLlm {
    responses: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    calls: AtomicUsize,
    failure: Option<u16>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            calls: AtomicUsize::new(0),
            failure: None,
        }
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Self::new()
        }
    }

    /// Every call fails with an upstream error carrying `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            failure: Some(status),
            ..Self::new()
        }
    }

    pub async fn add_response(&self, text: String) {
        self.responses.lock().await.push_back(text);
    }

    /// Number of `complete` and `stream` invocations so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    async fn next_response(&self, prompt: &str) -> Result<String, RaglineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());
        if let Some(status) = self.failure {
            return Err(RaglineError::ExternalService {
                service: "mock-llm".into(),
                message: format!("mock upstream returned {status}"),
                status: Some(status),
                source: None,
            });
        }
        Ok(self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "mock response".to_string()))
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockLlm {
    fn name(&self) -> &str {
        "mock-llm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Llm
    }

    async fn health_check(&self) -> Result<HealthStatus, RaglineError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl LlmService for MockLlm {
    async fn complete(&self, prompt: &str) -> Result<String, RaglineError> {
        self.next_response(prompt).await
    }

    /// Streams the response word by word, keeping the separating spaces.
    async fn stream(&self, prompt: &str) -> Result<TokenStream, RaglineError> {
        let text = self.next_response(prompt).await?;
        let tokens: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();
        Ok(stream::iter(tokens).map(Ok).boxed())
    }
}
