// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible providers for the Ragline service.
//!
//! [`OpenAiEmbedder`] implements [`EmbeddingService`] over `/embeddings`
//! and [`OpenAiChat`] implements [`LlmService`] over `/chat/completions`,
//! streaming via server-sent events. Both speak to any endpoint that
//! follows the OpenAI wire format.

pub mod client;
pub mod sse;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use ragline_config::model::OpenAiConfig;
use ragline_core::{
    AdapterType, Embedding, EmbeddingService, HealthStatus, LlmService, PluginAdapter,
    RaglineError, TokenStream,
};
use ragline_security::key_preview;
use tracing::debug;

pub use client::OpenAiClient;

use crate::types::{ApiMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};

/// Inputs per embeddings request.
const EMBEDDING_BATCH: usize = 96;

fn client_from_config(config: &OpenAiConfig) -> Result<OpenAiClient, RaglineError> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| RaglineError::Config("openai.api_key is required".into()))?;
    debug!(
        base_url = %config.base_url,
        key = %key_preview(api_key),
        "openai client configured"
    );
    OpenAiClient::new(
        api_key,
        &config.base_url,
        Duration::from_secs(config.request_timeout_secs),
    )
}

macro_rules! openai_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, RaglineError> {
                Ok(HealthStatus::Healthy)
            }
        }
    };
}

/// Embeddings via `POST /embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: OpenAiClient, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions,
        }
    }

    pub fn from_config(config: &OpenAiConfig) -> Result<Self, RaglineError> {
        Ok(Self::new(
            client_from_config(config)?,
            config.embedding_model.clone(),
            config.embedding_dimensions,
        ))
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Embedding>, RaglineError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: Some(self.dimensions),
        };
        let mut response: EmbeddingResponse = self
            .client
            .post_json("embedding", "/embeddings", &request)
            .await?;
        if response.data.len() != texts.len() {
            return Err(RaglineError::external(
                "embedding",
                format!(
                    "requested {} embeddings, received {}",
                    texts.len(),
                    response.data.len()
                ),
            ));
        }
        response.data.sort_by_key(|d| d.index);
        response
            .data
            .into_iter()
            .map(|d| Embedding::new(d.embedding, self.dimensions))
            .collect()
    }
}

openai_adapter!(OpenAiEmbedder, "openai-embeddings", AdapterType::Embedding);

#[async_trait]
impl EmbeddingService for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Embedding, RaglineError> {
        let mut out = self.request(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| RaglineError::external("embedding", "empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, RaglineError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBEDDING_BATCH) {
            debug!(inputs = batch.len(), "embedding batch");
            out.extend(self.request(batch).await?);
        }
        Ok(out)
    }
}

/// Chat completions via `POST /chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(client: OpenAiClient, model: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    pub fn from_config(config: &OpenAiConfig) -> Result<Self, RaglineError> {
        Ok(Self::new(
            client_from_config(config)?,
            config.chat_model.clone(),
            config.max_tokens,
            config.temperature,
        ))
    }

    fn request(&self, prompt: &str, stream: bool) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![ApiMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
        }
    }
}

openai_adapter!(OpenAiChat, "openai-chat", AdapterType::Llm);

#[async_trait]
impl LlmService for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String, RaglineError> {
        let response: ChatResponse = self
            .client
            .post_json("llm", "/chat/completions", &self.request(prompt, false))
            .await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RaglineError::external("llm", "completion contained no choices"))
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream, RaglineError> {
        let response = self
            .client
            .post("llm", "/chat/completions", &self.request(prompt, true))
            .await?;
        Ok(sse::parse_chat_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new("sk-test", &server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn embed_batch_orders_by_index_and_validates_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "embed-small", "dimensions": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(client(&server), "embed-small", 2);
        let out = embedder
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(out[0].as_slice(), &[1.0, 0.0]);
        assert_eq!(out[1].as_slice(), &[0.0, 1.0]);
    }

    #[tokio::test]
    async fn wrong_dimensionality_is_a_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(client(&server), "embed-small", 2);
        assert!(matches!(
            embedder.embed("hi").await,
            Err(RaglineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn http_errors_carry_status_for_retry_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Rate limited", "type": "rate_limit_error"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad input"))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(client(&server), "gpt-test", 64, 0.0);
        let err = chat.complete("hello").await.unwrap_err();
        assert!(matches!(err, RaglineError::ExternalService { status: Some(429), .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Rate limited"));

        let embedder = OpenAiEmbedder::new(client(&server), "embed-small", 2);
        let err = embedder.embed("x").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"stream": false, "model": "gpt-test"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi there!"}}]
            })))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(client(&server), "gpt-test", 64, 0.0);
        assert_eq!(chat.complete("hello").await.unwrap(), "Hi there!");
    }

    #[tokio::test]
    async fn stream_yields_text_deltas() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Grounded \"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"answer\"}}]}\n\n\
                    data: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(client(&server), "gpt-test", 64, 0.0);
        let text: Vec<String> = chat
            .stream("hello")
            .await
            .unwrap()
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(text.concat(), "Grounded answer");
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = OpenAiConfig {
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(
            OpenAiChat::from_config(&config),
            Err(RaglineError::Config(_))
        ));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let client = OpenAiClient::new("sk-secret-value", "https://api.example", Duration::from_secs(1)).unwrap();
        assert!(!format!("{client:?}").contains("sk-secret-value"));
    }
}
