// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Ragline service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Ragline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// Every section except `[retrieval]` has working defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RaglineConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer token and API key settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// OpenAI-compatible provider settings (embeddings and chat).
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Chunking engine settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval settings. `top_k` and `similarity_threshold` have no default.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// SSE framing settings.
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Retry and circuit breaker settings.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Ingestion worker settings.
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// HTTP crawler settings.
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prometheus exposition settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// Authentication configuration.
///
/// A request authenticates either with the bearer token or with one of the
/// API keys. Secrets are redacted from `Debug` output.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Expected bearer token. Requests presenting a bearer token fail with a
    /// server error when this is unset and no API key matches.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Tenant assigned to bearer-token callers.
    #[serde(default = "default_tenant")]
    pub bearer_tenant_id: String,

    /// User assigned to bearer-token callers.
    #[serde(default = "default_tenant")]
    pub bearer_user_id: String,

    /// Accepted API keys and the identity each resolves to.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            bearer_tenant_id: default_tenant(),
            bearer_user_id: default_tenant(),
            api_keys: Vec::new(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[redacted]"))
            .field("bearer_tenant_id", &self.bearer_tenant_id)
            .field("bearer_user_id", &self.bearer_user_id)
            .field("api_keys", &self.api_keys)
            .finish()
    }
}

fn default_tenant() -> String {
    "default".to_string()
}

/// One accepted API key.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    pub key: String,

    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    #[serde(default = "default_tenant")]
    pub user_id: String,
}

impl std::fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyConfig")
            .field("key", &"[redacted]")
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// OpenAI-compatible provider configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. Falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Dimensionality of the embedding model's vectors.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Maximum tokens generated per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            chat_model: default_chat_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("chat_model", &self.chat_model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> usize {
    1536
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.2
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Chunking engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,

    #[serde(default = "default_chunk_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Tiktoken encoding name, e.g. `cl100k_base` or `o200k_base`.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_tokens: default_min_tokens(),
            max_tokens: default_chunk_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
            encoding: default_encoding(),
        }
    }
}

fn default_min_tokens() -> usize {
    400
}

fn default_chunk_max_tokens() -> usize {
    600
}

fn default_overlap_tokens() -> usize {
    75
}

fn default_encoding() -> String {
    "cl100k_base".to_string()
}

/// Retrieval configuration.
///
/// `top_k` and `similarity_threshold` are deployment-specific and must be
/// set explicitly; validation reports them as missing otherwise.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Chunks fetched per knowledge space.
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Minimum cosine similarity for a chunk to count as relevant.
    #[serde(default)]
    pub similarity_threshold: Option<f32>,

    /// Chunks kept for the prompt after merging and filtering.
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,

    /// Distinct source URLs reported as citations.
    #[serde(default = "default_max_cited_urls")]
    pub max_cited_urls: usize,

    /// Previous turns of a conversation replayed into the prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: None,
            similarity_threshold: None,
            max_context_chunks: default_max_context_chunks(),
            max_cited_urls: default_max_cited_urls(),
            history_turns: default_history_turns(),
        }
    }
}

fn default_max_context_chunks() -> usize {
    5
}

fn default_max_cited_urls() -> usize {
    3
}

fn default_history_turns() -> usize {
    5
}

/// SSE framing configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    /// Content bytes per frame. Out-of-range values fall back to the default.
    #[serde(default)]
    pub chunk_bytes: Option<usize>,

    /// Mid-stream pause between content frames, in milliseconds.
    #[serde(default)]
    pub frame_delay_ms: u64,
}

/// Retry and circuit breaker configuration, applied per downstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResilienceConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive failures that open a breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds a breaker stays open before a trial call.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    30
}

/// Ingestion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestionConfig {
    /// Source URLs processed concurrently within one ingestion run.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}

/// HTTP crawler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlerConfig {
    #[serde(default = "default_crawler_timeout_secs")]
    pub timeout_secs: u64,

    /// Responses larger than this are rejected.
    #[serde(default = "default_crawler_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Allow fetching loopback and private-range addresses.
    #[serde(default)]
    pub allow_private_ips: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_crawler_timeout_secs(),
            max_body_bytes: default_crawler_max_body_bytes(),
            allow_private_ips: false,
            user_agent: default_user_agent(),
        }
    }
}

fn default_crawler_timeout_secs() -> u64 {
    30
}

fn default_crawler_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_user_agent() -> String {
    concat!("ragline/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Which repository implementation backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("ragline").join("ragline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("ragline.db"))
        .display()
        .to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the recorder and serve `GET /metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}
