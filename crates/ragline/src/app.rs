// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Use-case graph construction.
//!
//! Every collaborator is built once here and handed to the use cases
//! explicitly. Downstream calls go through guards from one shared
//! [`BreakerRegistry`].

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use ragline_chat::{AgentService, ChatService, RetrievalPolicy, Retriever};
use ragline_config::RaglineConfig;
use ragline_config::model::ResilienceConfig;
use ragline_core::{
    CrawlerService, EmbeddingService, LlmService, RaglineError, TiktokenTokenizer,
    Tokenizer, VectorRepository,
};
use ragline_knowledge::{
    ChunkConfig, Chunker, CrawlerOptions, HttpCrawler, IngestKnowledgeSpace, IngestProductCatalog,
    KnowledgeSpaceCatalog,
};
use ragline_openai::{OpenAiChat, OpenAiEmbedder};
use ragline_resilience::{
    BreakerConfig, BreakerRegistry, GuardedCrawler, GuardedEmbedding, GuardedLlm, GuardedVectors,
    RetryPolicy, registry,
};
use ragline_storage::{Repositories, open_repositories};

/// Raw downstream clients, before guarding.
pub struct Collaborators {
    pub crawler: Arc<dyn CrawlerService>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub llm: Arc<dyn LlmService>,
}

impl Collaborators {
    /// OpenAI-compatible providers and the HTTP crawler.
    pub fn from_config(config: &RaglineConfig) -> Result<Self, RaglineError> {
        let crawler = HttpCrawler::new(CrawlerOptions {
            timeout: Duration::from_secs(config.crawler.timeout_secs),
            max_body_bytes: config.crawler.max_body_bytes,
            allow_private_ips: config.crawler.allow_private_ips,
            user_agent: config.crawler.user_agent.clone(),
        })?;
        Ok(Self {
            crawler: Arc::new(crawler),
            embedder: Arc::new(OpenAiEmbedder::from_config(&config.openai)?),
            llm: Arc::new(OpenAiChat::from_config(&config.openai)?),
        })
    }
}

/// The assembled use cases plus the shared infrastructure they run on.
pub struct Services {
    pub repositories: Repositories,
    pub breakers: Arc<BreakerRegistry>,
    pub ingest: Arc<IngestKnowledgeSpace>,
    pub products: Arc<IngestProductCatalog>,
    pub catalog: Arc<KnowledgeSpaceCatalog>,
    pub agents: Arc<AgentService>,
    pub chat: Arc<ChatService>,
}

pub fn breaker_registry(config: &ResilienceConfig) -> BreakerRegistry {
    BreakerRegistry::new(
        BreakerConfig {
            failure_threshold: config.failure_threshold,
            cooldown: Duration::from_secs(config.cooldown_secs),
        },
        RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        ),
    )
}

fn tokenizer(config: &RaglineConfig) -> Result<Arc<dyn Tokenizer>, RaglineError> {
    Ok(Arc::new(TiktokenTokenizer::from_name(&config.chunking.encoding)?))
}

fn chunker(config: &RaglineConfig, tokenizer: Arc<dyn Tokenizer>) -> Result<Chunker, RaglineError> {
    Chunker::new(
        tokenizer,
        ChunkConfig {
            min_tokens: config.chunking.min_tokens,
            max_tokens: config.chunking.max_tokens,
            overlap_tokens: config.chunking.overlap_tokens,
        },
    )
}

/// Opens storage and wires every use case over guarded collaborators.
pub async fn build_services(
    config: &RaglineConfig,
    collaborators: Collaborators,
) -> Result<Services, RaglineError> {
    let policy = RetrievalPolicy::from_config(&config.retrieval)?;
    let tokenizer = tokenizer(config)?;
    let chunker = chunker(config, tokenizer.clone())?;

    let repositories = open_repositories(&config.storage).await?;
    info!(backend = ?config.storage.backend, "storage opened");

    let breakers = Arc::new(breaker_registry(&config.resilience));
    let crawler: Arc<dyn CrawlerService> = Arc::new(GuardedCrawler::new(
        collaborators.crawler,
        breakers.guard(registry::CRAWLER),
    ));
    let embedder: Arc<dyn EmbeddingService> = Arc::new(GuardedEmbedding::new(
        collaborators.embedder,
        breakers.guard(registry::EMBEDDING),
    ));
    let llm: Arc<dyn LlmService> = Arc::new(GuardedLlm::new(
        collaborators.llm,
        breakers.guard(registry::LLM),
    ));
    let vectors: Arc<dyn VectorRepository> = Arc::new(GuardedVectors::new(
        repositories.vectors.clone(),
        breakers.guard(registry::VECTOR_STORE),
    ));

    let ingest = Arc::new(IngestKnowledgeSpace::new(
        crawler,
        embedder.clone(),
        vectors.clone(),
        repositories.spaces.clone(),
        chunker,
        config.ingestion.max_concurrency,
    ));
    let products = Arc::new(IngestProductCatalog::new(
        embedder.clone(),
        vectors.clone(),
        repositories.spaces.clone(),
        tokenizer,
    ));
    let catalog = Arc::new(KnowledgeSpaceCatalog::new(
        repositories.spaces.clone(),
        vectors.clone(),
    ));
    let agents = Arc::new(AgentService::new(
        repositories.agents.clone(),
        repositories.spaces.clone(),
    ));
    let retriever = Arc::new(Retriever::new(
        embedder,
        vectors,
        repositories.spaces.clone(),
        policy,
    ));
    let chat = Arc::new(ChatService::new(
        repositories.agents.clone(),
        repositories.conversations.clone(),
        retriever,
        llm,
        config.retrieval.history_turns,
    ));

    Ok(Services {
        repositories,
        breakers,
        ingest,
        products,
        catalog,
        agents,
        chat,
    })
}

/// Runs the checks `serve` would fail on at startup and summarizes the
/// effective settings. Secrets are reported only as present or absent.
pub fn check_config(config: &RaglineConfig) -> Result<String, RaglineError> {
    let policy = RetrievalPolicy::from_config(&config.retrieval)?;
    let tokenizer = tokenizer(config)?;
    chunker(config, tokenizer.clone())?;

    let present = |set: bool| if set { "set" } else { "missing" };
    Ok(format!(
        "configuration OK\n\
         server: {}:{}\n\
         storage: {:?} ({})\n\
         tokenizer: {}\n\
         chunking: {}-{} tokens, overlap {}\n\
         retrieval: top_k={} threshold={} max_context={} max_cited={}\n\
         openai.api_key: {}\n\
         auth: bearer token {}, {} api key(s)\n\
         metrics: {}",
        config.server.host,
        config.server.port,
        config.storage.backend,
        config.storage.database_path,
        tokenizer.name(),
        config.chunking.min_tokens,
        config.chunking.max_tokens,
        config.chunking.overlap_tokens,
        policy.top_k,
        policy.similarity_threshold,
        policy.max_context_chunks,
        policy.max_cited_urls,
        present(config.openai.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())),
        present(config.auth.bearer_token.is_some()),
        config.auth.api_keys.len(),
        if config.metrics.enabled { "enabled" } else { "disabled" },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_config::model::StorageBackend;
    use ragline_core::{HealthStatus, KnowledgeSpaceStatus};
    use ragline_knowledge::IngestRequest;
    use ragline_test_utils::{MockCrawler, MockEmbedder, MockLlm};

    fn config() -> RaglineConfig {
        let mut config = RaglineConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.retrieval.top_k = Some(4);
        config.retrieval.similarity_threshold = Some(0.2);
        config.chunking.min_tokens = 20;
        config.chunking.max_tokens = 60;
        config.chunking.overlap_tokens = 5;
        config
    }

    fn mocks(crawler: MockCrawler) -> Collaborators {
        Collaborators {
            crawler: Arc::new(crawler),
            embedder: Arc::new(MockEmbedder::new()),
            llm: Arc::new(MockLlm::new()),
        }
    }

    #[tokio::test]
    async fn wired_graph_ingests_and_lists() {
        let crawler = MockCrawler::new().with_page(
            "https://docs.example/a",
            "A",
            "Ragline answers questions from ingested documentation pages.",
        );
        let services = build_services(&config(), mocks(crawler)).await.unwrap();

        let outcome = services
            .ingest
            .execute(IngestRequest {
                tenant_id: "t1".into(),
                name: "docs".into(),
                source_urls: vec!["https://docs.example/a".into()],
                request_id: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, KnowledgeSpaceStatus::Completed);
        assert_eq!(services.catalog.list("t1").await.unwrap().len(), 1);
        assert_eq!(
            services.repositories.health.health_check().await.unwrap(),
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn all_four_breakers_are_registered() {
        let services = build_services(&config(), mocks(MockCrawler::new())).await.unwrap();
        let names: Vec<String> = services
            .breakers
            .snapshot()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["crawler", "embedding", "llm", "vector_store"]);
    }

    #[tokio::test]
    async fn retrieval_settings_are_required() {
        let mut config = config();
        config.retrieval.top_k = None;
        let err = build_services(&config, mocks(MockCrawler::new())).await.err().unwrap();
        assert!(matches!(err, RaglineError::Config(_)));
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let mut config = config();
        config.chunking.encoding = "p50k".into();
        assert!(matches!(check_config(&config), Err(RaglineError::Config(_))));
    }

    #[test]
    fn check_summary_hides_secrets() {
        let mut config = config();
        config.openai.api_key = Some("sk-live-secret".into());
        let summary = check_config(&config).unwrap();
        assert!(summary.starts_with("configuration OK"));
        assert!(summary.contains("openai.api_key: set"));
        assert!(!summary.contains("sk-live-secret"));
    }

    #[test]
    fn provider_key_is_required_for_real_collaborators() {
        let config = config();
        assert!(matches!(
            Collaborators::from_config(&config).err(),
            Some(RaglineError::Config(_))
        ));
    }
}
