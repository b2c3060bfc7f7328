// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete ingestion and chat graph over mock
//! collaborators and an in-memory (or temp SQLite) store, wired the same way
//! the server wires it: every external call goes through a guarded wrapper
//! backed by a shared breaker registry.

use std::sync::Arc;
use std::time::Duration;

use ragline_chat::{
    AgentService, ChatEvent, ChatReply, ChatRequest, ChatService, CreateAgentRequest,
    RetrievalPolicy, Retriever,
};
use ragline_config::model::{StorageBackend, StorageConfig};
use ragline_core::{
    Agent, AgentPreset, ChatMessage, CrawlerService, EmbeddingService, LlmService, RaglineError,
    TiktokenTokenizer, Tokenizer, VectorRepository,
};
use ragline_knowledge::{
    ChunkConfig, Chunker, IngestKnowledgeSpace, IngestOutcome, IngestProductCatalog,
    IngestRequest, KnowledgeSpaceCatalog,
};
use ragline_resilience::{
    BreakerConfig, BreakerRegistry, GuardedCrawler, GuardedEmbedding, GuardedLlm,
    GuardedVectors, RetryPolicy, registry,
};
use ragline_storage::{Repositories, open_repositories};
use tokio_util::sync::CancellationToken;

use crate::mock_provider::MockLlm;
use crate::mock_services::{MockCrawler, MockEmbedder};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    llm_failure: Option<u16>,
    similarity_threshold: f32,
    top_k: usize,
    sqlite: bool,
    breaker: BreakerConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            llm_failure: None,
            similarity_threshold: 0.35,
            top_k: 5,
            sqlite: false,
            breaker: BreakerConfig {
                failure_threshold: 3,
                cooldown: Duration::from_secs(30),
            },
        }
    }

    /// Set mock LLM responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Make every LLM call fail with `status`.
    pub fn with_failing_llm(mut self, status: u16) -> Self {
        self.llm_failure = Some(status);
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_breaker(mut self, failure_threshold: u32, cooldown: Duration) -> Self {
        self.breaker = BreakerConfig {
            failure_threshold,
            cooldown,
        };
        self
    }

    /// Persist to a SQLite database in a temp directory instead of memory.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, RaglineError> {
        let temp_dir = if self.sqlite {
            Some(tempfile::TempDir::new().map_err(RaglineError::storage)?)
        } else {
            None
        };
        let storage = match &temp_dir {
            Some(dir) => StorageConfig {
                backend: StorageBackend::Sqlite,
                database_path: dir.path().join("test.db").to_string_lossy().to_string(),
            },
            None => StorageConfig {
                backend: StorageBackend::Memory,
                ..StorageConfig::default()
            },
        };
        let repositories = open_repositories(&storage).await?;

        let crawler = Arc::new(MockCrawler::new());
        let embedder = Arc::new(MockEmbedder::new());
        let llm = Arc::new(match self.llm_failure {
            Some(status) => MockLlm::failing(status),
            None => MockLlm::with_responses(self.responses),
        });

        let breakers = Arc::new(BreakerRegistry::new(
            self.breaker,
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(5)),
        ));
        let guarded_crawler: Arc<dyn CrawlerService> = Arc::new(GuardedCrawler::new(
            crawler.clone(),
            breakers.guard(registry::CRAWLER),
        ));
        let guarded_embedder: Arc<dyn EmbeddingService> = Arc::new(GuardedEmbedding::new(
            embedder.clone(),
            breakers.guard(registry::EMBEDDING),
        ));
        let guarded_llm: Arc<dyn LlmService> =
            Arc::new(GuardedLlm::new(llm.clone(), breakers.guard(registry::LLM)));
        let vectors: Arc<dyn VectorRepository> = Arc::new(GuardedVectors::new(
            repositories.vectors.clone(),
            breakers.guard(registry::VECTOR_STORE),
        ));

        let tokenizer: Arc<dyn Tokenizer> = Arc::new(TiktokenTokenizer::new(Default::default())?);
        let chunker = Chunker::new(
            tokenizer.clone(),
            ChunkConfig {
                min_tokens: 20,
                max_tokens: 80,
                overlap_tokens: 10,
            },
        )?;

        let ingest = Arc::new(IngestKnowledgeSpace::new(
            guarded_crawler,
            guarded_embedder.clone(),
            vectors.clone(),
            repositories.spaces.clone(),
            chunker,
            4,
        ));
        let products = Arc::new(IngestProductCatalog::new(
            guarded_embedder.clone(),
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
            guarded_embedder,
            vectors,
            repositories.spaces.clone(),
            RetrievalPolicy {
                top_k: self.top_k,
                similarity_threshold: self.similarity_threshold,
                max_context_chunks: 5,
                max_cited_urls: 3,
            },
        ));
        let chat = Arc::new(ChatService::new(
            repositories.agents.clone(),
            repositories.conversations.clone(),
            retriever,
            guarded_llm,
            5,
        ));

        Ok(TestHarness {
            crawler,
            embedder,
            llm,
            repositories,
            breakers,
            ingest,
            products,
            catalog,
            agents,
            chat,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    pub crawler: Arc<MockCrawler>,
    pub embedder: Arc<MockEmbedder>,
    pub llm: Arc<MockLlm>,
    pub repositories: Repositories,
    pub breakers: Arc<BreakerRegistry>,
    pub ingest: Arc<IngestKnowledgeSpace>,
    pub products: Arc<IngestProductCatalog>,
    pub catalog: Arc<KnowledgeSpaceCatalog>,
    pub agents: Arc<AgentService>,
    pub chat: Arc<ChatService>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Ingest `urls` as a new web knowledge space for `tenant`.
    pub async fn ingest(&self, tenant: &str, name: &str, urls: &[&str]) -> Result<IngestOutcome, RaglineError> {
        self.ingest
            .execute(IngestRequest {
                tenant_id: tenant.to_string(),
                name: name.to_string(),
                source_urls: urls.iter().map(|u| u.to_string()).collect(),
                request_id: None,
            })
            .await
    }

    pub async fn create_agent(
        &self,
        tenant: &str,
        knowledge_space_ids: &[&str],
        strict_rag: bool,
    ) -> Result<Agent, RaglineError> {
        self.agents
            .create(CreateAgentRequest {
                tenant_id: tenant.to_string(),
                name: "test agent".to_string(),
                knowledge_space_ids: knowledge_space_ids.iter().map(|s| s.to_string()).collect(),
                strict_rag,
                system_prompt: None,
                preset: AgentPreset::None,
            })
            .await
    }

    fn request(tenant: &str, agent_id: &str, message: &str) -> ChatRequest {
        ChatRequest {
            tenant_id: tenant.to_string(),
            user_id: "test-user".to_string(),
            agent_id: agent_id.to_string(),
            messages: vec![ChatMessage::user(message)],
            conversation_id: None,
            request_id: None,
        }
    }

    /// One non-streamed turn.
    pub async fn chat(&self, tenant: &str, agent_id: &str, message: &str) -> Result<ChatReply, RaglineError> {
        self.chat.complete(Self::request(tenant, agent_id, message)).await
    }

    /// One streamed turn, collected until the stream ends.
    pub async fn chat_stream(
        &self,
        tenant: &str,
        agent_id: &str,
        message: &str,
    ) -> Result<(String, Vec<ChatEvent>), RaglineError> {
        let mut stream = self
            .chat
            .stream(Self::request(tenant, agent_id, message), CancellationToken::new())
            .await?;
        let mut events = Vec::new();
        while let Some(event) = stream.events.recv().await {
            events.push(event);
        }
        Ok((stream.conversation_id, events))
    }
}
