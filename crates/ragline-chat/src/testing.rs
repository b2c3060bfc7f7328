// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborators and fixtures for this crate's unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ragline_core::{
    AdapterType, Agent, AgentSpec, Chunk, EmbeddedChunk, Embedding, EmbeddingService,
    HealthStatus, IngestionSummary, KnowledgeSpace, KnowledgeSpaceRepository,
    KnowledgeSpaceStatus, KnowledgeSpaceType, LlmService, PluginAdapter, RaglineError,
    TokenStream, VectorRepository,
};
use ragline_storage::MemoryStore;

use crate::retrieval::RetrievalPolicy;

macro_rules! test_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }
            fn version(&self) -> semver::Version {
                semver::Version::new(0, 0, 0)
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

const KEYWORDS: [&str; 3] = ["ship", "return", "price"];

/// One axis per keyword plus a small bias so unrelated text is near-orthogonal.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Embedding {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect();
        v.push(0.001);
        Embedding::new(v, KEYWORDS.len() + 1).unwrap()
    }
}

test_adapter!(KeywordEmbedder, "keyword-embedder", AdapterType::Embedding);

#[async_trait]
impl EmbeddingService for KeywordEmbedder {
    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }

    async fn embed(&self, text: &str) -> Result<Embedding, RaglineError> {
        Ok(Self::vector(text))
    }
}

/// Sets its flag when dropped, to observe stream teardown.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Replays fixed tokens, optionally hanging afterwards or failing mid-stream.
#[derive(Default)]
pub struct ScriptedLlm {
    pub tokens: Vec<String>,
    pub hang_after_tokens: bool,
    pub fail_after_tokens: bool,
    pub calls: AtomicUsize,
    pub prompts: std::sync::Mutex<Vec<String>>,
    pub stream_dropped: Arc<AtomicBool>,
}

impl ScriptedLlm {
    pub fn replying(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    fn record(&self, prompt: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
    }
}

test_adapter!(ScriptedLlm, "scripted-llm", AdapterType::Llm);

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String, RaglineError> {
        self.record(prompt);
        if self.fail_after_tokens {
            return Err(RaglineError::external("llm", "upstream exploded"));
        }
        Ok(self.tokens.concat())
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream, RaglineError> {
        self.record(prompt);
        let guard = DropFlag(Arc::clone(&self.stream_dropped));
        let head = stream::iter(self.tokens.clone().into_iter().map(Ok));
        let tail: TokenStream = if self.hang_after_tokens {
            Box::pin(stream::pending())
        } else if self.fail_after_tokens {
            Box::pin(stream::once(async {
                Err(RaglineError::external("llm", "upstream exploded"))
            }))
        } else {
            Box::pin(stream::empty())
        };
        Ok(Box::pin(head.chain(tail).map(move |item| {
            let _keep = &guard;
            item
        })))
    }
}

pub fn policy() -> RetrievalPolicy {
    RetrievalPolicy {
        top_k: 5,
        similarity_threshold: 0.35,
        max_context_chunks: 5,
        max_cited_urls: 3,
    }
}

pub fn agent(tenant: &str, id: &str, spaces: &[&str], strict_rag: bool) -> Agent {
    Agent::new(AgentSpec {
        tenant_id: tenant.into(),
        agent_id: id.into(),
        name: format!("agent {id}"),
        knowledge_space_ids: spaces.iter().map(|s| s.to_string()).collect(),
        strict_rag,
        ..Default::default()
    })
    .unwrap()
}

/// Stores a completed web space whose chunks are `(url, text)` pairs.
pub async fn seed_space(store: &Arc<MemoryStore>, tenant: &str, ks_id: &str, docs: &[(&str, &str)]) {
    let space = KnowledgeSpace {
        tenant_id: tenant.into(),
        knowledge_space_id: ks_id.into(),
        name: ks_id.into(),
        space_type: KnowledgeSpaceType::Web,
        source_urls: docs.iter().map(|(u, _)| u.to_string()).collect(),
        current_version: "v1".into(),
        status: KnowledgeSpaceStatus::Completed,
        document_count: docs.len(),
        summary: IngestionSummary {
            success_count: docs.len(),
            failure_count: 0,
            errors: vec![],
        },
        created_at: chrono::Utc::now(),
    };
    let chunks = docs
        .iter()
        .enumerate()
        .map(|(i, (url, text))| EmbeddedChunk {
            chunk: Chunk {
                knowledge_space_id: ks_id.into(),
                version: "v1".into(),
                chunk_id: format!("{ks_id}-{i}"),
                source_url: url.to_string(),
                title: None,
                text: text.to_string(),
                token_count: text.split_whitespace().count(),
            },
            embedding: KeywordEmbedder::vector(text),
        })
        .collect();
    store
        .upsert(&space.current_namespace(), chunks)
        .await
        .unwrap();
    KnowledgeSpaceRepository::save(store.as_ref(), &space)
        .await
        .unwrap();
}
