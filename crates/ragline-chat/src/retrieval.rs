// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-scoped retrieval across an agent's knowledge spaces.
//!
//! Each referenced space is queried in its current-version namespace, which
//! always carries the requesting tenant, so chunks of another tenant are
//! unreachable by construction. Results are merged, filtered by the
//! similarity threshold, ranked, and cut to the context budget.

use std::sync::Arc;

use futures::future::try_join_all;
use metrics::histogram;
use tracing::{debug, warn};

use ragline_config::model::RetrievalConfig;
use ragline_core::{
    Agent, EmbeddingService, KnowledgeSpaceRepository, RaglineError, ScoredChunk,
    VectorRepository,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    /// Candidates fetched per knowledge space.
    pub top_k: usize,
    /// Chunks scoring below this are discarded.
    pub similarity_threshold: f32,
    pub max_context_chunks: usize,
    pub max_cited_urls: usize,
}

impl RetrievalPolicy {
    /// `top_k` and `similarity_threshold` have no defaults and must be configured.
    pub fn from_config(config: &RetrievalConfig) -> Result<Self, RaglineError> {
        let top_k = config
            .top_k
            .ok_or_else(|| RaglineError::Config("retrieval.top_k must be configured".into()))?;
        let similarity_threshold = config.similarity_threshold.ok_or_else(|| {
            RaglineError::Config("retrieval.similarity_threshold must be configured".into())
        })?;
        Ok(Self {
            top_k,
            similarity_threshold,
            max_context_chunks: config.max_context_chunks,
            max_cited_urls: config.max_cited_urls,
        })
    }
}

/// Chunks selected as context, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub chunks: Vec<ScoredChunk>,
    /// Distinct source URLs of `chunks` in rank order, capped.
    pub cited_urls: Vec<String>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingService>,
    vectors: Arc<dyn VectorRepository>,
    spaces: Arc<dyn KnowledgeSpaceRepository>,
    policy: RetrievalPolicy,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        vectors: Arc<dyn VectorRepository>,
        spaces: Arc<dyn KnowledgeSpaceRepository>,
        policy: RetrievalPolicy,
    ) -> Self {
        Self {
            embedder,
            vectors,
            spaces,
            policy,
        }
    }

    pub fn policy(&self) -> &RetrievalPolicy {
        &self.policy
    }

    pub async fn retrieve(&self, agent: &Agent, query: &str) -> Result<RetrievedContext, RaglineError> {
        let embedding = self.embedder.embed(query).await?;

        let lookups = agent.knowledge_space_ids().map(|ks_id| {
            let embedding = &embedding;
            async move {
                let Some(space) = self.spaces.find(&agent.tenant_id, ks_id).await? else {
                    warn!(
                        tenant_id = %agent.tenant_id,
                        agent_id = %agent.agent_id,
                        knowledge_space_id = ks_id,
                        "knowledge space referenced by agent not found, skipping"
                    );
                    return Ok::<_, RaglineError>(Vec::new());
                };
                self.vectors
                    .query(&space.current_namespace(), embedding, self.policy.top_k)
                    .await
            }
        });
        let candidates: Vec<ScoredChunk> = try_join_all(lookups).await?.into_iter().flatten().collect();
        let fetched = candidates.len();

        let context = select(candidates, &self.policy);
        histogram!("ragline_retrieval_hits").record(context.chunks.len() as f64);
        debug!(
            agent_id = %agent.agent_id,
            fetched,
            kept = context.chunks.len(),
            top_score = context.chunks.first().map(|c| c.score).unwrap_or_default(),
            threshold = self.policy.similarity_threshold,
            "retrieval complete"
        );
        Ok(context)
    }
}

/// Applies threshold, ranking, and both caps to merged candidates.
///
/// A chunk must score strictly above the threshold to count as context.
pub fn select(mut candidates: Vec<ScoredChunk>, policy: &RetrievalPolicy) -> RetrievedContext {
    candidates.retain(|c| c.score > policy.similarity_threshold);
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(policy.max_context_chunks);

    let mut cited_urls: Vec<String> = Vec::new();
    for c in &candidates {
        let url = &c.chunk.source_url;
        if cited_urls.len() >= policy.max_cited_urls {
            break;
        }
        if !url.is_empty() && !cited_urls.contains(url) {
            cited_urls.push(url.clone());
        }
    }

    RetrievedContext {
        chunks: candidates,
        cited_urls,
    }
}
