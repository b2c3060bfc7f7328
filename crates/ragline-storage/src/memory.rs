// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local store used by tests and the `memory` storage backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use ragline_core::{
    AdapterType, Agent, AgentRepository, Chunk, Conversation, ConversationRepository,
    EmbeddedChunk, Embedding, HealthStatus, KnowledgeSpace, KnowledgeSpaceRepository, Namespace,
    PluginAdapter, RaglineError, ScoredChunk, VectorRepository,
};

use crate::vector::rank;

type Key = (String, String);

fn key(tenant_id: &str, id: &str) -> Key {
    (tenant_id.to_string(), id.to_string())
}

#[derive(Default)]
pub struct MemoryStore {
    // Per namespace, chunk id -> (insertion seq, chunk)
    vectors: RwLock<HashMap<Namespace, BTreeMap<String, (u64, EmbeddedChunk)>>>,
    spaces: RwLock<HashMap<Key, (u64, KnowledgeSpace)>>,
    agents: RwLock<HashMap<Key, Agent>>,
    conversations: RwLock<Vec<Conversation>>,
    seq: std::sync::atomic::AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    async fn ordered(&self, namespace: &Namespace) -> Vec<EmbeddedChunk> {
        let vectors = self.vectors.read().await;
        let mut rows: Vec<_> = vectors
            .get(namespace)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, c)| c).collect()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Repository
    }

    async fn health_check(&self) -> Result<HealthStatus, RaglineError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl VectorRepository for MemoryStore {
    async fn upsert(&self, namespace: &Namespace, chunks: Vec<EmbeddedChunk>) -> Result<(), RaglineError> {
        let mut vectors = self.vectors.write().await;
        let entry = vectors.entry(namespace.clone()).or_default();
        for chunk in chunks {
            let seq = self.next_seq();
            entry.insert(chunk.chunk.chunk_id.clone(), (seq, chunk));
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &Namespace,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RaglineError> {
        let candidates = self
            .ordered(namespace)
            .await
            .into_iter()
            .map(|c| (c.chunk, c.embedding));
        rank(embedding, candidates, top_k)
    }

    async fn list_chunks(&self, namespace: &Namespace) -> Result<Vec<Chunk>, RaglineError> {
        Ok(self.ordered(namespace).await.into_iter().map(|c| c.chunk).collect())
    }

    async fn delete_space(&self, tenant_id: &str, knowledge_space_id: &str) -> Result<usize, RaglineError> {
        let mut vectors = self.vectors.write().await;
        let mut removed = 0;
        vectors.retain(|ns, chunks| {
            let hit = ns.tenant_id == tenant_id && ns.knowledge_space_id == knowledge_space_id;
            if hit {
                removed += chunks.len();
            }
            !hit
        });
        Ok(removed)
    }
}

#[async_trait]
impl KnowledgeSpaceRepository for MemoryStore {
    async fn save(&self, space: &KnowledgeSpace) -> Result<(), RaglineError> {
        let seq = self.next_seq();
        self.spaces.write().await.insert(
            key(&space.tenant_id, &space.knowledge_space_id),
            (seq, space.clone()),
        );
        Ok(())
    }

    async fn find(
        &self,
        tenant_id: &str,
        knowledge_space_id: &str,
    ) -> Result<Option<KnowledgeSpace>, RaglineError> {
        Ok(self
            .spaces
            .read()
            .await
            .get(&key(tenant_id, knowledge_space_id))
            .map(|(_, s)| s.clone()))
    }

    async fn find_by_tenant(&self, tenant_id: &str) -> Result<Vec<KnowledgeSpace>, RaglineError> {
        let spaces = self.spaces.read().await;
        let mut found: Vec<_> = spaces
            .iter()
            .filter(|((tenant, _), _)| tenant == tenant_id)
            .map(|(_, (seq, s))| (*seq, s.clone()))
            .collect();
        found.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
        Ok(found.into_iter().map(|(_, s)| s).collect())
    }

    async fn delete(&self, tenant_id: &str, knowledge_space_id: &str) -> Result<bool, RaglineError> {
        Ok(self
            .spaces
            .write()
            .await
            .remove(&key(tenant_id, knowledge_space_id))
            .is_some())
    }
}

#[async_trait]
impl AgentRepository for MemoryStore {
    async fn save(&self, agent: &Agent) -> Result<(), RaglineError> {
        self.agents
            .write()
            .await
            .insert(key(&agent.tenant_id, &agent.agent_id), agent.clone());
        Ok(())
    }

    async fn find(&self, tenant_id: &str, agent_id: &str) -> Result<Option<Agent>, RaglineError> {
        Ok(self.agents.read().await.get(&key(tenant_id, agent_id)).cloned())
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn append(&self, conversation: &Conversation) -> Result<(), RaglineError> {
        self.conversations.write().await.push(conversation.clone());
        Ok(())
    }

    async fn recent(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Conversation>, RaglineError> {
        let log = self.conversations.read().await;
        let mut turns: Vec<_> = log
            .iter()
            .rev()
            .filter(|c| c.tenant_id == tenant_id && c.conversation_id == conversation_id)
            .take(limit)
            .cloned()
            .collect();
        turns.reverse();
        Ok(turns)
    }
}
