// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository traits for vectors and metadata.
//!
//! Every method takes the tenant explicitly. Implementations must scope reads
//! and writes by key, never by filtering a wider result set afterwards.

use async_trait::async_trait;

use crate::error::RaglineError;
use crate::types::{Agent, Chunk, Conversation, EmbeddedChunk, Embedding, KnowledgeSpace, Namespace, ScoredChunk};

/// Stores embedded chunks keyed by `(tenant, knowledge space, version, chunk)`.
#[async_trait]
pub trait VectorRepository: Send + Sync + 'static {
    /// Inserts or replaces chunks in `namespace`.
    async fn upsert(
        &self,
        namespace: &Namespace,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<(), RaglineError>;

    /// Returns up to `top_k` chunks of `namespace`, highest cosine similarity first.
    async fn query(
        &self,
        namespace: &Namespace,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RaglineError>;

    /// Lists the chunks stored in `namespace`, in insertion order.
    async fn list_chunks(&self, namespace: &Namespace) -> Result<Vec<Chunk>, RaglineError>;

    /// Removes every version of a knowledge space. Returns the number of chunks deleted.
    async fn delete_space(
        &self,
        tenant_id: &str,
        knowledge_space_id: &str,
    ) -> Result<usize, RaglineError>;
}

/// Persists knowledge-space metadata keyed by `(tenant, id)`.
#[async_trait]
pub trait KnowledgeSpaceRepository: Send + Sync + 'static {
    async fn save(&self, space: &KnowledgeSpace) -> Result<(), RaglineError>;

    async fn find(
        &self,
        tenant_id: &str,
        knowledge_space_id: &str,
    ) -> Result<Option<KnowledgeSpace>, RaglineError>;

    /// All spaces of a tenant, newest first.
    async fn find_by_tenant(&self, tenant_id: &str) -> Result<Vec<KnowledgeSpace>, RaglineError>;

    /// Returns whether a record was removed.
    async fn delete(&self, tenant_id: &str, knowledge_space_id: &str)
    -> Result<bool, RaglineError>;
}

/// Persists agents keyed by `(tenant, id)`.
#[async_trait]
pub trait AgentRepository: Send + Sync + 'static {
    async fn save(&self, agent: &Agent) -> Result<(), RaglineError>;

    async fn find(&self, tenant_id: &str, agent_id: &str) -> Result<Option<Agent>, RaglineError>;
}

/// Append-only conversation log.
#[async_trait]
pub trait ConversationRepository: Send + Sync + 'static {
    async fn append(&self, conversation: &Conversation) -> Result<(), RaglineError>;

    /// Most recent turns of a conversation thread, oldest first.
    async fn recent(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Conversation>, RaglineError>;
}
