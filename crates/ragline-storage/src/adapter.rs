// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of every repository trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use ragline_config::model::StorageConfig;
use ragline_core::{
    AdapterType, Agent, AgentRepository, Chunk, Conversation, ConversationRepository,
    EmbeddedChunk, Embedding, HealthStatus, KnowledgeSpace, KnowledgeSpaceRepository, Namespace,
    PluginAdapter, RaglineError, ScoredChunk, VectorRepository,
};

use crate::database::{Database, map_tr_err};
use crate::queries;
use crate::vector::rank;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// The database connection is not opened until [`initialize`](Self::initialize) is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    pub async fn initialize(&self) -> Result<(), RaglineError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| RaglineError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Checkpoints the WAL before shutdown.
    pub async fn close(&self) -> Result<(), RaglineError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }

    fn db(&self) -> Result<&Database, RaglineError> {
        self.db.get().ok_or_else(|| RaglineError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Repository
    }

    async fn health_check(&self) -> Result<HealthStatus, RaglineError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl VectorRepository for SqliteStore {
    async fn upsert(&self, namespace: &Namespace, chunks: Vec<EmbeddedChunk>) -> Result<(), RaglineError> {
        queries::chunks::upsert(self.db()?, namespace, chunks).await
    }

    async fn query(
        &self,
        namespace: &Namespace,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RaglineError> {
        let candidates = queries::chunks::load_embedded(self.db()?, namespace).await?;
        rank(embedding, candidates, top_k)
    }

    async fn list_chunks(&self, namespace: &Namespace) -> Result<Vec<Chunk>, RaglineError> {
        let rows = queries::chunks::load_embedded(self.db()?, namespace).await?;
        Ok(rows.into_iter().map(|(chunk, _)| chunk).collect())
    }

    async fn delete_space(&self, tenant_id: &str, knowledge_space_id: &str) -> Result<usize, RaglineError> {
        queries::chunks::delete_space(self.db()?, tenant_id, knowledge_space_id).await
    }
}

#[async_trait]
impl KnowledgeSpaceRepository for SqliteStore {
    async fn save(&self, space: &KnowledgeSpace) -> Result<(), RaglineError> {
        queries::spaces::save(self.db()?, space).await
    }

    async fn find(
        &self,
        tenant_id: &str,
        knowledge_space_id: &str,
    ) -> Result<Option<KnowledgeSpace>, RaglineError> {
        queries::spaces::find(self.db()?, tenant_id, knowledge_space_id).await
    }

    async fn find_by_tenant(&self, tenant_id: &str) -> Result<Vec<KnowledgeSpace>, RaglineError> {
        queries::spaces::find_by_tenant(self.db()?, tenant_id).await
    }

    async fn delete(&self, tenant_id: &str, knowledge_space_id: &str) -> Result<bool, RaglineError> {
        queries::spaces::delete(self.db()?, tenant_id, knowledge_space_id).await
    }
}

#[async_trait]
impl AgentRepository for SqliteStore {
    async fn save(&self, agent: &Agent) -> Result<(), RaglineError> {
        queries::agents::save(self.db()?, agent).await
    }

    async fn find(&self, tenant_id: &str, agent_id: &str) -> Result<Option<Agent>, RaglineError> {
        queries::agents::find(self.db()?, tenant_id, agent_id).await
    }
}

#[async_trait]
impl ConversationRepository for SqliteStore {
    async fn append(&self, conversation: &Conversation) -> Result<(), RaglineError> {
        queries::conversations::append(self.db()?, conversation).await
    }

    async fn recent(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Conversation>, RaglineError> {
        queries::conversations::recent(self.db()?, tenant_id, conversation_id, limit).await
    }
}
