// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read and delete operations over a tenant's knowledge spaces.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use ragline_core::{Chunk, KnowledgeSpace, KnowledgeSpaceRepository, RaglineError, VectorRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub knowledge_space_id: String,
    pub deleted_chunks: usize,
}

pub struct KnowledgeSpaceCatalog {
    spaces: Arc<dyn KnowledgeSpaceRepository>,
    vectors: Arc<dyn VectorRepository>,
}

impl KnowledgeSpaceCatalog {
    pub fn new(spaces: Arc<dyn KnowledgeSpaceRepository>, vectors: Arc<dyn VectorRepository>) -> Self {
        Self { spaces, vectors }
    }

    /// Every space of the tenant, newest first.
    pub async fn list(&self, tenant_id: &str) -> Result<Vec<KnowledgeSpace>, RaglineError> {
        self.spaces.find_by_tenant(tenant_id).await
    }

    pub async fn get(
        &self,
        tenant_id: &str,
        knowledge_space_id: &str,
    ) -> Result<KnowledgeSpace, RaglineError> {
        self.spaces
            .find(tenant_id, knowledge_space_id)
            .await?
            .ok_or_else(|| RaglineError::not_found("knowledge space", knowledge_space_id))
    }

    /// Chunks of the space's current version.
    pub async fn chunks(
        &self,
        tenant_id: &str,
        knowledge_space_id: &str,
    ) -> Result<Vec<Chunk>, RaglineError> {
        let space = self.get(tenant_id, knowledge_space_id).await?;
        self.vectors.list_chunks(&space.current_namespace()).await
    }

    /// Removes the metadata record and the vectors of every version.
    pub async fn delete(
        &self,
        tenant_id: &str,
        knowledge_space_id: &str,
    ) -> Result<DeleteOutcome, RaglineError> {
        self.get(tenant_id, knowledge_space_id).await?;
        let deleted_chunks = self.vectors.delete_space(tenant_id, knowledge_space_id).await?;
        self.spaces.delete(tenant_id, knowledge_space_id).await?;
        info!(
            tenant_id,
            knowledge_space_id, deleted_chunks, "knowledge space deleted"
        );
        Ok(DeleteOutcome {
            knowledge_space_id: knowledge_space_id.to_string(),
            deleted_chunks,
        })
    }
}
