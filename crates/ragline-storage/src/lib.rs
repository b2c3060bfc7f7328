// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the Ragline service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`, plus an in-memory
//! store with identical semantics. Both implement every repository trait of
//! `ragline-core`. Vectors are stored as little-endian f32 BLOBs and ranked
//! by brute-force cosine similarity within one namespace.

pub mod adapter;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;
pub mod vector;

use std::sync::Arc;

use ragline_config::model::{StorageBackend, StorageConfig};
use ragline_core::{
    AgentRepository, ConversationRepository, KnowledgeSpaceRepository, PluginAdapter,
    RaglineError, VectorRepository,
};

pub use adapter::SqliteStore;
pub use database::Database;
pub use memory::MemoryStore;

/// Every repository handle, backed by one store.
#[derive(Clone)]
pub struct Repositories {
    pub vectors: Arc<dyn VectorRepository>,
    pub spaces: Arc<dyn KnowledgeSpaceRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub health: Arc<dyn PluginAdapter>,
}

impl Repositories {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: VectorRepository
            + KnowledgeSpaceRepository
            + AgentRepository
            + ConversationRepository
            + PluginAdapter,
    {
        Self {
            vectors: store.clone(),
            spaces: store.clone(),
            agents: store.clone(),
            conversations: store.clone(),
            health: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }
}

/// Opens the configured backend.
pub async fn open_repositories(config: &StorageConfig) -> Result<Repositories, RaglineError> {
    match config.backend {
        StorageBackend::Memory => Ok(Repositories::in_memory()),
        StorageBackend::Sqlite => {
            let store = SqliteStore::new(config.clone());
            store.initialize().await?;
            Ok(Repositories::from_store(Arc::new(store)))
        }
    }
}
