// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Providers extend the [`PluginAdapter`] base trait; repositories are plain
//! `Send + Sync` traits. All use `#[async_trait]` for dynamic dispatch.

pub mod adapter;
pub mod crawler;
pub mod embedding;
pub mod llm;
pub mod storage;

pub use adapter::PluginAdapter;
pub use crawler::{CrawledPage, CrawlerService};
pub use embedding::EmbeddingService;
pub use llm::{LlmService, TokenStream};
pub use storage::{
    AgentRepository, ConversationRepository, KnowledgeSpaceRepository, VectorRepository,
};
