// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ragline retrieval-augmented chat service.
//!
//! This crate provides the error taxonomy, domain types, and collaborator
//! traits used throughout the Ragline workspace. Providers and repositories
//! implement traits defined here; use cases depend only on these traits.

pub mod error;
pub mod tokenizer;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RaglineError;
pub use tokenizer::{Encoding, TiktokenTokenizer, Tokenizer};
pub use types::{
    AdapterType, Agent, AgentPreset, AgentSpec, AuthMethod, ChatMessage, Chunk, Conversation,
    EmbeddedChunk, Embedding, HealthStatus, Identity, IngestionSummary, KnowledgeSpace,
    KnowledgeSpaceStatus, KnowledgeSpaceType, Namespace, ParseError, Role, ScoredChunk,
};

pub use traits::{
    AgentRepository, ConversationRepository, CrawledPage, CrawlerService, EmbeddingService,
    KnowledgeSpaceRepository, LlmService, PluginAdapter, TokenStream, VectorRepository,
};
