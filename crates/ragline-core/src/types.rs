// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the ingestion and chat use cases.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RaglineError;

/// Health status reported by collaborator health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Collaborator is fully operational.
    Healthy,
    /// Collaborator is operational but experiencing issues.
    Degraded(String),
    /// Collaborator is not operational.
    Unhealthy(String),
}

/// Identifies the kind of pluggable collaborator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Crawler,
    Embedding,
    Llm,
    VectorStore,
    Repository,
}

// --- Knowledge spaces ---

/// Source kind of a knowledge space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KnowledgeSpaceType {
    Web,
    Product,
    Document,
    Custom,
}

/// Lifecycle status of a knowledge space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KnowledgeSpaceStatus {
    Processing,
    Completed,
    Partial,
    Error,
}

impl KnowledgeSpaceStatus {
    /// Derives the terminal status of an ingestion run from its tallies.
    ///
    /// `completed` iff nothing failed and something succeeded, `partial` iff
    /// both counts are non-zero, `error` iff nothing succeeded.
    pub fn from_counts(success_count: usize, failure_count: usize) -> Self {
        match (success_count, failure_count) {
            (0, _) => Self::Error,
            (_, 0) => Self::Completed,
            _ => Self::Partial,
        }
    }
}

/// One failed source item. Accumulated, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseError {
    pub item_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub reason: String,
}

impl ParseError {
    pub fn new(item_index: usize, field: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            item_index,
            field: field.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// Per-run success/failure tallies stored in `metadata.summary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(default)]
    pub errors: Vec<ParseError>,
}

/// A tenant-scoped, versioned collection of ingested content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSpace {
    pub tenant_id: String,
    pub knowledge_space_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub space_type: KnowledgeSpaceType,
    pub source_urls: Vec<String>,
    pub current_version: String,
    pub status: KnowledgeSpaceStatus,
    pub document_count: usize,
    pub summary: IngestionSummary,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeSpace {
    /// The vector namespace that queries against this space must target.
    pub fn current_namespace(&self) -> Namespace {
        Namespace::new(
            &self.tenant_id,
            &self.knowledge_space_id,
            &self.current_version,
        )
    }
}

/// Vector partition key. Every upsert and query is confined to one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub tenant_id: String,
    pub knowledge_space_id: String,
    pub version: String,
}

impl Namespace {
    pub fn new(tenant_id: &str, knowledge_space_id: &str, version: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            knowledge_space_id: knowledge_space_id.to_string(),
            version: version.to_string(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.tenant_id, self.knowledge_space_id, self.version
        )
    }
}

// --- Chunks and embeddings ---

/// A token-bounded slice of source text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub knowledge_space_id: String,
    pub version: String,
    pub chunk_id: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
    pub token_count: usize,
}

/// A chunk paired with its embedding, as handed to the vector repository.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// A chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// A fixed-dimension embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Builds an embedding, rejecting vectors whose length differs from `dimensions`.
    pub fn new(values: Vec<f32>, dimensions: usize) -> Result<Self, RaglineError> {
        if values.len() != dimensions {
            return Err(RaglineError::Validation(format!(
                "embedding has {} dimensions, expected {dimensions}",
                values.len()
            )));
        }
        Ok(Self { values })
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }

    /// Cosine similarity `dot(a,b) / (|a|*|b|)`.
    ///
    /// Fails for vectors of different length. A zero vector has similarity 0.
    pub fn cosine_similarity(&self, other: &Embedding) -> Result<f32, RaglineError> {
        if self.values.len() != other.values.len() {
            return Err(RaglineError::Validation(format!(
                "cannot compare embeddings of {} and {} dimensions",
                self.values.len(),
                other.values.len()
            )));
        }
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (a, b) in self.values.iter().zip(&other.values) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / denom)
    }
}

// --- Agents and conversations ---

/// Built-in system prompt selection used when an agent has no custom prompt.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentPreset {
    #[default]
    None,
    ProductRecommendation,
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are the official support assistant for this site. \
Answer using only the information in CONTEXT. If CONTEXT does not contain the answer, \
say that the site has no information about it. Never invent URLs, prices, or facts.";

const PRODUCT_RECOMMENDATION_PROMPT: &str = "You are a product recommendation assistant. \
Recommend products listed in CONTEXT that match the user's needs, citing name, price, and \
why each fits. Only recommend products that appear in CONTEXT, and say so plainly when \
nothing matches.";

impl AgentPreset {
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::None => DEFAULT_SYSTEM_PROMPT,
            Self::ProductRecommendation => PRODUCT_RECOMMENDATION_PROMPT,
        }
    }
}

/// A chat persona grounded in one or more knowledge spaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub tenant_id: String,
    pub agent_id: String,
    pub name: String,
    knowledge_space_ids: BTreeSet<String>,
    #[serde(rename = "strictRAG")]
    pub strict_rag: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub preset: AgentPreset,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to construct an [`Agent`].
#[derive(Debug, Clone, Default)]
pub struct AgentSpec {
    pub tenant_id: String,
    pub agent_id: String,
    pub name: String,
    pub knowledge_space_ids: Vec<String>,
    pub strict_rag: bool,
    pub system_prompt: Option<String>,
    pub preset: AgentPreset,
}

impl Agent {
    /// Builds an agent. Fails if it would not be grounded in any knowledge space.
    pub fn new(spec: AgentSpec) -> Result<Self, RaglineError> {
        let knowledge_space_ids: BTreeSet<String> = spec
            .knowledge_space_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if knowledge_space_ids.is_empty() {
            return Err(RaglineError::Validation(
                "agent must reference at least one knowledge space".into(),
            ));
        }
        if spec.name.trim().is_empty() {
            return Err(RaglineError::Validation("agent name must not be empty".into()));
        }
        Ok(Self {
            tenant_id: spec.tenant_id,
            agent_id: spec.agent_id,
            name: spec.name,
            knowledge_space_ids,
            strict_rag: spec.strict_rag,
            system_prompt: spec.system_prompt.filter(|p| !p.trim().is_empty()),
            preset: spec.preset,
            created_at: Utc::now(),
        })
    }

    pub fn knowledge_space_ids(&self) -> impl Iterator<Item = &str> {
        self.knowledge_space_ids.iter().map(String::as_str)
    }

    /// Custom prompt if set, otherwise the preset's built-in prompt.
    pub fn effective_system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or_else(|| self.preset.system_prompt())
    }
}

/// Append-only audit record of one completed chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    pub tenant_id: String,
    pub agent_id: String,
    pub user_id: String,
    pub last_user_message: String,
    pub last_assistant_message: String,
    pub referenced_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub is_rag: bool,
}

/// Speaker of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of the conversation history supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// --- Identity ---

/// How a request authenticated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthMethod {
    Bearer,
    ApiKey,
}

/// The caller identity every use case is scoped by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub tenant_id: String,
    pub user_id: String,
    pub auth_method: AuthMethod,
}
