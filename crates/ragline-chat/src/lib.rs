// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Grounded chat for Ragline.
//!
//! Retrieval is scoped by tenant through knowledge-space namespaces, prompts
//! are assembled from the best-scoring chunks, and answers are either returned
//! whole or streamed as [`ChatEvent`]s. Agents in strict mode refuse instead of
//! calling the LLM when nothing relevant was retrieved.

pub mod agents;
pub mod chat;
pub mod prompt;
pub mod retrieval;

#[cfg(test)]
mod testing;

pub use agents::{AgentService, CreateAgentRequest};
pub use chat::{ChatEvent, ChatReply, ChatRequest, ChatService, ChatStream, PreparedTurn};
pub use prompt::{REFUSAL_MESSAGE, build_prompt};
pub use retrieval::{RetrievalPolicy, RetrievedContext, Retriever};
