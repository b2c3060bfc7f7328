// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Ragline.
//!
//! Exposes ingestion, the knowledge-space catalog, agents, and chat over an
//! axum router. Callers authenticate with a bearer token or API key; chat
//! answers stream as OpenAI-compatible `chat.completion.chunk` frames.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use auth::Authenticator;
pub use error::ApiError;
pub use server::{AppState, HealthState, MetricsRender, router, serve};
pub use sse::{ChunkGenerator, CompletionMeta, DONE_FRAME, GenerateOptions};
