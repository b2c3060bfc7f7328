// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM service trait for prompt completion.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::RaglineError;
use crate::traits::adapter::PluginAdapter;

/// Stream of text deltas produced by a streaming completion.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, RaglineError>> + Send>>;

/// Language model integration.
///
/// Supports both single-shot completion and streaming of text deltas.
#[async_trait]
pub trait LlmService: PluginAdapter {
    /// Sends a prompt and returns the full completion.
    async fn complete(&self, prompt: &str) -> Result<String, RaglineError>;

    /// Sends a prompt and returns a stream of text deltas.
    async fn stream(&self, prompt: &str) -> Result<TokenStream, RaglineError>;
}
