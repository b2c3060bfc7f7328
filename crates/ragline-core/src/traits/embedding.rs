// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding service trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::RaglineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Embedding;

/// Converts text into fixed-dimension vectors.
///
/// Used for both chunk embeddings at ingestion time and query embeddings at
/// chat time, so both sides of a similarity comparison come from the same model.
#[async_trait]
pub trait EmbeddingService: PluginAdapter {
    /// Dimensionality every returned [`Embedding`] has.
    fn dimensions(&self) -> usize;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Embedding, RaglineError>;

    /// Embeds several texts, preserving order.
    ///
    /// The default implementation calls [`embed`](Self::embed) sequentially;
    /// providers with a batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, RaglineError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
