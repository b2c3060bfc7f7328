// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-bounded sliding-window chunking.
//!
//! Text is tokenized with the target model's tokenizer and cut into windows of
//! at most `max_tokens` tokens. Consecutive windows share `overlap_tokens`
//! tokens. The cursor advances by `max(1, max_tokens - overlap_tokens)`, and
//! the loop stops once a window reaches the end of the token stream, so it
//! always terminates. Window edges are moved to points where the token stream
//! decodes, so no character is split and no token is dropped.

use std::ops::Range;
use std::sync::Arc;

use ragline_core::{RaglineError, Tokenizer};

/// Window sizing for [`Chunker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_tokens: 400,
            max_tokens: 600,
            overlap_tokens: 75,
        }
    }
}

impl ChunkConfig {
    /// Requires `min_tokens > 0` and `max_tokens > min_tokens`.
    ///
    /// `overlap_tokens >= max_tokens` is accepted here and degrades to a step
    /// of one token; configuration loading rejects it earlier.
    pub fn validate(&self) -> Result<(), RaglineError> {
        if self.min_tokens == 0 {
            return Err(RaglineError::Validation(
                "min_tokens must be greater than 0".into(),
            ));
        }
        if self.max_tokens <= self.min_tokens {
            return Err(RaglineError::Validation(format!(
                "max_tokens ({}) must be greater than min_tokens ({})",
                self.max_tokens, self.min_tokens
            )));
        }
        Ok(())
    }

    /// Cursor advance between windows.
    pub fn step(&self) -> usize {
        self.max_tokens.saturating_sub(self.overlap_tokens).max(1)
    }
}

/// One decoded window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub token_count: usize,
}

/// Splits text into overlapping, token-bounded chunks.
#[derive(Clone)]
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    config: ChunkConfig,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("tokenizer", &self.tokenizer.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Chunker {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: ChunkConfig) -> Result<Self, RaglineError> {
        config.validate()?;
        Ok(Self { tokenizer, config })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Chunks `text`. An empty token stream yields a single empty chunk.
    pub fn chunk(&self, text: &str) -> Result<Vec<TextChunk>, RaglineError> {
        let tokens = self.tokenizer.encode(text);
        if tokens.is_empty() {
            return Ok(vec![TextChunk {
                text: String::new(),
                token_count: 0,
            }]);
        }
        Ok(self
            .windows(&tokens)?
            .into_iter()
            .map(|(range, text)| TextChunk {
                text,
                token_count: range.len(),
            })
            .collect())
    }

    /// Cuts `tokens` into decodable windows.
    ///
    /// BPE tokens can split a multibyte character, so every window edge sits
    /// where the token stream decodes. An end that lands inside a character is
    /// pulled back to the last decodable token. Only when no such point exists
    /// within `max_tokens` does the window grow past the budget to finish the
    /// character. The next window starts at or before the previous end, so no
    /// token is ever skipped.
    fn windows(&self, tokens: &[u32]) -> Result<Vec<(Range<usize>, String)>, RaglineError> {
        let size = self.config.max_tokens;
        let overlap = self.config.overlap_tokens;
        let len = tokens.len();
        let mut windows = Vec::with_capacity(len / self.config.step() + 1);
        let mut cursor = 0;
        loop {
            let (end, text) = self.decode_from(tokens, cursor, (cursor + size).min(len))?;
            windows.push((cursor..end, text));
            if end >= len {
                break;
            }
            cursor = self.next_start(tokens, cursor, end, overlap);
        }
        Ok(windows)
    }

    /// Decodes the longest window `start..end` with `end <= limit`, or the
    /// shortest one past `limit` when a character straddles it.
    fn decode_from(
        &self,
        tokens: &[u32],
        start: usize,
        limit: usize,
    ) -> Result<(usize, String), RaglineError> {
        let backward = (start + 1..=limit).rev();
        let forward = limit + 1..=tokens.len();
        for end in backward.chain(forward) {
            if let Ok(text) = self.tokenizer.decode(&tokens[start..end]) {
                return Ok((end, text));
            }
        }
        Err(RaglineError::Validation(format!(
            "tokens from {start} cannot be decoded as UTF-8"
        )))
    }

    /// First decodable start of the window after `start..end`, moving
    /// forward from `end - overlap` but never past `end`.
    fn next_start(&self, tokens: &[u32], start: usize, end: usize, overlap: usize) -> usize {
        let mut next = end.saturating_sub(overlap).max(start + 1);
        while next < end && self.tokenizer.decode(&tokens[next..end]).is_err() {
            next += 1;
        }
        next
    }
}
