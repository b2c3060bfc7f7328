// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokenizer abstraction used by the chunking engine.
//!
//! The tokenizer must match the one the target LLM uses, so chunk budgets
//! line up with context-window accounting at query time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tiktoken_rs::CoreBPE;

use crate::error::RaglineError;

/// Encodes text to token ids and decodes token windows back to text.
pub trait Tokenizer: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decodes a token window.
    ///
    /// Fails when the window starts or ends inside a multibyte character.
    fn decode(&self, tokens: &[u32]) -> Result<String, RaglineError>;
}

/// BPE encodings shipped with tiktoken.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Encoding {
    #[default]
    Cl100kBase,
    O200kBase,
}

/// Tiktoken-backed [`Tokenizer`].
pub struct TiktokenTokenizer {
    encoding: Encoding,
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn new(encoding: Encoding) -> Result<Self, RaglineError> {
        let bpe = match encoding {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
        }
        .map_err(|e| RaglineError::Internal(format!("failed to load {encoding} encoding: {e}")))?;
        Ok(Self { encoding, bpe })
    }

    /// Resolves an encoding by name, e.g. `"cl100k_base"`.
    pub fn from_name(name: &str) -> Result<Self, RaglineError> {
        let encoding = Encoding::from_str(name)
            .map_err(|_| RaglineError::Config(format!("unknown tokenizer encoding: {name}")))?;
        Self::new(encoding)
    }
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn name(&self) -> &str {
        match self.encoding {
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::O200kBase => "o200k_base",
        }
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, RaglineError> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| RaglineError::Validation(format!("token window is not valid UTF-8: {e}")))
    }
}
