// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible `chat.completion.chunk` framing.
//!
//! A completion is framed as:
//!
//! ```text
//! data: {... "delta": {"role": "assistant"}, "finish_reason": null}
//! data: {... "delta": {"content": "<= chunk_bytes of text"}, "finish_reason": null}
//! ...
//! data: {... "delta": {"cited_urls": [...], "isRag": true}, "finish_reason": "stop"}
//! data: [DONE]
//! ```
//!
//! Content is split on UTF-8 character boundaries, so a frame may carry fewer
//! bytes than the budget but never part of a code point.

use serde::Serialize;

use ragline_core::RaglineError;

use crate::error::{ErrorBody, public_message};

pub const MIN_CHUNK_BYTES: usize = 20;
pub const MAX_CHUNK_BYTES: usize = 50;
pub const DEFAULT_CHUNK_BYTES: usize = 32;

/// Literal end-of-stream sentinel.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Budget in effect for a configured value: out-of-range or unset means default.
pub fn resolve_chunk_bytes(configured: Option<usize>) -> usize {
    match configured {
        Some(n) if (MIN_CHUNK_BYTES..=MAX_CHUNK_BYTES).contains(&n) => n,
        _ => DEFAULT_CHUNK_BYTES,
    }
}

/// Identifies the completion every frame belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMeta {
    pub id: String,
    pub model: String,
    pub created: i64,
}

impl CompletionMeta {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            created: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub cited_urls: Vec<String>,
    pub is_rag: Option<bool>,
    /// Set to `false` to leave off the `[DONE]` sentinel.
    pub include_done: bool,
}

#[derive(Serialize)]
struct ChunkEnvelope<'a> {
    id: &'a str,
    object: &'static str,
    created: i64,
    model: &'a str,
    choices: [ChunkChoice<'a>; 1],
}

#[derive(Serialize)]
struct ChunkChoice<'a> {
    index: u32,
    delta: Delta<'a>,
    finish_reason: Option<&'static str>,
}

#[derive(Serialize, Default)]
struct Delta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cited_urls: Option<&'a [String]>,
    #[serde(rename = "isRag", skip_serializing_if = "Option::is_none")]
    is_rag: Option<bool>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

/// Builds wire frames for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGenerator {
    chunk_bytes: usize,
}

impl Default for ChunkGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ChunkGenerator {
    pub fn new(chunk_bytes: Option<usize>) -> Self {
        Self {
            chunk_bytes: resolve_chunk_bytes(chunk_bytes),
        }
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// Splits `content` into pieces of at most `chunk_bytes` bytes without
    /// splitting a character. Empty content yields no pieces.
    pub fn split<'a>(&self, content: &'a str) -> Result<Vec<&'a str>, RaglineError> {
        let mut pieces = Vec::with_capacity(content.len() / self.chunk_bytes + 1);
        let mut rest = content;
        while !rest.is_empty() {
            let mut end = rest.len().min(self.chunk_bytes);
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            if end == 0 {
                let width = rest.chars().next().map(char::len_utf8).unwrap_or_default();
                return Err(RaglineError::Config(format!(
                    "a {width}-byte character does not fit the {}-byte frame budget",
                    self.chunk_bytes
                )));
            }
            let (piece, tail) = rest.split_at(end);
            pieces.push(piece);
            rest = tail;
        }
        Ok(pieces)
    }

    pub fn role_frame(&self, meta: &CompletionMeta) -> String {
        frame(meta, Delta {
            role: Some("assistant"),
            ..Default::default()
        }, None)
    }

    pub fn content_frames(&self, meta: &CompletionMeta, text: &str) -> Result<Vec<String>, RaglineError> {
        Ok(self
            .split(text)?
            .into_iter()
            .map(|piece| {
                frame(meta, Delta {
                    content: Some(piece),
                    ..Default::default()
                }, None)
            })
            .collect())
    }

    /// Final frame. `cited_urls` is attached only when non-empty.
    pub fn terminal_frame(&self, meta: &CompletionMeta, cited_urls: &[String], is_rag: Option<bool>) -> String {
        frame(meta, Delta {
            cited_urls: (!cited_urls.is_empty()).then_some(cited_urls),
            is_rag,
            ..Default::default()
        }, Some("stop"))
    }

    /// Frame reporting a failure after the stream has started.
    pub fn error_frame(&self, error: &RaglineError) -> String {
        let message = public_message(error);
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: &message,
                kind: error.kind(),
            },
        };
        format!("data: {}\n\n", to_json(&body))
    }

    /// Every frame of a completion whose full text is already known.
    pub fn generate_from_text(
        &self,
        content: &str,
        meta: &CompletionMeta,
        options: &GenerateOptions,
    ) -> Result<Vec<String>, RaglineError> {
        let mut frames = vec![self.role_frame(meta)];
        frames.extend(self.content_frames(meta, content)?);
        frames.push(self.terminal_frame(meta, &options.cited_urls, options.is_rag));
        if options.include_done {
            frames.push(DONE_FRAME.to_string());
        }
        Ok(frames)
    }
}

fn frame(meta: &CompletionMeta, delta: Delta<'_>, finish_reason: Option<&'static str>) -> String {
    let envelope = ChunkEnvelope {
        id: &meta.id,
        object: "chat.completion.chunk",
        created: meta.created,
        model: &meta.model,
        choices: [ChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
    };
    format!("data: {}\n\n", to_json(&envelope))
}

fn to_json<T: Serialize>(value: &T) -> String {
    // Envelopes hold only strings, integers, and booleans.
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
