// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for streaming chat completions.
//!
//! Converts a reqwest response byte stream into text deltas using the
//! `eventsource-stream` crate. The stream ends at the `[DONE]` sentinel.

use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use ragline_core::{RaglineError, TokenStream};

use crate::types::ChatChunk;

const SERVICE: &str = "llm";

/// Parses a streaming chat-completions response into a [`TokenStream`].
///
/// Chunks without text content (role announcements, finish markers) are
/// skipped. A malformed event or transport error ends the stream with an
/// error item.
pub fn parse_chat_stream(response: reqwest::Response) -> TokenStream {
    let events = response.bytes_stream().eventsource();

    let deltas = events
        .take_while(|event| {
            let done = matches!(event, Ok(e) if e.data.trim() == "[DONE]");
            futures::future::ready(!done)
        })
        .filter_map(|event| async move {
            match event {
                Ok(event) => match serde_json::from_str::<ChatChunk>(&event.data) {
                    Ok(chunk) => chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        .filter(|text| !text.is_empty())
                        .map(Ok),
                    Err(e) => Some(Err(RaglineError::ExternalService {
                        service: SERVICE.into(),
                        message: format!("failed to parse stream chunk: {e}"),
                        status: None,
                        source: Some(Box::new(e)),
                    })),
                },
                Err(e) => Some(Err(RaglineError::ExternalService {
                    service: SERVICE.into(),
                    message: format!("SSE stream error: {e}"),
                    status: None,
                    source: None,
                })),
            }
        });

    // Stop after the first error so callers never see data past a failure.
    let fused = deltas.scan(false, |failed, item| {
        if *failed {
            return futures::future::ready(None);
        }
        *failed = item.is_err();
        futures::future::ready(Some(item))
    });

    Box::pin(fused)
}
