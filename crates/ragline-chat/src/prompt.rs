// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly for grounded answers.

use std::fmt::Write;

use ragline_core::{ChatMessage, Conversation, Role, ScoredChunk};

/// Fixed reply when strict mode finds no supporting context.
pub const REFUSAL_MESSAGE: &str = "This site does not have any information about that.";

const TASK_INSTRUCTIONS: &str = "Answer the USER message using the CONTEXT documents above. \
Follow the SYSTEM instructions. When you use a document, cite it by its URL. \
If the documents do not contain the answer, say so plainly instead of guessing.";

/// Flattens stored turns into alternating user/assistant messages, oldest first.
pub fn history_from_turns(turns: &[Conversation]) -> Vec<ChatMessage> {
    turns
        .iter()
        .flat_map(|turn| {
            [
                ChatMessage::user(turn.last_user_message.clone()),
                ChatMessage {
                    role: Role::Assistant,
                    content: turn.last_assistant_message.clone(),
                },
            ]
        })
        .collect()
}

/// Renders the single prompt sent to the LLM.
///
/// Sections appear in a fixed order: `SYSTEM`, `CONTEXT` (numbered documents
/// with title and URL), `CONVERSATION HISTORY` when non-empty, `USER`, `TASK`.
pub fn build_prompt(
    system_prompt: &str,
    context: &[ScoredChunk],
    history: &[ChatMessage],
    user_message: &str,
) -> String {
    let mut prompt = String::with_capacity(1024);
    let _ = write!(prompt, "SYSTEM: {system_prompt}\n\n");

    prompt.push_str("CONTEXT:\n# Context Documents (DO NOT DISCARD)\n\n");
    if context.is_empty() {
        prompt.push_str("(no documents)\n\n");
    }
    for (i, scored) in context.iter().enumerate() {
        let chunk = &scored.chunk;
        let title = chunk
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&chunk.source_url);
        let _ = write!(
            prompt,
            "{}. [{}]({})\n{}\n\n",
            i + 1,
            title,
            chunk.source_url,
            chunk.text.trim()
        );
    }

    if !history.is_empty() {
        prompt.push_str("CONVERSATION HISTORY:\n");
        for message in history {
            let _ = writeln!(prompt, "{}: {}", message.role, message.content);
        }
        prompt.push('\n');
    }

    let _ = write!(prompt, "USER: {user_message}\n\nTASK: {TASK_INSTRUCTIONS}");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ragline_core::Chunk;

    fn scored(title: Option<&str>, url: &str, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                knowledge_space_id: "ks".into(),
                version: "v1".into(),
                chunk_id: "c".into(),
                source_url: url.into(),
                title: title.map(str::to_string),
                text: text.into(),
                token_count: 3,
            },
            score: 0.9,
        }
    }

    #[test]
    fn sections_appear_in_order() {
        let prompt = build_prompt(
            "Be brief.",
            &[
                scored(Some("Shipping"), "https://shop.test/ship", "Ships in 2 days."),
                scored(None, "https://shop.test/returns", "Returns within 30 days."),
            ],
            &[
                ChatMessage::user("hi"),
                ChatMessage {
                    role: Role::Assistant,
                    content: "hello".into(),
                },
            ],
            "How fast is shipping?",
        );

        let system = prompt.find("SYSTEM: Be brief.").unwrap();
        let context = prompt.find("CONTEXT:\n# Context Documents (DO NOT DISCARD)").unwrap();
        let history = prompt.find("CONVERSATION HISTORY:\nUSER: hi\nASSISTANT: hello").unwrap();
        let user = prompt.find("USER: How fast is shipping?").unwrap();
        let task = prompt.find("TASK: ").unwrap();
        assert!(system < context && context < history && history < user && user < task);

        assert!(prompt.contains("1. [Shipping](https://shop.test/ship)\nShips in 2 days."));
        assert!(prompt.contains("2. [https://shop.test/returns](https://shop.test/returns)"));
    }

    #[test]
    fn history_section_omitted_when_empty() {
        let prompt = build_prompt("s", &[], &[], "q");
        assert!(!prompt.contains("CONVERSATION HISTORY"));
        assert!(prompt.contains("(no documents)"));
    }

    #[test]
    fn turns_flatten_to_alternating_messages() {
        let turn = Conversation {
            conversation_id: "c1".into(),
            tenant_id: "t1".into(),
            agent_id: "a1".into(),
            user_id: "u1".into(),
            last_user_message: "q1".into(),
            last_assistant_message: "a1".into(),
            referenced_urls: vec![],
            created_at: Utc::now(),
            is_rag: true,
        };
        let history = history_from_turns(&[turn]);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "a1");
    }
}
