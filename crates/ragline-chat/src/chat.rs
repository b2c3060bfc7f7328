// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chat completion use case.
//!
//! A turn runs in two phases. [`ChatService::prepare`] validates the request
//! and loads the agent; its errors surface before any response is started.
//! Everything after that (retrieval, the LLM call, persisting the turn) either
//! returns a whole [`ChatReply`] or, when streaming, is driven by a spawned
//! task that reports through [`ChatEvent`]s.

use std::sync::Arc;

use futures::StreamExt;
use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use ragline_core::{
    Agent, AgentRepository, ChatMessage, Conversation, ConversationRepository, LlmService,
    RaglineError, Role,
};

use crate::prompt::{REFUSAL_MESSAGE, build_prompt, history_from_turns};
use crate::retrieval::Retriever;

const EVENT_BUFFER: usize = 32;

/// One user turn against an agent.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub tenant_id: String,
    pub user_id: String,
    pub agent_id: String,
    /// The final `user` message is the query; earlier messages are history.
    pub messages: Vec<ChatMessage>,
    pub conversation_id: Option<String>,
    pub request_id: Option<String>,
}

/// A complete, non-streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub conversation_id: String,
    pub content: String,
    pub cited_urls: Vec<String>,
    pub is_rag: bool,
}

/// What a streaming turn reports, in order: deltas, then exactly one of
/// `Completed` or `Failed`.
#[derive(Debug)]
pub enum ChatEvent {
    Delta(String),
    Completed { cited_urls: Vec<String>, is_rag: bool },
    Failed(RaglineError),
}

/// Receiving side of a streaming turn. Dropping it cancels the turn.
#[derive(Debug)]
pub struct ChatStream {
    pub conversation_id: String,
    pub events: mpsc::Receiver<ChatEvent>,
}

/// A validated request with its agent loaded.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub agent: Agent,
    pub tenant_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub resumed: bool,
    pub query: String,
    pub request_history: Vec<ChatMessage>,
    pub request_id: Option<String>,
}

/// How the answer is produced once context is known.
enum Plan {
    Refuse,
    Generate {
        prompt: String,
        cited_urls: Vec<String>,
        is_rag: bool,
    },
}

#[derive(Clone)]
pub struct ChatService {
    agents: Arc<dyn AgentRepository>,
    conversations: Arc<dyn ConversationRepository>,
    retriever: Arc<Retriever>,
    llm: Arc<dyn LlmService>,
    history_turns: usize,
}

impl ChatService {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        conversations: Arc<dyn ConversationRepository>,
        retriever: Arc<Retriever>,
        llm: Arc<dyn LlmService>,
        history_turns: usize,
    ) -> Self {
        Self {
            agents,
            conversations,
            retriever,
            llm,
            history_turns,
        }
    }

    /// Validates the request and loads the agent for its tenant.
    pub async fn prepare(&self, request: ChatRequest) -> Result<PreparedTurn, RaglineError> {
        let ChatRequest {
            tenant_id,
            user_id,
            agent_id,
            mut messages,
            conversation_id,
            request_id,
        } = request;

        if agent_id.trim().is_empty() {
            return Err(RaglineError::Validation("agentId is required".into()));
        }
        let last_user = messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .ok_or_else(|| RaglineError::Validation("a user message is required".into()))?;
        let query = messages.remove(last_user).content;
        if query.trim().is_empty() {
            return Err(RaglineError::Validation("user message must not be empty".into()));
        }
        messages.truncate(last_user);

        let agent = self
            .agents
            .find(&tenant_id, &agent_id)
            .await?
            .ok_or_else(|| RaglineError::not_found("agent", &agent_id))?;

        let conversation_id = conversation_id.filter(|id| !id.trim().is_empty());
        let resumed = conversation_id.is_some();
        let conversation_id =
            conversation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(PreparedTurn {
            agent,
            tenant_id,
            user_id,
            conversation_id,
            resumed,
            query,
            request_history: messages,
            request_id,
        })
    }

    /// Answers a turn in one piece.
    pub async fn complete(&self, request: ChatRequest) -> Result<ChatReply, RaglineError> {
        let turn = self.prepare(request).await?;
        let span = turn_span(&turn);
        async {
            let reply = match self.plan(&turn).await {
                Ok(Plan::Refuse) => refusal_reply(&turn),
                Ok(Plan::Generate {
                    prompt,
                    cited_urls,
                    is_rag,
                }) => match self.llm.complete(&prompt).await {
                    Ok(content) => ChatReply {
                        conversation_id: turn.conversation_id.clone(),
                        content,
                        cited_urls,
                        is_rag,
                    },
                    Err(e) => return Err(self.failed(e)),
                },
                Err(e) => return Err(self.failed(e)),
            };
            self.record(&turn, &reply).await;
            Ok(reply)
        }
        .instrument(span)
        .await
    }

    /// Starts a streamed turn. Pre-stream failures are returned directly;
    /// later failures arrive as [`ChatEvent::Failed`].
    ///
    /// The turn stops as soon as `cancel` fires or the [`ChatStream`] is
    /// dropped, and is then not recorded.
    pub async fn stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatStream, RaglineError> {
        let turn = self.prepare(request).await?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let conversation_id = turn.conversation_id.clone();
        let service = self.clone();
        let span = turn_span(&turn);

        tokio::spawn(
            async move {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    _ = tx.closed() => None,
                    result = service.drive(&turn, &tx) => Some(result),
                };
                match outcome {
                    Some(Ok(Some(reply))) => {
                        service.record(&turn, &reply).await;
                        let _ = tx
                            .send(ChatEvent::Completed {
                                cited_urls: reply.cited_urls,
                                is_rag: reply.is_rag,
                            })
                            .await;
                    }
                    Some(Ok(None)) | None => {
                        counter!("ragline_chat_requests_total", "outcome" => "cancelled")
                            .increment(1);
                        info!("chat stream cancelled by client");
                    }
                    Some(Err(e)) => {
                        let e = service.failed(e);
                        let _ = tx.send(ChatEvent::Failed(e)).await;
                    }
                }
            }
            .instrument(span),
        );

        Ok(ChatStream {
            conversation_id,
            events: rx,
        })
    }

    /// Streams the answer into `tx`. `Ok(None)` means the receiver went away.
    async fn drive(
        &self,
        turn: &PreparedTurn,
        tx: &mpsc::Sender<ChatEvent>,
    ) -> Result<Option<ChatReply>, RaglineError> {
        let (prompt, cited_urls, is_rag) = match self.plan(turn).await? {
            Plan::Refuse => {
                let reply = refusal_reply(turn);
                if tx.send(ChatEvent::Delta(reply.content.clone())).await.is_err() {
                    return Ok(None);
                }
                return Ok(Some(reply));
            }
            Plan::Generate {
                prompt,
                cited_urls,
                is_rag,
            } => (prompt, cited_urls, is_rag),
        };

        let mut tokens = self.llm.stream(&prompt).await?;
        let mut content = String::new();
        while let Some(token) = tokens.next().await {
            let token = token?;
            if token.is_empty() {
                continue;
            }
            content.push_str(&token);
            if tx.send(ChatEvent::Delta(token)).await.is_err() {
                return Ok(None);
            }
        }

        Ok(Some(ChatReply {
            conversation_id: turn.conversation_id.clone(),
            content,
            cited_urls,
            is_rag,
        }))
    }

    /// Retrieves context and decides between refusing and generating.
    async fn plan(&self, turn: &PreparedTurn) -> Result<Plan, RaglineError> {
        let context = self.retriever.retrieve(&turn.agent, &turn.query).await?;

        if context.is_empty() && turn.agent.strict_rag {
            info!("no context above threshold, refusing under strict mode");
            return Ok(Plan::Refuse);
        }

        let mut history = if turn.resumed && self.history_turns > 0 {
            let stored = self
                .conversations
                .recent(&turn.tenant_id, &turn.conversation_id, self.history_turns)
                .await?;
            history_from_turns(&stored)
        } else {
            Vec::new()
        };
        history.extend(turn.request_history.iter().cloned());

        let prompt = build_prompt(
            turn.agent.effective_system_prompt(),
            &context.chunks,
            &history,
            &turn.query,
        );
        debug!(
            context_chunks = context.chunks.len(),
            history_messages = history.len(),
            prompt_bytes = prompt.len(),
            "prompt assembled"
        );

        Ok(Plan::Generate {
            prompt,
            is_rag: !context.is_empty(),
            cited_urls: context.cited_urls,
        })
    }

    /// Appends the finished turn to the conversation log.
    async fn record(&self, turn: &PreparedTurn, reply: &ChatReply) {
        let outcome = if reply.is_rag {
            "rag"
        } else if turn.agent.strict_rag {
            "refusal"
        } else {
            "direct"
        };
        counter!("ragline_chat_requests_total", "outcome" => outcome).increment(1);

        let conversation = Conversation {
            conversation_id: turn.conversation_id.clone(),
            tenant_id: turn.tenant_id.clone(),
            agent_id: turn.agent.agent_id.clone(),
            user_id: turn.user_id.clone(),
            last_user_message: turn.query.clone(),
            last_assistant_message: reply.content.clone(),
            referenced_urls: reply.cited_urls.clone(),
            created_at: chrono::Utc::now(),
            is_rag: reply.is_rag,
        };
        if let Err(e) = self.conversations.append(&conversation).await {
            error!(error = %e, "failed to record conversation turn");
        } else {
            info!(outcome, cited = reply.cited_urls.len(), "chat turn completed");
        }
    }

    fn failed(&self, e: RaglineError) -> RaglineError {
        counter!("ragline_chat_requests_total", "outcome" => "error").increment(1);
        warn!(error = %e, "chat turn failed");
        e
    }
}

fn refusal_reply(turn: &PreparedTurn) -> ChatReply {
    ChatReply {
        conversation_id: turn.conversation_id.clone(),
        content: REFUSAL_MESSAGE.to_string(),
        cited_urls: Vec::new(),
        is_rag: false,
    }
}

fn turn_span(turn: &PreparedTurn) -> tracing::Span {
    info_span!(
        "chat_turn",
        tenant_id = %turn.tenant_id,
        agent_id = %turn.agent.agent_id,
        conversation_id = %turn.conversation_id,
        request_id = turn.request_id.as_deref().unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use ragline_storage::MemoryStore;

    use super::*;
    use crate::testing::{KeywordEmbedder, ScriptedLlm, agent, policy, seed_space};

    struct Fixture {
        store: Arc<MemoryStore>,
        llm: Arc<ScriptedLlm>,
        service: ChatService,
    }

    async fn fixture(llm: ScriptedLlm, strict_rag: bool) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        seed_space(
            &store,
            "t1",
            "ks-shop",
            &[
                ("https://shop.test/shipping", "We ship worldwide. Shipping takes two days."),
                ("https://shop.test/returns", "Returns are accepted within 30 days."),
            ],
        )
        .await;
        AgentRepository::save(store.as_ref(), &agent("t1", "a1", &["ks-shop"], strict_rag))
            .await
            .unwrap();

        let llm = Arc::new(llm);
        let retriever = Arc::new(Retriever::new(
            Arc::new(KeywordEmbedder),
            store.clone(),
            store.clone(),
            policy(),
        ));
        let service = ChatService::new(store.clone(), store.clone(), retriever, llm.clone(), 5);
        Fixture {
            store,
            llm,
            service,
        }
    }

    fn request(tenant: &str, message: &str) -> ChatRequest {
        ChatRequest {
            tenant_id: tenant.into(),
            user_id: "u1".into(),
            agent_id: "a1".into(),
            messages: vec![ChatMessage::user(message)],
            conversation_id: None,
            request_id: Some("req-1".into()),
        }
    }

    async fn collect(mut stream: ChatStream) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.events.recv().await {
            events.push(event);
        }
        events
    }

    async fn turns(store: &MemoryStore, conversation_id: &str) -> Vec<Conversation> {
        store.recent("t1", conversation_id, 10).await.unwrap()
    }

    #[tokio::test]
    async fn grounded_answer_streams_and_records_turn() {
        let f = fixture(ScriptedLlm::replying(&["Two ", "days."]), true).await;
        let stream = f
            .service
            .stream(request("t1", "How long does shipping take?"), CancellationToken::new())
            .await
            .unwrap();
        let conversation_id = stream.conversation_id.clone();
        let events = collect(stream).await;

        assert!(matches!(&events[0], ChatEvent::Delta(t) if t == "Two "));
        assert!(matches!(&events[1], ChatEvent::Delta(t) if t == "days."));
        match &events[2] {
            ChatEvent::Completed { cited_urls, is_rag } => {
                assert!(is_rag);
                assert_eq!(cited_urls, &vec!["https://shop.test/shipping".to_string()]);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events.len(), 3);

        let prompt = f.llm.last_prompt().unwrap();
        assert!(prompt.contains("[https://shop.test/shipping](https://shop.test/shipping)"));
        assert!(prompt.contains("USER: How long does shipping take?"));

        let recorded = turns(&f.store, &conversation_id).await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].last_assistant_message, "Two days.");
        assert!(recorded[0].is_rag);
    }

    #[tokio::test]
    async fn strict_mode_refuses_without_calling_llm() {
        let f = fixture(ScriptedLlm::replying(&["should not appear"]), true).await;
        let stream = f
            .service
            .stream(request("t1", "What is the weather today?"), CancellationToken::new())
            .await
            .unwrap();
        let conversation_id = stream.conversation_id.clone();
        let events = collect(stream).await;

        assert!(matches!(&events[0], ChatEvent::Delta(t) if t == REFUSAL_MESSAGE));
        assert!(matches!(
            &events[1],
            ChatEvent::Completed { cited_urls, is_rag: false } if cited_urls.is_empty()
        ));
        assert_eq!(f.llm.calls(), 0);

        let recorded = turns(&f.store, &conversation_id).await;
        assert_eq!(recorded.len(), 1);
        assert!(!recorded[0].is_rag);
    }

    #[tokio::test]
    async fn lenient_mode_answers_without_context() {
        let f = fixture(ScriptedLlm::replying(&["Sunny."]), false).await;
        let reply = f
            .service
            .complete(request("t1", "What is the weather today?"))
            .await
            .unwrap();
        assert_eq!(reply.content, "Sunny.");
        assert!(!reply.is_rag);
        assert!(reply.cited_urls.is_empty());
        assert_eq!(f.llm.calls(), 1);
        assert!(f.llm.last_prompt().unwrap().contains("(no documents)"));
    }

    #[tokio::test]
    async fn other_tenant_cannot_reach_agent() {
        let f = fixture(ScriptedLlm::replying(&["x"]), true).await;
        let err = f
            .service
            .stream(request("t2", "shipping?"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RaglineError::NotFound { .. }));
        assert_eq!(f.llm.calls(), 0);
    }

    #[tokio::test]
    async fn missing_user_message_is_rejected_before_streaming() {
        let f = fixture(ScriptedLlm::replying(&["x"]), true).await;
        let mut req = request("t1", "ignored");
        req.messages = vec![ChatMessage {
            role: Role::Assistant,
            content: "hi".into(),
        }];
        let err = f.service.complete(req).await.unwrap_err();
        assert!(matches!(err, RaglineError::Validation(_)));
    }

    #[tokio::test]
    async fn llm_failure_mid_stream_ends_with_failed_event() {
        let llm = ScriptedLlm {
            fail_after_tokens: true,
            ..ScriptedLlm::replying(&["partial "])
        };
        let f = fixture(llm, true).await;
        let stream = f
            .service
            .stream(request("t1", "shipping?"), CancellationToken::new())
            .await
            .unwrap();
        let conversation_id = stream.conversation_id.clone();
        let events = collect(stream).await;

        assert!(matches!(&events[0], ChatEvent::Delta(t) if t == "partial "));
        assert!(matches!(&events[1], ChatEvent::Failed(RaglineError::ExternalService { .. })));
        assert_eq!(events.len(), 2);
        assert!(turns(&f.store, &conversation_id).await.is_empty());
    }

    async fn wait_for(flag: &std::sync::atomic::AtomicBool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !flag.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("llm stream was not released");
    }

    #[tokio::test]
    async fn dropping_receiver_stops_token_consumption() {
        let llm = ScriptedLlm {
            hang_after_tokens: true,
            ..ScriptedLlm::replying(&["first"])
        };
        let f = fixture(llm, true).await;
        let mut stream = f
            .service
            .stream(request("t1", "shipping?"), CancellationToken::new())
            .await
            .unwrap();
        let conversation_id = stream.conversation_id.clone();
        assert!(matches!(stream.events.recv().await, Some(ChatEvent::Delta(_))));
        drop(stream);

        wait_for(&f.llm.stream_dropped).await;
        assert!(turns(&f.store, &conversation_id).await.is_empty());
    }

    #[tokio::test]
    async fn cancellation_token_ends_stream_without_recording() {
        let llm = ScriptedLlm {
            hang_after_tokens: true,
            ..ScriptedLlm::replying(&["first"])
        };
        let f = fixture(llm, true).await;
        let cancel = CancellationToken::new();
        let mut stream = f
            .service
            .stream(request("t1", "shipping?"), cancel.clone())
            .await
            .unwrap();
        assert!(matches!(stream.events.recv().await, Some(ChatEvent::Delta(_))));
        cancel.cancel();

        assert!(stream.events.recv().await.is_none());
        wait_for(&f.llm.stream_dropped).await;
    }

    #[tokio::test]
    async fn resumed_conversation_includes_stored_history() {
        let f = fixture(ScriptedLlm::replying(&["ok"]), true).await;
        let first = f
            .service
            .complete(request("t1", "Do you ship abroad?"))
            .await
            .unwrap();

        let mut follow_up = request("t1", "And how long does shipping take?");
        follow_up.conversation_id = Some(first.conversation_id.clone());
        let second = f.service.complete(follow_up).await.unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);

        let prompt = f.llm.last_prompt().unwrap();
        assert!(prompt.contains("CONVERSATION HISTORY:\nUSER: Do you ship abroad?\nASSISTANT: ok"));
        assert_eq!(turns(&f.store, &first.conversation_id).await.len(), 2);
    }
}
