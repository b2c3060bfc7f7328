// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Every authenticated handler receives the caller's [`Identity`] from the
//! auth middleware; tenant scoping comes from there, never from the body.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use ragline_chat::{ChatEvent, ChatRequest, CreateAgentRequest};
use ragline_core::{
    AgentPreset, ChatMessage, Chunk, HealthStatus, Identity, KnowledgeSpace, RaglineError,
};
use ragline_knowledge::{IngestRequest, ProductIngestRequest};

use crate::error::ApiError;
use crate::server::AppState;
use crate::sse::{ChunkGenerator, CompletionMeta, DONE_FRAME};

type ApiResult<T> = Result<T, ApiError>;

/// Unwraps a JSON body, turning extractor rejections into validation errors.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError(RaglineError::Validation(rejection.body_text())))
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// A body may name a tenant, but only the caller's own.
fn check_tenant(identity: &Identity, claimed: Option<&str>) -> Result<(), ApiError> {
    match claimed {
        Some(tenant) if tenant != identity.tenant_id => Err(ApiError(RaglineError::Authorization(
            "tenantId does not match the authenticated tenant".into(),
        ))),
        _ => Ok(()),
    }
}

// --- Knowledge spaces ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKnowledgeSpaceBody {
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub name: String,
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// POST /v1/knowledge-spaces
pub async fn create_knowledge_space(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    payload: Result<Json<CreateKnowledgeSpaceBody>, JsonRejection>,
) -> ApiResult<Response> {
    let payload = body(payload)?;
    check_tenant(&identity, payload.tenant_id.as_deref())?;
    let outcome = state
        .ingest
        .execute(IngestRequest {
            tenant_id: identity.tenant_id,
            name: payload.name,
            source_urls: payload.source_urls,
            request_id: payload.request_id.or_else(|| Some(request_id(&headers))),
        })
        .await?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductSpaceBody {
    pub name: String,
    pub file_content: String,
}

/// POST /v1/knowledge-spaces/products
pub async fn create_product_space(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    payload: Result<Json<CreateProductSpaceBody>, JsonRejection>,
) -> ApiResult<Response> {
    let payload = body(payload)?;
    let outcome = state
        .products
        .execute(ProductIngestRequest {
            tenant_id: identity.tenant_id,
            name: payload.name,
            file_content: payload.file_content,
            request_id: Some(request_id(&headers)),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSpaceList {
    pub knowledge_spaces: Vec<KnowledgeSpace>,
}

/// GET /v1/knowledge-spaces
pub async fn list_knowledge_spaces(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<KnowledgeSpaceList>> {
    let knowledge_spaces = state.catalog.list(&identity.tenant_id).await?;
    Ok(Json(KnowledgeSpaceList { knowledge_spaces }))
}

/// GET /v1/knowledge-spaces/{id}
pub async fn get_knowledge_space(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<KnowledgeSpace>> {
    Ok(Json(state.catalog.get(&identity.tenant_id, &id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkList {
    pub knowledge_space_id: String,
    pub chunks: Vec<Chunk>,
}

/// GET /v1/knowledge-spaces/{id}/chunks
pub async fn list_chunks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChunkList>> {
    let chunks = state.catalog.chunks(&identity.tenant_id, &id).await?;
    Ok(Json(ChunkList {
        knowledge_space_id: id,
        chunks,
    }))
}

/// DELETE /v1/knowledge-spaces/{id}
pub async fn delete_knowledge_space(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let outcome = state.catalog.delete(&identity.tenant_id, &id).await?;
    Ok(Json(outcome).into_response())
}

// --- Agents ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentBody {
    pub name: String,
    pub knowledge_space_ids: Vec<String>,
    #[serde(rename = "strictRAG", default = "default_strict_rag")]
    pub strict_rag: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub preset: AgentPreset,
}

fn default_strict_rag() -> bool {
    true
}

/// POST /v1/agents
pub async fn create_agent(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreateAgentBody>, JsonRejection>,
) -> ApiResult<Response> {
    let payload = body(payload)?;
    let agent = state
        .agents
        .create(CreateAgentRequest {
            tenant_id: identity.tenant_id,
            name: payload.name,
            knowledge_space_ids: payload.knowledge_space_ids,
            strict_rag: payload.strict_rag,
            system_prompt: payload.system_prompt,
            preset: payload.preset,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(agent)).into_response())
}

/// GET /v1/agents/{id}
pub async fn get_agent(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let agent = state.agents.get(&identity.tenant_id, &id).await?;
    Ok(Json(agent).into_response())
}

// --- Chat ---

/// Accepts both `{agentId, message}` and the OpenAI `{model, messages}` form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionBody {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default, alias = "conversation_id")]
    pub conversation_id: Option<String>,
}

impl ChatCompletionBody {
    /// The short form streams unless told otherwise; the OpenAI form follows
    /// OpenAI's default of a single JSON response.
    fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(self.message.is_some())
    }

    fn into_request(self, identity: Identity, request_id: String) -> Result<ChatRequest, RaglineError> {
        let agent_id = self
            .agent_id
            .or(self.model)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| RaglineError::Validation("agentId (or model) is required".into()))?;
        let mut messages = self.messages;
        if let Some(message) = self.message {
            messages.push(ChatMessage::user(message));
        }
        Ok(ChatRequest {
            tenant_id: identity.tenant_id,
            user_id: identity.user_id,
            agent_id,
            messages,
            conversation_id: self.conversation_id,
            request_id: Some(request_id),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Serialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CompletionMessage {
    pub role: &'static str,
    pub content: String,
    pub cited_urls: Vec<String>,
    #[serde(rename = "isRag")]
    pub is_rag: bool,
}

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    payload: Result<Json<ChatCompletionBody>, JsonRejection>,
) -> ApiResult<Response> {
    let payload = body(payload)?;
    let stream = payload.wants_stream();
    let auth_method = identity.auth_method;
    let request = payload.into_request(identity, request_id(&headers))?;
    let agent_id = request.agent_id.clone();
    info!(
        tenant_id = %request.tenant_id,
        agent_id = %agent_id,
        messages = request.messages.len(),
        stream,
        %auth_method,
        "chat completion requested"
    );

    if !stream {
        let reply = state.chat.complete(request).await?;
        return Ok(Json(ChatCompletion {
            id: reply.conversation_id,
            object: "chat.completion",
            created: chrono::Utc::now().timestamp(),
            model: agent_id,
            choices: vec![CompletionChoice {
                index: 0,
                message: CompletionMessage {
                    role: "assistant",
                    content: reply.content,
                    cited_urls: reply.cited_urls,
                    is_rag: reply.is_rag,
                },
                finish_reason: "stop",
            }],
        })
        .into_response());
    }

    let chat = state.chat.stream(request, state.shutdown.child_token()).await?;
    let meta = CompletionMeta::new(chat.conversation_id, agent_id);
    Ok(sse_response(frame_stream(
        chat.events,
        state.generator,
        meta,
        state.frame_delay,
    )))
}

struct FrameState {
    events: mpsc::Receiver<ChatEvent>,
    generator: ChunkGenerator,
    meta: CompletionMeta,
    delay: Duration,
    pending: VecDeque<String>,
    finished: bool,
    started: bool,
}

impl FrameState {
    fn apply(&mut self, event: Option<ChatEvent>) {
        match event {
            Some(ChatEvent::Delta(text)) => match self.generator.content_frames(&self.meta, &text) {
                Ok(frames) => self.pending.extend(frames),
                Err(e) => self.fail(&e),
            },
            Some(ChatEvent::Completed { cited_urls, is_rag }) => {
                self.pending
                    .push_back(self.generator.terminal_frame(&self.meta, &cited_urls, Some(is_rag)));
                self.pending.push_back(DONE_FRAME.to_string());
                self.finished = true;
            }
            Some(ChatEvent::Failed(e)) => self.fail(&e),
            // The turn ended without a final event, e.g. server shutdown.
            None => self.fail(&RaglineError::Internal(
                "stream cancelled before completion".into(),
            )),
        }
    }

    fn fail(&mut self, error: &RaglineError) {
        self.pending.push_back(self.generator.error_frame(error));
        self.finished = true;
    }
}

/// Turns chat events into wire frames, one frame per poll.
///
/// Dropping the returned stream drops the event receiver, which cancels the
/// turn upstream.
pub fn frame_stream(
    events: mpsc::Receiver<ChatEvent>,
    generator: ChunkGenerator,
    meta: CompletionMeta,
    delay: Duration,
) -> impl futures::Stream<Item = Result<String, Infallible>> + Send + 'static {
    let role = generator.role_frame(&meta);
    let state = FrameState {
        events,
        generator,
        meta,
        delay,
        pending: VecDeque::from([role]),
        finished: false,
        started: false,
    };
    stream::unfold(state, |mut s| async move {
        loop {
            if let Some(frame) = s.pending.pop_front() {
                if s.started && !s.delay.is_zero() {
                    tokio::time::sleep(s.delay).await;
                }
                s.started = true;
                return Some((Ok(frame), s));
            }
            if s.finished {
                return None;
            }
            let event = s.events.recv().await;
            s.apply(event);
        }
    })
}

fn sse_response<S>(frames: S) -> Response
where
    S: futures::Stream<Item = Result<String, Infallible>> + Send + 'static,
{
    let mut response = Response::new(Body::from_stream(frames));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

// --- Public endpoints ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub storage: String,
}

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Response {
    let (status, code, storage) = match state.health.storage.health_check().await {
        Ok(HealthStatus::Healthy) => ("ok", StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => ("degraded", StatusCode::OK, reason),
        Ok(HealthStatus::Unhealthy(reason)) => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, reason),
        Err(e) => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    };
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        storage,
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
