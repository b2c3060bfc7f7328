// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of [`RaglineError`] onto HTTP responses.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use ragline_core::RaglineError;

#[derive(Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub message: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorBody<'a>,
}

/// Handler error rendered as `{"error": {"message", "type"}}`.
#[derive(Debug)]
pub struct ApiError(pub RaglineError);

impl From<RaglineError> for ApiError {
    fn from(err: RaglineError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &RaglineError) -> StatusCode {
    match err {
        RaglineError::Validation(_) => StatusCode::BAD_REQUEST,
        RaglineError::Authentication(_) => StatusCode::UNAUTHORIZED,
        RaglineError::Authorization(_) => StatusCode::FORBIDDEN,
        RaglineError::NotFound { .. } => StatusCode::NOT_FOUND,
        RaglineError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
        RaglineError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RaglineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RaglineError::Storage { .. } | RaglineError::Config(_) | RaglineError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Message safe to show a caller. Server-side faults are not described.
pub(crate) fn public_message(err: &RaglineError) -> String {
    match err {
        RaglineError::Storage { .. } | RaglineError::Config(_) | RaglineError::Internal(_) => {
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, kind = self.0.kind(), "request failed");
        } else {
            tracing::debug!(error = %self.0, kind = self.0.kind(), "request rejected");
        }

        let message = public_message(&self.0);
        let body = ErrorResponse {
            error: ErrorBody {
                message: &message,
                kind: self.0.kind(),
            },
        };
        let mut response = (status, Json(body)).into_response();
        if let RaglineError::CircuitOpen { retry_after, .. } = &self.0 {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
