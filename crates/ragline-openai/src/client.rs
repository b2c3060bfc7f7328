// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible APIs.
//!
//! Handles authentication, request construction, and the mapping of HTTP
//! failures onto [`RaglineError::ExternalService`] with the response status,
//! so the resilience layer can tell transient failures from permanent ones.
//! The client itself never retries.

use std::time::Duration;

use ragline_core::RaglineError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::ApiErrorResponse;

#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, RaglineError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| RaglineError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RaglineError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POSTs `body` to `{base_url}{path}` and returns the successful response.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        service: &str,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, RaglineError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(service, e))?;

        let status = response.status();
        debug!(service, status = %status, "response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => format!(
                "API error ({}): {}",
                api_err.error.type_.as_deref().unwrap_or("unknown"),
                api_err.error.message
            ),
            Err(_) => format!("API returned {status}: {body}"),
        };
        Err(RaglineError::ExternalService {
            service: service.to_string(),
            message,
            status: Some(status.as_u16()),
            source: None,
        })
    }

    /// POSTs and decodes a JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        body: &B,
    ) -> Result<T, RaglineError> {
        let response = self.post(service, path, body).await?;
        let text = response.text().await.map_err(|e| transport_error(service, e))?;
        serde_json::from_str(&text).map_err(|e| RaglineError::ExternalService {
            service: service.to_string(),
            message: format!("failed to parse API response: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })
    }
}

fn transport_error(service: &str, e: reqwest::Error) -> RaglineError {
    if e.is_timeout() {
        return RaglineError::ExternalService {
            service: service.to_string(),
            message: format!("request timed out: {e}"),
            status: Some(504),
            source: Some(Box::new(e)),
        };
    }
    RaglineError::ExternalService {
        service: service.to_string(),
        message: format!("HTTP request failed: {e}"),
        status: None,
        source: Some(Box::new(e)),
    }
}
