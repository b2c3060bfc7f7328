// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the gateway.
//!
//! Credentials are read from `Authorization` first, then `x-api-key`:
//! 1. A value matching a configured API key resolves to that key's identity.
//!    Keys may be sent bare or with a `Bearer`/`ApiKey` prefix.
//! 2. Otherwise a `Bearer <token>` value is compared against the configured
//!    bearer token and resolves to the bearer identity.
//!
//! Missing or malformed credentials are an authentication failure (401); a
//! well-formed credential that matches nothing is an authorization failure
//! (403). Only [`key_preview`]s ever reach the logs.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use metrics::counter;
use tracing::{debug, error, warn};

use ragline_config::model::AuthConfig;
use ragline_core::{AuthMethod, Identity, RaglineError};
use ragline_security::{constant_time_eq, key_preview};

use crate::error::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Resolves request credentials to an [`Identity`].
#[derive(Clone)]
pub struct Authenticator {
    bearer_token: Option<String>,
    bearer_identity: (String, String),
    api_keys: Vec<(String, Identity)>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[redacted]"))
            .field("api_keys", &self.api_keys.len())
            .finish()
    }
}

/// How a credential was presented.
#[derive(Clone, Copy)]
enum Presented<'a> {
    /// `Authorization: Bearer <token>`.
    Bearer(&'a str),
    /// A bare or `ApiKey`-prefixed value from either header.
    Key(&'a str),
}

impl Authenticator {
    pub fn from_config(config: &AuthConfig) -> Self {
        let api_keys = config
            .api_keys
            .iter()
            .map(|k| {
                (
                    k.key.trim().to_string(),
                    Identity {
                        tenant_id: k.tenant_id.clone(),
                        user_id: k.user_id.clone(),
                        auth_method: AuthMethod::ApiKey,
                    },
                )
            })
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self {
            bearer_token: config.bearer_token.clone().filter(|t| !t.trim().is_empty()),
            bearer_identity: (config.bearer_tenant_id.clone(), config.bearer_user_id.clone()),
            api_keys,
        }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, RaglineError> {
        let authorization = header_value(headers, AUTHORIZATION.as_str());
        let api_key = header_value(headers, API_KEY_HEADER);
        debug!(
            has_authorization = authorization.is_some(),
            has_api_key = api_key.is_some(),
            "authenticating request"
        );

        let presented = match (authorization, api_key) {
            (Some(value), _) => parse_authorization(value)?,
            (None, Some(value)) => Presented::Key(strip_key_prefix(value)),
            (None, None) => {
                return Err(RaglineError::Authentication(
                    "missing Authorization or x-api-key header".into(),
                ));
            }
        };

        let candidate = match presented {
            Presented::Bearer(token) | Presented::Key(token) => token,
        };
        if let Some(identity) = self.lookup_key(candidate) {
            return Ok(identity);
        }

        match presented {
            Presented::Bearer(token) => self.check_bearer(token),
            Presented::Key(key) => {
                warn!(key = %key_preview(key), "rejected unknown API key");
                Err(RaglineError::Authorization("invalid API key".into()))
            }
        }
    }

    fn lookup_key(&self, candidate: &str) -> Option<Identity> {
        // Compare against every key so timing does not reveal the match position.
        let mut found = None;
        for (key, identity) in &self.api_keys {
            if constant_time_eq(candidate, key) && found.is_none() {
                found = Some(identity.clone());
            }
        }
        found
    }

    fn check_bearer(&self, token: &str) -> Result<Identity, RaglineError> {
        let Some(expected) = &self.bearer_token else {
            if self.api_keys.is_empty() {
                error!("no bearer token or API keys configured");
                return Err(RaglineError::Internal(
                    "authentication is not configured".into(),
                ));
            }
            warn!(token = %key_preview(token), "rejected bearer credential");
            return Err(RaglineError::Authorization("invalid credentials".into()));
        };
        if constant_time_eq(token, expected) {
            let (tenant_id, user_id) = self.bearer_identity.clone();
            Ok(Identity {
                tenant_id,
                user_id,
                auth_method: AuthMethod::Bearer,
            })
        } else {
            warn!(token = %key_preview(token), "rejected bearer token");
            Err(RaglineError::Authorization("invalid bearer token".into()))
        }
    }
}

/// Trimmed, non-empty header value.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_authorization(value: &str) -> Result<Presented<'_>, RaglineError> {
    match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = rest.trim();
            if token.is_empty() || token.contains(char::is_whitespace) {
                return Err(RaglineError::Authentication(
                    "malformed bearer credential".into(),
                ));
            }
            Ok(Presented::Bearer(token))
        }
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("apikey") => Ok(Presented::Key(rest.trim())),
        Some(_) => Err(RaglineError::Authentication(
            "unsupported authorization scheme".into(),
        )),
        None if value.eq_ignore_ascii_case("bearer") => Err(RaglineError::Authentication(
            "malformed bearer credential".into(),
        )),
        None => Ok(Presented::Key(value)),
    }
}

fn strip_key_prefix(value: &str) -> &str {
    for prefix in ["Bearer ", "bearer ", "ApiKey ", "apikey "] {
        if let Some(rest) = value.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    value
}

/// Resolves the caller and stores the [`Identity`] as a request extension.
/// Authenticates and counts rejections by error type.
fn authenticate_counted(auth: &Authenticator, headers: &HeaderMap) -> Result<Identity, RaglineError> {
    auth.authenticate(headers).inspect_err(|e| {
        counter!("ragline_auth_failures_total", "type" => e.kind()).increment(1);
    })
}

pub async fn auth_middleware(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = authenticate_counted(&auth, request.headers())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
