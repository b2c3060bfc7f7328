// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy shared by every Ragline crate.

use std::time::Duration;

use thiserror::Error;

/// Boxed error source carried by variants that wrap a lower-level failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Ragline services and use cases.
#[derive(Debug, Error)]
pub enum RaglineError {
    /// Bad input. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or malformed credential.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Credential present but rejected.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Unknown agent, knowledge space, or conversation.
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Embedding, LLM, crawler, or datastore failure.
    #[error("{service} error: {message}")]
    ExternalService {
        service: String,
        message: String,
        /// HTTP status reported by the downstream, if any.
        status: Option<u16>,
        source: Option<BoxError>,
    },

    /// The circuit breaker guarding `service` is open and failing fast.
    #[error("circuit breaker open for {service}, retry after {retry_after:?}")]
    CircuitOpen {
        service: String,
        retry_after: Duration,
    },

    /// Local persistence errors (SQLite, migrations, serialization).
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Configuration errors (invalid TOML, missing required fields, bad ranges).
    #[error("configuration error: {0}")]
    Config(String),

    /// Misconfiguration or an unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RaglineError {
    /// Shorthand for an [`RaglineError::ExternalService`] without status or source.
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Shorthand for [`RaglineError::NotFound`].
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Wraps any error as a [`RaglineError::Storage`].
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures without a status, timeouts, 429 and any 5xx are
    /// transient. Every other 4xx is a caller bug and is never retried, and an
    /// open circuit must not be hammered by the retry loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExternalService { status: None, .. } => true,
            Self::ExternalService {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Stable machine-readable error kind, used in wire error bodies and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Authentication(_) => "authentication_error",
            Self::Authorization(_) => "authorization_error",
            Self::NotFound { .. } => "not_found_error",
            Self::ExternalService { .. } => "external_service_error",
            Self::CircuitOpen { .. } => "circuit_open_error",
            Self::Storage { .. } => "storage_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal_error",
        }
    }
}
