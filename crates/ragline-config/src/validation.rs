// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as token-window ordering, required retrieval tuning, and unique API keys.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{RaglineConfig, StorageBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RaglineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(invalid("server.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(invalid(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    validate_auth(config, &mut errors);
    validate_chunking(config, &mut errors);
    validate_retrieval(config, &mut errors);

    if config.openai.embedding_dimensions == 0 {
        errors.push(invalid("openai.embedding_dimensions must be greater than 0"));
    }
    if !config.openai.base_url.starts_with("http://") && !config.openai.base_url.starts_with("https://") {
        errors.push(invalid(format!(
            "openai.base_url `{}` must start with http:// or https://",
            config.openai.base_url
        )));
    }

    let res = &config.resilience;
    if res.max_attempts == 0 {
        errors.push(invalid("resilience.max_attempts must be at least 1"));
    }
    if res.failure_threshold == 0 {
        errors.push(invalid("resilience.failure_threshold must be at least 1"));
    }
    if res.initial_delay_ms > res.max_delay_ms {
        errors.push(invalid(format!(
            "resilience.initial_delay_ms ({}) must not exceed resilience.max_delay_ms ({})",
            res.initial_delay_ms, res.max_delay_ms
        )));
    }

    if config.ingestion.max_concurrency == 0 {
        errors.push(invalid("ingestion.max_concurrency must be at least 1"));
    }

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        errors.push(invalid("storage.database_path must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_auth(config: &RaglineConfig, errors: &mut Vec<ConfigError>) {
    if let Some(token) = &config.auth.bearer_token
        && token.trim().is_empty()
    {
        errors.push(invalid("auth.bearer_token must not be blank when set"));
    }

    let mut seen = HashSet::new();
    for (i, key) in config.auth.api_keys.iter().enumerate() {
        if key.key.trim().is_empty() {
            errors.push(invalid(format!("auth.api_keys[{i}].key must not be empty")));
        } else if !seen.insert(key.key.trim()) {
            errors.push(invalid(format!("auth.api_keys[{i}] duplicates an earlier key")));
        }
        if key.tenant_id.trim().is_empty() {
            errors.push(invalid(format!("auth.api_keys[{i}].tenant_id must not be empty")));
        }
    }
}

fn validate_chunking(config: &RaglineConfig, errors: &mut Vec<ConfigError>) {
    let c = &config.chunking;
    if c.min_tokens == 0 {
        errors.push(invalid("chunking.min_tokens must be greater than 0"));
    }
    if c.max_tokens <= c.min_tokens {
        errors.push(invalid(format!(
            "chunking.max_tokens ({}) must be greater than chunking.min_tokens ({})",
            c.max_tokens, c.min_tokens
        )));
    }
    if c.overlap_tokens >= c.max_tokens {
        errors.push(invalid(format!(
            "chunking.overlap_tokens ({}) must be less than chunking.max_tokens ({})",
            c.overlap_tokens, c.max_tokens
        )));
    }
}

fn validate_retrieval(config: &RaglineConfig, errors: &mut Vec<ConfigError>) {
    let r = &config.retrieval;
    match r.top_k {
        None => errors.push(ConfigError::MissingKey {
            key: "retrieval.top_k".to_string(),
        }),
        Some(0) => errors.push(invalid("retrieval.top_k must be at least 1")),
        Some(_) => {}
    }
    match r.similarity_threshold {
        None => errors.push(ConfigError::MissingKey {
            key: "retrieval.similarity_threshold".to_string(),
        }),
        Some(t) if !(-1.0..=1.0).contains(&t) => errors.push(invalid(format!(
            "retrieval.similarity_threshold must be within [-1, 1], got {t}"
        ))),
        Some(_) => {}
    }
    if r.max_context_chunks == 0 {
        errors.push(invalid("retrieval.max_context_chunks must be at least 1"));
    }
}
