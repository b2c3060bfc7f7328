// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait that every pluggable collaborator implements.

use async_trait::async_trait;

use crate::error::RaglineError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for all Ragline collaborators.
///
/// Crawlers, embedding providers, and LLM providers implement this trait,
/// which provides identity and health check capabilities.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this collaborator instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this collaborator.
    fn version(&self) -> semver::Version;

    /// Returns the kind of collaborator.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the collaborator's current status.
    async fn health_check(&self) -> Result<HealthStatus, RaglineError>;
}
