// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crawler trait for fetching source documents.

use async_trait::async_trait;

use crate::error::RaglineError;
use crate::traits::adapter::PluginAdapter;

/// Text extracted from one fetched source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawledPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

/// Fetches a URL and returns its readable text.
#[async_trait]
pub trait CrawlerService: PluginAdapter {
    async fn fetch(&self, url: &str) -> Result<CrawledPage, RaglineError>;
}
