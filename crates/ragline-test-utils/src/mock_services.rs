// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock crawler and embedder.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use ragline_core::{
    AdapterType, CrawledPage, CrawlerService, Embedding, EmbeddingService, HealthStatus,
    PluginAdapter, RaglineError,
};

macro_rules! mock_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, RaglineError> {
                Ok(HealthStatus::Healthy)
            }
        }
    };
}

/// Serves registered pages. Unregistered URLs fail like an unreachable host.
#[derive(Default)]
pub struct MockCrawler {
    pages: Mutex<HashMap<String, CrawledPage>>,
    calls: AtomicUsize,
}

impl MockCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, title: &str, text: &str) -> Self {
        self.add_page(url, title, text);
        self
    }

    pub fn add_page(&self, url: &str, title: &str, text: &str) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(
                url.to_string(),
                CrawledPage {
                    url: url.to_string(),
                    title: Some(title.to_string()),
                    text: text.to_string(),
                },
            );
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

mock_adapter!(MockCrawler, "mock-crawler", AdapterType::Crawler);

#[async_trait]
impl CrawlerService for MockCrawler {
    async fn fetch(&self, url: &str) -> Result<CrawledPage, RaglineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = self.pages.lock().ok().and_then(|p| p.get(url).cloned());
        page.ok_or_else(|| RaglineError::ExternalService {
            service: "crawler".into(),
            message: format!("GET {url} returned 404 Not Found"),
            status: Some(404),
            source: None,
        })
    }
}

/// Bag-of-words embedding: each lowercase word is hashed into one of
/// [`MockEmbedder::DIMENSIONS`] buckets. Texts sharing words score high;
/// texts sharing none score near zero.
#[derive(Default)]
pub struct MockEmbedder {
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub const DIMENSIONS: usize = 256;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; Self::DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let word = word.to_lowercase();
            // FNV-1a
            let hash = word
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
            v[(hash % Self::DIMENSIONS as u64) as usize] += 1.0;
        }
        v
    }
}

mock_adapter!(MockEmbedder, "mock-embedder", AdapterType::Embedding);

#[async_trait]
impl EmbeddingService for MockEmbedder {
    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }

    async fn embed(&self, text: &str) -> Result<Embedding, RaglineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Embedding::new(Self::vector(text), Self::DIMENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_words_score_higher_than_unrelated_text() {
        let embedder = MockEmbedder::new();
        let doc = embedder.embed("Orders ship within two business days").await.unwrap();
        let related = embedder.embed("Do orders ship within two days?").await.unwrap();
        let unrelated = embedder.embed("Quantum chromodynamics lecture").await.unwrap();
        assert!(doc.cosine_similarity(&related).unwrap() > 0.5);
        assert!(doc.cosine_similarity(&unrelated).unwrap() < 0.35);
        assert_eq!(embedder.call_count(), 3);
    }

    #[tokio::test]
    async fn unknown_pages_fail_with_404() {
        let crawler = MockCrawler::new().with_page("https://a.test", "A", "alpha");
        assert_eq!(crawler.fetch("https://a.test").await.unwrap().text, "alpha");
        let err = crawler.fetch("https://b.test").await.unwrap_err();
        assert!(matches!(err, RaglineError::ExternalService { status: Some(404), .. }));
        assert_eq!(crawler.call_count(), 2);
    }
}
