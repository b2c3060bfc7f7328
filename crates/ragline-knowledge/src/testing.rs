// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal collaborators for this crate's unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ragline_core::{
    AdapterType, CrawledPage, CrawlerService, Embedding, EmbeddingService, HealthStatus,
    PluginAdapter, RaglineError, Tokenizer,
};

pub const DIMS: usize = 8;

macro_rules! test_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }
            fn version(&self) -> semver::Version {
                semver::Version::new(0, 0, 0)
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

/// Serves fixed pages; unknown URLs fail with a 404.
#[derive(Default)]
pub struct MapCrawler {
    pages: HashMap<String, String>,
}

impl MapCrawler {
    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }
}

test_adapter!(MapCrawler, "map-crawler", AdapterType::Crawler);

#[async_trait]
impl CrawlerService for MapCrawler {
    async fn fetch(&self, url: &str) -> Result<CrawledPage, RaglineError> {
        match self.pages.get(url) {
            Some(text) => Ok(CrawledPage {
                url: url.to_string(),
                title: Some(format!("Title of {url}")),
                text: text.clone(),
            }),
            None => Err(RaglineError::ExternalService {
                service: "crawler".into(),
                message: format!("GET {url} returned 404"),
                status: Some(404),
                source: None,
            }),
        }
    }
}

/// Deterministic bag-of-bytes embedding.
#[derive(Default)]
pub struct HashEmbedder {
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn vector(text: &str) -> Embedding {
        let mut v = vec![0.0f32; DIMS];
        for (i, b) in text.bytes().enumerate() {
            v[(i + b as usize) % DIMS] += 1.0;
        }
        Embedding::new(v, DIMS).unwrap()
    }
}

test_adapter!(HashEmbedder, "hash-embedder", AdapterType::Embedding);

#[async_trait]
impl EmbeddingService for HashEmbedder {
    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed(&self, text: &str) -> Result<Embedding, RaglineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }
}

/// Whitespace tokenizer over a shared vocabulary.
#[derive(Default)]
pub struct WordTokenizer {
    vocab: std::sync::Mutex<Vec<String>>,
}

impl Tokenizer for WordTokenizer {
    fn name(&self) -> &str {
        "words"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        let mut vocab = self.vocab.lock().unwrap();
        text.split_whitespace()
            .map(|w| match vocab.iter().position(|v| v == w) {
                Some(i) => i as u32,
                None => {
                    vocab.push(w.to_string());
                    (vocab.len() - 1) as u32
                }
            })
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, RaglineError> {
        let vocab = self.vocab.lock().unwrap();
        Ok(tokens
            .iter()
            .map(|t| vocab[*t as usize].as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

pub fn tokenizer() -> Arc<dyn Tokenizer> {
    Arc::new(WordTokenizer::default())
}
