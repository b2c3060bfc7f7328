// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator wrappers that route every call through a [`Guard`].
//!
//! Use cases receive these instead of the raw providers, so retry and
//! breaker policy is applied uniformly at construction time.

use std::sync::Arc;

use async_trait::async_trait;
use ragline_core::{
    AdapterType, Chunk, CrawledPage, CrawlerService, EmbeddedChunk, Embedding, EmbeddingService,
    HealthStatus, LlmService, Namespace, PluginAdapter, RaglineError, ScoredChunk, TokenStream,
    VectorRepository,
};

use crate::Guard;

macro_rules! delegate_plugin {
    ($ty:ident) => {
        #[async_trait]
        impl<T: PluginAdapter + ?Sized> PluginAdapter for $ty<T> {
            fn name(&self) -> &str {
                self.inner.name()
            }

            fn version(&self) -> semver::Version {
                self.inner.version()
            }

            fn adapter_type(&self) -> AdapterType {
                self.inner.adapter_type()
            }

            async fn health_check(&self) -> Result<HealthStatus, RaglineError> {
                if self.guard.breaker().state() == crate::CircuitState::Open {
                    return Ok(HealthStatus::Degraded(format!(
                        "circuit breaker open for {}",
                        self.guard.service()
                    )));
                }
                self.inner.health_check().await
            }
        }
    };
}

/// Guarded [`EmbeddingService`].
pub struct GuardedEmbedding<T: ?Sized> {
    inner: Arc<T>,
    guard: Guard,
}

impl<T: ?Sized> GuardedEmbedding<T> {
    pub fn new(inner: Arc<T>, guard: Guard) -> Self {
        Self { inner, guard }
    }
}

delegate_plugin!(GuardedEmbedding);

#[async_trait]
impl<T: EmbeddingService + ?Sized> EmbeddingService for GuardedEmbedding<T> {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Embedding, RaglineError> {
        self.guard.run(|| self.inner.embed(text)).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, RaglineError> {
        self.guard.run(|| self.inner.embed_batch(texts)).await
    }
}

/// Guarded [`LlmService`].
///
/// For streams, only establishing the stream is guarded. Errors after the
/// first delta reach the caller as stream items.
pub struct GuardedLlm<T: ?Sized> {
    inner: Arc<T>,
    guard: Guard,
}

impl<T: ?Sized> GuardedLlm<T> {
    pub fn new(inner: Arc<T>, guard: Guard) -> Self {
        Self { inner, guard }
    }
}

delegate_plugin!(GuardedLlm);

#[async_trait]
impl<T: LlmService + ?Sized> LlmService for GuardedLlm<T> {
    async fn complete(&self, prompt: &str) -> Result<String, RaglineError> {
        self.guard.run(|| self.inner.complete(prompt)).await
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream, RaglineError> {
        self.guard.run(|| self.inner.stream(prompt)).await
    }
}

/// Guarded [`CrawlerService`].
pub struct GuardedCrawler<T: ?Sized> {
    inner: Arc<T>,
    guard: Guard,
}

impl<T: ?Sized> GuardedCrawler<T> {
    pub fn new(inner: Arc<T>, guard: Guard) -> Self {
        Self { inner, guard }
    }
}

delegate_plugin!(GuardedCrawler);

#[async_trait]
impl<T: CrawlerService + ?Sized> CrawlerService for GuardedCrawler<T> {
    async fn fetch(&self, url: &str) -> Result<CrawledPage, RaglineError> {
        self.guard.run(|| self.inner.fetch(url)).await
    }
}

/// Guarded [`VectorRepository`].
pub struct GuardedVectors<T: ?Sized> {
    inner: Arc<T>,
    guard: Guard,
}

impl<T: ?Sized> GuardedVectors<T> {
    pub fn new(inner: Arc<T>, guard: Guard) -> Self {
        Self { inner, guard }
    }
}

#[async_trait]
impl<T: VectorRepository + ?Sized> VectorRepository for GuardedVectors<T> {
    async fn upsert(
        &self,
        namespace: &Namespace,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<(), RaglineError> {
        self.guard
            .run(|| self.inner.upsert(namespace, chunks.clone()))
            .await
    }

    async fn query(
        &self,
        namespace: &Namespace,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RaglineError> {
        self.guard
            .run(|| self.inner.query(namespace, embedding, top_k))
            .await
    }

    async fn list_chunks(&self, namespace: &Namespace) -> Result<Vec<Chunk>, RaglineError> {
        self.guard.run(|| self.inner.list_chunks(namespace)).await
    }

    async fn delete_space(
        &self,
        tenant_id: &str,
        knowledge_space_id: &str,
    ) -> Result<usize, RaglineError> {
        self.guard
            .run(|| self.inner.delete_space(tenant_id, knowledge_space_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::{BreakerConfig, BreakerRegistry, RetryPolicy};

    struct FlakyEmbedder {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl PluginAdapter for FlakyEmbedder {
        fn name(&self) -> &str {
            "flaky"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Embedding
        }
        async fn health_check(&self) -> Result<HealthStatus, RaglineError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl EmbeddingService for FlakyEmbedder {
        fn dimensions(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Embedding, RaglineError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(RaglineError::ExternalService {
                    service: "embedding".into(),
                    message: "unavailable".into(),
                    status: Some(503),
                    source: None,
                })
            } else {
                Embedding::new(vec![1.0, 0.0], 2)
            }
        }
    }

    fn registry(threshold: u32) -> BreakerRegistry {
        BreakerRegistry::new(
            BreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_secs(30),
            },
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_embedding_retries_transient_failures() {
        let inner = Arc::new(FlakyEmbedder {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let guarded = GuardedEmbedding::new(inner.clone(), registry(10).guard("embedding"));
        let e = guarded.embed("hello").await.unwrap();
        assert_eq!(e.dimensions(), 2);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_reports_degraded_health() {
        let inner = Arc::new(FlakyEmbedder {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        });
        let guarded = GuardedEmbedding::new(inner, registry(1).guard("embedding"));
        assert!(guarded.embed("x").await.is_err());
        assert!(matches!(
            guarded.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
