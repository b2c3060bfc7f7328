// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web knowledge-space ingestion.
//!
//! Each source URL is crawled, chunked, embedded, and upserted independently
//! with bounded concurrency. A failing URL is recorded as data and never
//! aborts the batch. The [`KnowledgeSpace`] record is written exactly once,
//! after every URL has an outcome, so a space is never visible half-built.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use ragline_core::{
    Chunk, CrawlerService, EmbeddedChunk, EmbeddingService, IngestionSummary, KnowledgeSpace,
    KnowledgeSpaceRepository, KnowledgeSpaceStatus, KnowledgeSpaceType, Namespace, ParseError,
    RaglineError, VectorRepository,
};

use crate::chunker::Chunker;
use crate::next_version;

/// Input of a web ingestion run.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub tenant_id: String,
    pub name: String,
    pub source_urls: Vec<String>,
    pub request_id: Option<String>,
}

/// One failed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlError {
    pub url: String,
    pub error: String,
}

/// Result of a web ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub knowledge_space_id: String,
    pub version: String,
    pub status: KnowledgeSpaceStatus,
    pub successful_urls: usize,
    pub failed_urls: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<UrlError>,
}

/// Crawl → chunk → embed → store, per URL.
pub struct IngestKnowledgeSpace {
    crawler: Arc<dyn CrawlerService>,
    embedder: Arc<dyn EmbeddingService>,
    vectors: Arc<dyn VectorRepository>,
    spaces: Arc<dyn KnowledgeSpaceRepository>,
    chunker: Chunker,
    max_concurrency: usize,
}

impl IngestKnowledgeSpace {
    pub fn new(
        crawler: Arc<dyn CrawlerService>,
        embedder: Arc<dyn EmbeddingService>,
        vectors: Arc<dyn VectorRepository>,
        spaces: Arc<dyn KnowledgeSpaceRepository>,
        chunker: Chunker,
        max_concurrency: usize,
    ) -> Self {
        Self {
            crawler,
            embedder,
            vectors,
            spaces,
            chunker,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Runs the ingestion to completion.
    ///
    /// Only malformed input and the final metadata write can fail the call;
    /// per-URL failures are reported in the returned [`IngestOutcome`].
    pub async fn execute(&self, request: IngestRequest) -> Result<IngestOutcome, RaglineError> {
        validate(&request)?;

        let knowledge_space_id = uuid::Uuid::new_v4().to_string();
        let version = next_version();
        let namespace = Namespace::new(&request.tenant_id, &knowledge_space_id, &version);

        info!(
            tenant_id = %request.tenant_id,
            knowledge_space_id = %knowledge_space_id,
            request_id = request.request_id.as_deref().unwrap_or("-"),
            urls = request.source_urls.len(),
            "starting knowledge space ingestion"
        );

        let mut results: Vec<(usize, Result<usize, RaglineError>)> =
            futures::stream::iter(0..request.source_urls.len())
                .map(|index| {
                    let url = request.source_urls[index].as_str();
                    let namespace = &namespace;
                    async move { (index, self.ingest_source(namespace, url).await) }
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;
        results.sort_by_key(|(index, _)| *index);

        let mut summary = IngestionSummary::default();
        let mut errors = Vec::new();
        let mut chunk_total = 0;
        for (index, result) in results {
            let url = &request.source_urls[index];
            match result {
                Ok(stored) => {
                    summary.success_count += 1;
                    chunk_total += stored;
                    counter!("ragline_ingested_urls_total", "outcome" => "success").increment(1);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "source ingestion failed");
                    counter!("ragline_ingested_urls_total", "outcome" => "failure").increment(1);
                    summary.failure_count += 1;
                    summary
                        .errors
                        .push(ParseError::new(index, Some("sourceUrls"), e.to_string()));
                    errors.push(UrlError {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let status = KnowledgeSpaceStatus::from_counts(summary.success_count, summary.failure_count);
        let space = KnowledgeSpace {
            tenant_id: request.tenant_id.clone(),
            knowledge_space_id: knowledge_space_id.clone(),
            name: request.name.trim().to_string(),
            space_type: KnowledgeSpaceType::Web,
            source_urls: request.source_urls.clone(),
            current_version: version.clone(),
            status,
            document_count: chunk_total,
            summary: summary.clone(),
            created_at: Utc::now(),
        };
        self.spaces.save(&space).await?;

        info!(
            knowledge_space_id = %knowledge_space_id,
            status = %status,
            succeeded = summary.success_count,
            failed = summary.failure_count,
            chunks = chunk_total,
            "knowledge space ingestion finished"
        );

        Ok(IngestOutcome {
            knowledge_space_id,
            version,
            status,
            successful_urls: summary.success_count,
            failed_urls: summary.failure_count,
            errors,
        })
    }

    /// Processes one URL and returns the number of chunks stored.
    async fn ingest_source(&self, namespace: &Namespace, url: &str) -> Result<usize, RaglineError> {
        let page = self.crawler.fetch(url).await?;
        if page.text.trim().is_empty() {
            return Err(RaglineError::Validation(format!(
                "no text content retrieved from {url}"
            )));
        }

        let pieces = self.chunker.chunk(&page.text)?;
        let texts: Vec<String> = pieces.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != pieces.len() {
            return Err(RaglineError::external(
                "embedding",
                format!(
                    "expected {} embeddings, received {}",
                    pieces.len(),
                    embeddings.len()
                ),
            ));
        }

        let chunks: Vec<EmbeddedChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .map(|(piece, embedding)| EmbeddedChunk {
                chunk: Chunk {
                    knowledge_space_id: namespace.knowledge_space_id.clone(),
                    version: namespace.version.clone(),
                    chunk_id: uuid::Uuid::new_v4().to_string(),
                    source_url: page.url.clone(),
                    title: page.title.clone(),
                    text: piece.text,
                    token_count: piece.token_count,
                },
                embedding,
            })
            .collect();

        let stored = chunks.len();
        self.vectors.upsert(namespace, chunks).await?;
        counter!("ragline_chunks_stored_total").increment(stored as u64);
        Ok(stored)
    }
}

fn validate(request: &IngestRequest) -> Result<(), RaglineError> {
    if request.tenant_id.trim().is_empty() {
        return Err(RaglineError::Validation("tenantId must not be empty".into()));
    }
    if request.name.trim().is_empty() {
        return Err(RaglineError::Validation("name must not be empty".into()));
    }
    if request.source_urls.is_empty() {
        return Err(RaglineError::Validation(
            "sourceUrls must contain at least one URL".into(),
        ));
    }
    if request.source_urls.iter().any(|u| u.trim().is_empty()) {
        return Err(RaglineError::Validation(
            "sourceUrls must not contain empty entries".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkConfig;
    use crate::testing::{HashEmbedder, MapCrawler, tokenizer};
    use ragline_storage::MemoryStore;

    fn use_case(crawler: MapCrawler, store: Arc<MemoryStore>) -> IngestKnowledgeSpace {
        let chunker = Chunker::new(
            tokenizer(),
            ChunkConfig { min_tokens: 2, max_tokens: 4, overlap_tokens: 1 },
        )
        .unwrap();
        IngestKnowledgeSpace::new(
            Arc::new(crawler),
            Arc::new(HashEmbedder::default()),
            store.clone(),
            store,
            chunker,
            2,
        )
    }

    fn request(urls: &[&str]) -> IngestRequest {
        IngestRequest {
            tenant_id: "tenant-a".into(),
            name: "Docs".into(),
            source_urls: urls.iter().map(|u| u.to_string()).collect(),
            request_id: Some("req-1".into()),
        }
    }

    #[tokio::test]
    async fn wholly_failed_ingestion_reports_error_status() {
        let store = Arc::new(MemoryStore::new());
        let outcome = use_case(MapCrawler::default(), store.clone())
            .execute(request(&["https://a.example"]))
            .await
            .unwrap();

        assert_eq!(outcome.status, KnowledgeSpaceStatus::Error);
        assert_eq!(outcome.successful_urls, 0);
        assert_eq!(outcome.failed_urls, 1);
        assert_eq!(outcome.errors[0].url, "https://a.example");

        let saved = KnowledgeSpaceRepository::find(store.as_ref(), "tenant-a", &outcome.knowledge_space_id)
            .await
            .unwrap()
            .expect("space saved even when every source failed");
        assert_eq!(saved.status, KnowledgeSpaceStatus::Error);
        assert_eq!(saved.summary.failure_count, 1);
    }

    #[tokio::test]
    async fn mixed_outcome_is_partial_and_stores_successful_chunks() {
        let store = Arc::new(MemoryStore::new());
        let crawler = MapCrawler::default()
            .with_page("https://b.example", "one two three four five six seven eight");
        let outcome = use_case(crawler, store.clone())
            .execute(request(&["https://a.example", "https://b.example"]))
            .await
            .unwrap();

        assert_eq!(outcome.status, KnowledgeSpaceStatus::Partial);
        assert_eq!(outcome.successful_urls, 1);
        assert_eq!(outcome.failed_urls, 1);

        let space = KnowledgeSpaceRepository::find(store.as_ref(), "tenant-a", &outcome.knowledge_space_id)
            .await
            .unwrap()
            .unwrap();
        let chunks = store.list_chunks(&space.current_namespace()).await.unwrap();
        assert_eq!(chunks.len(), space.document_count);
        assert!(chunks.iter().all(|c| c.source_url == "https://b.example"));
        assert!(chunks.iter().all(|c| c.token_count <= 4));
    }

    #[tokio::test]
    async fn all_sources_succeeding_is_completed() {
        let store = Arc::new(MemoryStore::new());
        let crawler = MapCrawler::default()
            .with_page("https://a.example", "alpha beta")
            .with_page("https://b.example", "gamma delta");
        let outcome = use_case(crawler, store)
            .execute(request(&["https://a.example", "https://b.example"]))
            .await
            .unwrap();
        assert_eq!(outcome.status, KnowledgeSpaceStatus::Completed);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn errors_follow_source_order() {
        let store = Arc::new(MemoryStore::new());
        let urls = ["https://1.example", "https://2.example", "https://3.example", "https://4.example"];
        let outcome = use_case(MapCrawler::default(), store)
            .execute(request(&urls))
            .await
            .unwrap();
        let failed: Vec<_> = outcome.errors.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(failed, urls);
    }

    #[tokio::test]
    async fn empty_page_counts_as_failure() {
        let store = Arc::new(MemoryStore::new());
        let crawler = MapCrawler::default().with_page("https://a.example", "   ");
        let outcome = use_case(crawler, store)
            .execute(request(&["https://a.example"]))
            .await
            .unwrap();
        assert_eq!(outcome.status, KnowledgeSpaceStatus::Error);
    }

    #[tokio::test]
    async fn reingestion_creates_a_new_space_and_version() {
        let store = Arc::new(MemoryStore::new());
        let crawler = MapCrawler::default().with_page("https://a.example", "alpha beta");
        let uc = use_case(crawler, store);
        let first = uc.execute(request(&["https://a.example"])).await.unwrap();
        let second = uc.execute(request(&["https://a.example"])).await.unwrap();
        assert_ne!(first.knowledge_space_id, second.knowledge_space_id);
        assert_ne!(first.version, second.version);
    }

    #[tokio::test]
    async fn malformed_requests_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let uc = use_case(MapCrawler::default(), store);
        assert!(matches!(
            uc.execute(request(&[])).await,
            Err(RaglineError::Validation(_))
        ));
        let mut blank_name = request(&["https://a.example"]);
        blank_name.name = "  ".into();
        assert!(matches!(
            uc.execute(blank_name).await,
            Err(RaglineError::Validation(_))
        ));
    }

    #[test]
    fn outcome_serializes_in_camel_case() {
        let outcome = IngestOutcome {
            knowledge_space_id: "ks".into(),
            version: "v1".into(),
            status: KnowledgeSpaceStatus::Partial,
            successful_urls: 1,
            failed_urls: 0,
            errors: vec![],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["knowledgeSpaceId"], "ks");
        assert_eq!(json["status"], "partial");
        assert!(json.get("errors").is_none());
    }
}
