// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge-space construction for the Ragline service.
//!
//! ## Architecture
//!
//! - **Chunker**: token-bounded sliding-window splitting
//! - **IngestKnowledgeSpace**: concurrent crawl → chunk → embed → store per source URL
//! - **IngestProductCatalog**: markdown catalog parsing, one chunk per product
//! - **KnowledgeSpaceCatalog**: tenant-scoped list / get / delete
//! - **HttpCrawler**: SSRF-safe reqwest crawler with HTML-to-text rendering

pub mod catalog;
pub mod chunker;
pub mod crawler;
pub mod ingest;
pub mod product;

#[cfg(test)]
mod testing;

pub use catalog::{DeleteOutcome, KnowledgeSpaceCatalog};
pub use chunker::{ChunkConfig, Chunker, TextChunk};
pub use crawler::{CrawlerOptions, HttpCrawler};
pub use ingest::{IngestKnowledgeSpace, IngestOutcome, IngestRequest, UrlError};
pub use product::{
    IngestProductCatalog, Product, ProductIngestOutcome, ProductIngestRequest, parse_catalog,
};

/// Returns a fresh knowledge-space version: `v{yyyymmddHHMMSS}-{8 hex chars}`.
///
/// Versions sort by creation second; the random suffix keeps runs within the
/// same second distinct.
pub fn next_version() -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("v{stamp}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_unique_and_well_formed() {
        let a = next_version();
        let b = next_version();
        assert_ne!(a, b);
        assert_eq!(a.len(), 1 + 14 + 1 + 8);
        assert!(a.starts_with('v'));
        assert!(a[1..15].chars().all(|c| c.is_ascii_digit()));
    }
}
