// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Product-catalog knowledge spaces.
//!
//! A catalog is a markdown document in which each product is delimited by
//! `--- item start ---` and `--- item end ---` lines. Inside an item,
//! `key: value` lines set fields and an optional `### description` block
//! holds a multi-line description. Every product becomes one chunk.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::info;

use ragline_core::{
    Chunk, EmbeddedChunk, EmbeddingService, IngestionSummary, KnowledgeSpace,
    KnowledgeSpaceRepository, KnowledgeSpaceStatus, KnowledgeSpaceType, Namespace, ParseError,
    RaglineError, Tokenizer, VectorRepository,
};

use crate::next_version;

const ITEM_START: &str = "--- item start ---";
const ITEM_END: &str = "--- item end ---";
const DESCRIPTION_HEADING: &str = "### description";
const MAX_NAME_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub availability: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
}

impl Product {
    /// Text embedded and retrieved for this product.
    pub fn to_chunk_text(&self) -> String {
        let mut parts = vec![self.name.clone(), self.description.clone()];
        if let Some(category) = &self.category {
            parts.push(format!("Category: {category}"));
        }
        if let Some(brand) = &self.brand {
            parts.push(format!("Brand: {brand}"));
        }
        if let Some(price) = self.price {
            let currency = self.currency.as_deref().unwrap_or("USD");
            parts.push(format!("Price: {price} {currency}"));
        }
        if let Some(availability) = &self.availability {
            parts.push(format!("Availability: {availability}"));
        }
        if !self.tags.is_empty() {
            parts.push(format!("Tags: {}", self.tags.join(", ")));
        }
        parts.join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogParse {
    pub products: Vec<Product>,
    pub errors: Vec<ParseError>,
    pub total_items: usize,
}

/// Parses a markdown product catalog. Never fails as a whole; each bad item
/// yields a [`ParseError`].
pub fn parse_catalog(content: &str) -> CatalogParse {
    let items = extract_items(content);
    let mut parse = CatalogParse {
        total_items: items.len(),
        ..Default::default()
    };
    for (index, item) in items.iter().enumerate() {
        match parse_item(item, index) {
            Ok(product) => parse.products.push(product),
            Err(e) => parse.errors.push(e),
        }
    }
    parse
}

fn extract_items(content: &str) -> Vec<Vec<&str>> {
    let mut items = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in content.lines() {
        match line.trim() {
            ITEM_START => current = Some(Vec::new()),
            ITEM_END => {
                if let Some(lines) = current.take().filter(|l| !l.is_empty()) {
                    items.push(lines);
                }
            }
            _ => {
                if let Some(lines) = current.as_mut() {
                    lines.push(line);
                }
            }
        }
    }
    items
}

fn parse_item(lines: &[&str], index: usize) -> Result<Product, ParseError> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    let mut description_lines: Vec<&str> = Vec::new();
    let mut in_description = false;

    for line in lines {
        let trimmed = line.trim();
        if trimmed == DESCRIPTION_HEADING {
            in_description = true;
            continue;
        }
        if in_description {
            if trimmed.starts_with("###") || trimmed.starts_with("---") {
                in_description = false;
            } else {
                description_lines.push(line);
                continue;
            }
        }
        if let Some((key, value)) = line.split_once(':') {
            if !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_') {
                fields.insert(key, value.trim());
            }
        }
    }

    let description = if description_lines.is_empty() {
        fields.get("description").copied().unwrap_or_default().to_string()
    } else {
        description_lines.join("\n").trim().to_string()
    };
    let name = fields.get("name").copied().unwrap_or_default();

    if name.is_empty() {
        return Err(ParseError::new(index, Some("name"), "missing required field: name"));
    }
    if description.is_empty() {
        return Err(ParseError::new(
            index,
            Some("description"),
            "missing required field: description",
        ));
    }

    let price = match fields.get("price").filter(|p| !p.is_empty()) {
        Some(raw) => Some(raw.parse::<f64>().ok().filter(|p| p.is_finite()).ok_or_else(|| {
            ParseError::new(index, Some("price"), format!("invalid price: {raw}"))
        })?),
        None => None,
    };

    let tags = fields
        .get("tags")
        .and_then(|raw| raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')))
        .map(|inner| {
            inner
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let optional = |key: &str| {
        fields
            .get(key)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    };

    Ok(Product {
        id: optional("id").unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: name.chars().take(MAX_NAME_CHARS).collect(),
        description: description.chars().take(MAX_DESCRIPTION_CHARS).collect(),
        category: optional("category"),
        brand: optional("brand"),
        price,
        currency: optional("currency"),
        availability: optional("availability"),
        tags,
        image_url: optional("imageUrl"),
        product_url: optional("productUrl"),
    })
}

#[derive(Debug, Clone)]
pub struct ProductIngestRequest {
    pub tenant_id: String,
    pub name: String,
    pub file_content: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductIngestOutcome {
    pub knowledge_space_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub space_type: KnowledgeSpaceType,
    pub status: KnowledgeSpaceStatus,
    pub document_count: usize,
    pub summary: IngestionSummary,
}

/// Parses a catalog, embeds every product in one batch, and stores it as a
/// new product knowledge space.
pub struct IngestProductCatalog {
    embedder: Arc<dyn EmbeddingService>,
    vectors: Arc<dyn VectorRepository>,
    spaces: Arc<dyn KnowledgeSpaceRepository>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl IngestProductCatalog {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        vectors: Arc<dyn VectorRepository>,
        spaces: Arc<dyn KnowledgeSpaceRepository>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        Self {
            embedder,
            vectors,
            spaces,
            tokenizer,
        }
    }

    pub async fn execute(
        &self,
        request: ProductIngestRequest,
    ) -> Result<ProductIngestOutcome, RaglineError> {
        if request.tenant_id.trim().is_empty() {
            return Err(RaglineError::Validation("tenantId must not be empty".into()));
        }
        if request.name.trim().is_empty() {
            return Err(RaglineError::Validation("name must not be empty".into()));
        }
        if request.file_content.trim().is_empty() {
            return Err(RaglineError::Validation("fileContent must not be empty".into()));
        }

        let parsed = parse_catalog(&request.file_content);
        info!(
            tenant_id = %request.tenant_id,
            request_id = request.request_id.as_deref().unwrap_or("-"),
            items = parsed.total_items,
            parsed = parsed.products.len(),
            rejected = parsed.errors.len(),
            "parsed product catalog"
        );

        let knowledge_space_id = uuid::Uuid::new_v4().to_string();
        let version = next_version();
        let namespace = Namespace::new(&request.tenant_id, &knowledge_space_id, &version);

        if !parsed.products.is_empty() {
            let texts: Vec<String> = parsed.products.iter().map(Product::to_chunk_text).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != texts.len() {
                return Err(RaglineError::external(
                    "embedding",
                    format!(
                        "expected {} embeddings, received {}",
                        texts.len(),
                        embeddings.len()
                    ),
                ));
            }
            let chunks: Vec<EmbeddedChunk> = parsed
                .products
                .iter()
                .zip(texts)
                .zip(embeddings)
                .map(|((product, text), embedding)| EmbeddedChunk {
                    chunk: Chunk {
                        knowledge_space_id: knowledge_space_id.clone(),
                        version: version.clone(),
                        chunk_id: uuid::Uuid::new_v4().to_string(),
                        source_url: product.product_url.clone().unwrap_or_default(),
                        title: Some(product.name.clone()),
                        token_count: self.tokenizer.encode(&text).len(),
                        text,
                    },
                    embedding,
                })
                .collect();
            let stored = chunks.len();
            self.vectors.upsert(&namespace, chunks).await?;
            counter!("ragline_chunks_stored_total").increment(stored as u64);
        }

        let summary = IngestionSummary {
            success_count: parsed.products.len(),
            failure_count: parsed.errors.len(),
            errors: parsed.errors,
        };
        let status = KnowledgeSpaceStatus::from_counts(summary.success_count, summary.failure_count);
        let space = KnowledgeSpace {
            tenant_id: request.tenant_id,
            knowledge_space_id: knowledge_space_id.clone(),
            name: request.name.trim().to_string(),
            space_type: KnowledgeSpaceType::Product,
            source_urls: Vec::new(),
            current_version: version,
            status,
            document_count: summary.success_count,
            summary: summary.clone(),
            created_at: Utc::now(),
        };
        self.spaces.save(&space).await?;

        info!(
            knowledge_space_id = %knowledge_space_id,
            status = %status,
            products = space.document_count,
            "product knowledge space created"
        );

        Ok(ProductIngestOutcome {
            knowledge_space_id,
            name: space.name,
            space_type: KnowledgeSpaceType::Product,
            status,
            document_count: space.document_count,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HashEmbedder, tokenizer};
    use ragline_storage::MemoryStore;

    const CATALOG: &str = "\
# Catalog

--- item start ---
id: p-1
name: Trail Runner
category: Shoes
brand: Acme
price: 129.5
currency: EUR
availability: in stock
tags: [running, outdoor , ]
productUrl: https://shop.example/p-1
### description
Lightweight trail shoe.
Grippy outsole.
--- item end ---

--- item start ---
name: Missing Description
--- item end ---

--- item start ---
name: Bad Price
description: Costs something
price: cheap
--- item end ---

--- item start ---
--- item end ---
";

    #[test]
    fn parses_fields_and_description_block() {
        let parsed = parse_catalog(CATALOG);
        assert_eq!(parsed.total_items, 3);
        assert_eq!(parsed.products.len(), 1);

        let p = &parsed.products[0];
        assert_eq!(p.id, "p-1");
        assert_eq!(p.name, "Trail Runner");
        assert_eq!(p.description, "Lightweight trail shoe.\nGrippy outsole.");
        assert_eq!(p.price, Some(129.5));
        assert_eq!(p.tags, vec!["running", "outdoor"]);
        assert_eq!(p.product_url.as_deref(), Some("https://shop.example/p-1"));
    }

    #[test]
    fn bad_items_become_parse_errors() {
        let parsed = parse_catalog(CATALOG);
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[0].item_index, 1);
        assert_eq!(parsed.errors[0].field.as_deref(), Some("description"));
        assert_eq!(parsed.errors[1].item_index, 2);
        assert_eq!(parsed.errors[1].field.as_deref(), Some("price"));
    }

    #[test]
    fn long_fields_are_truncated_by_character() {
        let name = "é".repeat(250);
        let content = format!(
            "{ITEM_START}\nname: {name}\ndescription: {}\n{ITEM_END}\n",
            "x".repeat(2500)
        );
        let parsed = parse_catalog(&content);
        let p = &parsed.products[0];
        assert_eq!(p.name.chars().count(), 200);
        assert_eq!(p.description.len(), 2000);
    }

    #[test]
    fn chunk_text_lists_present_attributes() {
        let parsed = parse_catalog(CATALOG);
        let text = parsed.products[0].to_chunk_text();
        assert_eq!(
            text,
            "Trail Runner\nLightweight trail shoe.\nGrippy outsole.\nCategory: Shoes\nBrand: Acme\n\
             Price: 129.5 EUR\nAvailability: in stock\nTags: running, outdoor"
        );
    }

    fn use_case(store: Arc<MemoryStore>) -> IngestProductCatalog {
        IngestProductCatalog::new(
            Arc::new(HashEmbedder::default()),
            store.clone(),
            store,
            tokenizer(),
        )
    }

    fn request(content: &str) -> ProductIngestRequest {
        ProductIngestRequest {
            tenant_id: "tenant-a".into(),
            name: "Shoes".into(),
            file_content: content.into(),
            request_id: None,
        }
    }

    #[tokio::test]
    async fn partial_catalog_stores_valid_products() {
        let store = Arc::new(MemoryStore::new());
        let outcome = use_case(store.clone()).execute(request(CATALOG)).await.unwrap();

        assert_eq!(outcome.status, KnowledgeSpaceStatus::Partial);
        assert_eq!(outcome.document_count, 1);
        assert_eq!(outcome.summary.failure_count, 2);

        let space = KnowledgeSpaceRepository::find(store.as_ref(), "tenant-a", &outcome.knowledge_space_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(space.space_type, KnowledgeSpaceType::Product);
        let chunks = store.list_chunks(&space.current_namespace()).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].title.as_deref(), Some("Trail Runner"));
    }

    #[tokio::test]
    async fn catalog_without_items_is_an_error_space() {
        let store = Arc::new(MemoryStore::new());
        let outcome = use_case(store)
            .execute(request("just some prose, no items"))
            .await
            .unwrap();
        assert_eq!(outcome.status, KnowledgeSpaceStatus::Error);
        assert_eq!(outcome.document_count, 0);
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            use_case(store).execute(request("  ")).await,
            Err(RaglineError::Validation(_))
        ));
    }
}
