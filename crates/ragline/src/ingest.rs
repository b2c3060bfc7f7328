// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ragline ingest` command implementation.
//!
//! Runs one ingestion against the configured storage and prints the outcome
//! as JSON on stdout.

use std::path::PathBuf;

use ragline_config::RaglineConfig;
use ragline_core::RaglineError;
use ragline_knowledge::{IngestRequest, ProductIngestRequest};

use crate::app::{Collaborators, Services, build_services};

#[derive(Debug)]
pub struct IngestArgs {
    pub tenant: String,
    pub name: String,
    pub products: Option<PathBuf>,
    pub urls: Vec<String>,
}

pub async fn run_ingest(config: RaglineConfig, args: IngestArgs) -> Result<(), RaglineError> {
    let services = build_services(&config, Collaborators::from_config(&config)?).await?;
    let json = ingest(&services, args).await?;
    println!("{json}");
    Ok(())
}

async fn ingest(services: &Services, args: IngestArgs) -> Result<String, RaglineError> {
    let request_id = format!("cli-{}", std::process::id());
    let rendered = match args.products {
        Some(path) => {
            let file_content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                RaglineError::Validation(format!("cannot read {}: {e}", path.display()))
            })?;
            let outcome = services
                .products
                .execute(ProductIngestRequest {
                    tenant_id: args.tenant,
                    name: args.name,
                    file_content,
                    request_id: Some(request_id),
                })
                .await?;
            serde_json::to_string_pretty(&outcome)
        }
        None => {
            let outcome = services
                .ingest
                .execute(IngestRequest {
                    tenant_id: args.tenant,
                    name: args.name,
                    source_urls: args.urls,
                    request_id: Some(request_id),
                })
                .await?;
            serde_json::to_string_pretty(&outcome)
        }
    };
    rendered.map_err(|e| RaglineError::Internal(format!("failed to render outcome: {e}")))
}
