// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge-space metadata.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use ragline_core::{KnowledgeSpace, KnowledgeSpaceStatus, KnowledgeSpaceType, RaglineError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::{OptionalExt, decode_err};

const COLUMNS: &str = "tenant_id, knowledge_space_id, name, space_type, source_urls, \
                       current_version, status, document_count, summary, created_at";

/// Inserts or replaces a knowledge space record.
pub async fn save(db: &Database, space: &KnowledgeSpace) -> Result<(), RaglineError> {
    let space = space.clone();
    let source_urls = serde_json::to_string(&space.source_urls)
        .map_err(|e| RaglineError::Internal(format!("failed to encode source URLs: {e}")))?;
    let summary = serde_json::to_string(&space.summary)
        .map_err(|e| RaglineError::Internal(format!("failed to encode summary: {e}")))?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO knowledge_spaces ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    space.tenant_id,
                    space.knowledge_space_id,
                    space.name,
                    space.space_type.to_string(),
                    source_urls,
                    space.current_version,
                    space.status.to_string(),
                    space.document_count as i64,
                    summary,
                    space.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find(
    db: &Database,
    tenant_id: &str,
    knowledge_space_id: &str,
) -> Result<Option<KnowledgeSpace>, RaglineError> {
    let tenant_id = tenant_id.to_string();
    let knowledge_space_id = knowledge_space_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM knowledge_spaces
                     WHERE tenant_id = ?1 AND knowledge_space_id = ?2"
                ),
                params![tenant_id, knowledge_space_id],
                row_to_space,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All spaces of a tenant, newest first.
pub async fn find_by_tenant(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<KnowledgeSpace>, RaglineError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM knowledge_spaces
                 WHERE tenant_id = ?1 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map(params![tenant_id], row_to_space)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete(
    db: &Database,
    tenant_id: &str,
    knowledge_space_id: &str,
) -> Result<bool, RaglineError> {
    let tenant_id = tenant_id.to_string();
    let knowledge_space_id = knowledge_space_id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM knowledge_spaces WHERE tenant_id = ?1 AND knowledge_space_id = ?2",
                params![tenant_id, knowledge_space_id],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_space(row: &rusqlite::Row<'_>) -> Result<KnowledgeSpace, rusqlite::Error> {
    let space_type: String = row.get(3)?;
    let source_urls: String = row.get(4)?;
    let status: String = row.get(6)?;
    let document_count: i64 = row.get(7)?;
    let summary: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    Ok(KnowledgeSpace {
        tenant_id: row.get(0)?,
        knowledge_space_id: row.get(1)?,
        name: row.get(2)?,
        space_type: KnowledgeSpaceType::from_str(&space_type).map_err(|e| decode_err(3, e))?,
        source_urls: serde_json::from_str(&source_urls).map_err(|e| decode_err(4, e))?,
        current_version: row.get(5)?,
        status: KnowledgeSpaceStatus::from_str(&status).map_err(|e| decode_err(6, e))?,
        document_count: document_count.max(0) as usize,
        summary: serde_json::from_str(&summary).map_err(|e| decode_err(8, e))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| decode_err(9, e))?
            .with_timezone(&Utc),
    })
}
