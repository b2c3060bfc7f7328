// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded chunks, keyed by `(tenant, knowledge space, version, chunk)`.

use ragline_core::{Chunk, EmbeddedChunk, Embedding, Namespace, RaglineError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::decode_err;
use crate::vector::{blob_to_vec, vec_to_blob};

/// Inserts or replaces chunks in one transaction, appending after any chunks
/// already in the namespace.
pub async fn upsert(
    db: &Database,
    namespace: &Namespace,
    chunks: Vec<EmbeddedChunk>,
) -> Result<(), RaglineError> {
    if chunks.is_empty() {
        return Ok(());
    }
    let ns = namespace.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let next_seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM chunks
                 WHERE tenant_id = ?1 AND knowledge_space_id = ?2 AND version = ?3",
                params![ns.tenant_id, ns.knowledge_space_id, ns.version],
                |row| row.get(0),
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO chunks
                     (tenant_id, knowledge_space_id, version, chunk_id, seq, source_url,
                      title, text, token_count, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )?;
                for (offset, EmbeddedChunk { chunk, embedding }) in chunks.into_iter().enumerate() {
                    stmt.execute(params![
                        ns.tenant_id,
                        ns.knowledge_space_id,
                        ns.version,
                        chunk.chunk_id,
                        next_seq + offset as i64,
                        chunk.source_url,
                        chunk.title,
                        chunk.text,
                        chunk.token_count as i64,
                        vec_to_blob(embedding.as_slice()),
                    ])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Loads every chunk of a namespace with its embedding, in insertion order.
pub async fn load_embedded(
    db: &Database,
    namespace: &Namespace,
) -> Result<Vec<(Chunk, Embedding)>, RaglineError> {
    let ns = namespace.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT chunk_id, source_url, title, text, token_count, embedding FROM chunks
                 WHERE tenant_id = ?1 AND knowledge_space_id = ?2 AND version = ?3
                 ORDER BY seq",
            )?;
            let rows = stmt.query_map(
                params![ns.tenant_id, ns.knowledge_space_id, ns.version],
                |row| {
                    let token_count: i64 = row.get(4)?;
                    let blob: Vec<u8> = row.get(5)?;
                    let values = blob_to_vec(&blob).map_err(|e| decode_err(5, e))?;
                    let dims = values.len();
                    let embedding = Embedding::new(values, dims).map_err(|e| decode_err(5, e))?;
                    let chunk = Chunk {
                        knowledge_space_id: ns.knowledge_space_id.clone(),
                        version: ns.version.clone(),
                        chunk_id: row.get(0)?,
                        source_url: row.get(1)?,
                        title: row.get(2)?,
                        text: row.get(3)?,
                        token_count: token_count.max(0) as usize,
                    };
                    Ok((chunk, embedding))
                },
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Removes every version of a knowledge space. Returns the number of rows deleted.
pub async fn delete_space(
    db: &Database,
    tenant_id: &str,
    knowledge_space_id: &str,
) -> Result<usize, RaglineError> {
    let tenant_id = tenant_id.to_string();
    let knowledge_space_id = knowledge_space_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM chunks WHERE tenant_id = ?1 AND knowledge_space_id = ?2",
                params![tenant_id, knowledge_space_id],
            )
        })
        .await
        .map_err(map_tr_err)
}
