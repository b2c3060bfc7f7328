// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent documents.

use ragline_core::{Agent, RaglineError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::{OptionalExt, decode_err};

pub async fn save(db: &Database, agent: &Agent) -> Result<(), RaglineError> {
    let document = serde_json::to_string(agent)
        .map_err(|e| RaglineError::Internal(format!("failed to encode agent: {e}")))?;
    let tenant_id = agent.tenant_id.clone();
    let agent_id = agent.agent_id.clone();
    let created_at = agent.created_at.to_rfc3339();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO agents (tenant_id, agent_id, document, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![tenant_id, agent_id, document, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find(db: &Database, tenant_id: &str, agent_id: &str) -> Result<Option<Agent>, RaglineError> {
    let tenant_id = tenant_id.to_string();
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT document FROM agents WHERE tenant_id = ?1 AND agent_id = ?2",
                params![tenant_id, agent_id],
                |row| {
                    let document: String = row.get(0)?;
                    serde_json::from_str::<Agent>(&document).map_err(|e| decode_err(0, e))
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
