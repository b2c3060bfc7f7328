// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only conversation log.

use chrono::{DateTime, Utc};
use ragline_core::{Conversation, RaglineError};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::decode_err;

pub async fn append(db: &Database, conversation: &Conversation) -> Result<(), RaglineError> {
    let c = conversation.clone();
    let referenced_urls = serde_json::to_string(&c.referenced_urls)
        .map_err(|e| RaglineError::Internal(format!("failed to encode referenced URLs: {e}")))?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                 (conversation_id, tenant_id, agent_id, user_id, user_message,
                  assistant_message, referenced_urls, is_rag, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    c.conversation_id,
                    c.tenant_id,
                    c.agent_id,
                    c.user_id,
                    c.last_user_message,
                    c.last_assistant_message,
                    referenced_urls,
                    c.is_rag,
                    c.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The last `limit` turns of a thread, oldest first.
pub async fn recent(
    db: &Database,
    tenant_id: &str,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<Conversation>, RaglineError> {
    let tenant_id = tenant_id.to_string();
    let conversation_id = conversation_id.to_string();
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, tenant_id, agent_id, user_id, user_message,
                        assistant_message, referenced_urls, is_rag, created_at
                 FROM conversations
                 WHERE tenant_id = ?1 AND conversation_id = ?2
                 ORDER BY id DESC LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![tenant_id, conversation_id, limit], |row| {
                let referenced_urls: String = row.get(6)?;
                let created_at: String = row.get(8)?;
                Ok(Conversation {
                    conversation_id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    agent_id: row.get(2)?,
                    user_id: row.get(3)?,
                    last_user_message: row.get(4)?,
                    last_assistant_message: row.get(5)?,
                    referenced_urls: serde_json::from_str(&referenced_urls)
                        .map_err(|e| decode_err(6, e))?,
                    is_rag: row.get(7)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map_err(|e| decode_err(8, e))?
                        .with_timezone(&Utc),
                })
            })?;
            let mut turns = rows.collect::<Result<Vec<_>, _>>()?;
            turns.reverse();
            Ok(turns)
        })
        .await
        .map_err(map_tr_err)
}
