// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The same behavioural checks against the SQLite and in-memory stores.

use chrono::{Duration, Utc};
use ragline_config::model::{StorageBackend, StorageConfig};
use ragline_core::{
    Agent, AgentSpec, Chunk, Conversation, EmbeddedChunk, Embedding, IngestionSummary,
    KnowledgeSpace, KnowledgeSpaceStatus, KnowledgeSpaceType, Namespace,
};
use ragline_storage::{Repositories, open_repositories};
use tempfile::TempDir;

async fn backends() -> Vec<(&'static str, Repositories, Option<TempDir>)> {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: StorageBackend::Sqlite,
        database_path: dir.path().join("repo.db").display().to_string(),
    };
    vec![
        ("sqlite", open_repositories(&config).await.unwrap(), Some(dir)),
        ("memory", Repositories::in_memory(), None),
    ]
}

fn embedded(ns: &Namespace, id: &str, values: [f32; 3]) -> EmbeddedChunk {
    EmbeddedChunk {
        chunk: Chunk {
            knowledge_space_id: ns.knowledge_space_id.clone(),
            version: ns.version.clone(),
            chunk_id: id.into(),
            source_url: format!("https://docs.example/{id}"),
            title: Some(id.to_uppercase()),
            text: format!("text of {id}"),
            token_count: 3,
        },
        embedding: Embedding::new(values.to_vec(), 3).unwrap(),
    }
}

fn space(tenant: &str, id: &str, minutes_ago: i64) -> KnowledgeSpace {
    KnowledgeSpace {
        tenant_id: tenant.into(),
        knowledge_space_id: id.into(),
        name: format!("space {id}"),
        space_type: KnowledgeSpaceType::Web,
        source_urls: vec!["https://docs.example".into()],
        current_version: "v1".into(),
        status: KnowledgeSpaceStatus::Completed,
        document_count: 2,
        summary: IngestionSummary { success_count: 1, ..Default::default() },
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

#[tokio::test]
async fn vectors_are_isolated_by_namespace() {
    for (name, repos, _dir) in backends().await {
        let v1 = Namespace::new("t1", "ks", "v1");
        let v2 = Namespace::new("t1", "ks", "v2");
        let other_tenant = Namespace::new("t2", "ks", "v1");

        repos
            .vectors
            .upsert(&v1, vec![embedded(&v1, "a", [1.0, 0.0, 0.0]), embedded(&v1, "b", [0.0, 1.0, 0.0])])
            .await
            .unwrap();
        repos
            .vectors
            .upsert(&v2, vec![embedded(&v2, "c", [1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let q = Embedding::new(vec![1.0, 0.1, 0.0], 3).unwrap();
        let hits = repos.vectors.query(&v1, &q, 5).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"], "{name}");
        assert!(hits[0].score > hits[1].score, "{name}");
        assert_eq!(hits[0].chunk.title.as_deref(), Some("A"), "{name}");

        assert!(repos.vectors.query(&other_tenant, &q, 5).await.unwrap().is_empty(), "{name}");
        assert_eq!(repos.vectors.list_chunks(&v2).await.unwrap().len(), 1, "{name}");

        assert_eq!(repos.vectors.delete_space("t1", "ks").await.unwrap(), 3, "{name}");
        assert!(repos.vectors.list_chunks(&v1).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn upsert_appends_in_insertion_order() {
    for (name, repos, _dir) in backends().await {
        let ns = Namespace::new("t1", "ks", "v1");
        repos.vectors.upsert(&ns, vec![embedded(&ns, "z", [1.0, 0.0, 0.0])]).await.unwrap();
        repos.vectors.upsert(&ns, vec![embedded(&ns, "a", [1.0, 0.0, 0.0])]).await.unwrap();
        let ids: Vec<_> = repos
            .vectors
            .list_chunks(&ns)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.chunk_id)
            .collect();
        assert_eq!(ids, vec!["z", "a"], "{name}");
    }
}

#[tokio::test]
async fn spaces_round_trip_and_list_newest_first() {
    for (name, repos, _dir) in backends().await {
        repos.spaces.save(&space("t1", "old", 10)).await.unwrap();
        repos.spaces.save(&space("t1", "new", 1)).await.unwrap();
        repos.spaces.save(&space("t2", "foreign", 0)).await.unwrap();

        let found = repos.spaces.find("t1", "old").await.unwrap().unwrap();
        assert_eq!(found.name, "space old", "{name}");
        assert_eq!(found.summary.success_count, 1, "{name}");
        assert!(repos.spaces.find("t2", "old").await.unwrap().is_none(), "{name}");

        let listed: Vec<_> = repos
            .spaces
            .find_by_tenant("t1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.knowledge_space_id)
            .collect();
        assert_eq!(listed, vec!["new", "old"], "{name}");

        assert!(repos.spaces.delete("t1", "old").await.unwrap(), "{name}");
        assert!(!repos.spaces.delete("t1", "old").await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn agents_are_scoped_by_tenant() {
    for (name, repos, _dir) in backends().await {
        let agent = Agent::new(AgentSpec {
            tenant_id: "t1".into(),
            agent_id: "agent-1".into(),
            name: "Support".into(),
            knowledge_space_ids: vec!["ks-1".into(), "ks-2".into()],
            strict_rag: true,
            ..Default::default()
        })
        .unwrap();
        repos.agents.save(&agent).await.unwrap();

        let loaded = repos.agents.find("t1", "agent-1").await.unwrap().unwrap();
        assert_eq!(loaded.knowledge_space_ids().collect::<Vec<_>>(), vec!["ks-1", "ks-2"], "{name}");
        assert!(loaded.strict_rag, "{name}");
        assert!(repos.agents.find("t2", "agent-1").await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn recent_conversation_turns_are_oldest_first() {
    for (name, repos, _dir) in backends().await {
        for i in 0..4 {
            repos
                .conversations
                .append(&Conversation {
                    conversation_id: "thread".into(),
                    tenant_id: "t1".into(),
                    agent_id: "agent-1".into(),
                    user_id: "u1".into(),
                    last_user_message: format!("q{i}"),
                    last_assistant_message: format!("a{i}"),
                    referenced_urls: vec![],
                    created_at: Utc::now(),
                    is_rag: i % 2 == 0,
                })
                .await
                .unwrap();
        }
        let turns = repos.conversations.recent("t1", "thread", 2).await.unwrap();
        let questions: Vec<_> = turns.iter().map(|t| t.last_user_message.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3"], "{name}");
        assert!(repos.conversations.recent("t2", "thread", 2).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn sqlite_health_check_reports_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: StorageBackend::Sqlite,
        database_path: dir.path().join("health.db").display().to_string(),
    };
    let repos = open_repositories(&config).await.unwrap();
    assert_eq!(
        repos.health.health_check().await.unwrap(),
        ragline_core::HealthStatus::Healthy
    );
}
