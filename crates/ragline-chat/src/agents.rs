// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent creation and lookup.

use std::sync::Arc;

use tracing::info;

use ragline_core::{
    Agent, AgentPreset, AgentRepository, AgentSpec, KnowledgeSpaceRepository, RaglineError,
};

#[derive(Debug, Clone)]
pub struct CreateAgentRequest {
    pub tenant_id: String,
    pub name: String,
    pub knowledge_space_ids: Vec<String>,
    pub strict_rag: bool,
    pub system_prompt: Option<String>,
    pub preset: AgentPreset,
}

pub struct AgentService {
    agents: Arc<dyn AgentRepository>,
    spaces: Arc<dyn KnowledgeSpaceRepository>,
}

impl AgentService {
    pub fn new(agents: Arc<dyn AgentRepository>, spaces: Arc<dyn KnowledgeSpaceRepository>) -> Self {
        Self { agents, spaces }
    }

    /// Creates an agent. Every referenced knowledge space must exist for the tenant.
    pub async fn create(&self, request: CreateAgentRequest) -> Result<Agent, RaglineError> {
        let agent = Agent::new(AgentSpec {
            tenant_id: request.tenant_id,
            agent_id: uuid::Uuid::new_v4().to_string(),
            name: request.name,
            knowledge_space_ids: request.knowledge_space_ids,
            strict_rag: request.strict_rag,
            system_prompt: request.system_prompt,
            preset: request.preset,
        })?;

        for ks_id in agent.knowledge_space_ids() {
            if self.spaces.find(&agent.tenant_id, ks_id).await?.is_none() {
                return Err(RaglineError::not_found("knowledge space", ks_id));
            }
        }

        self.agents.save(&agent).await?;
        info!(
            tenant_id = %agent.tenant_id,
            agent_id = %agent.agent_id,
            strict_rag = agent.strict_rag,
            preset = %agent.preset,
            "agent created"
        );
        Ok(agent)
    }

    pub async fn get(&self, tenant_id: &str, agent_id: &str) -> Result<Agent, RaglineError> {
        self.agents
            .find(tenant_id, agent_id)
            .await?
            .ok_or_else(|| RaglineError::not_found("agent", agent_id))
    }
}
