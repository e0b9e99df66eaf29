use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{
    agent::AgentRunnable,
    context::RunContext,
    graph::{GraphError, Node, NodeOutput},
    state::SwarmState,
};

use super::Agent;

/// Graph node that runs one swarm member.
pub(super) struct AgentNode {
    name: String,
    runnable: Arc<dyn AgentRunnable>,
    /// When set, a handoff outside this list fails the step.
    allowed: Option<Vec<String>>,
    /// When set, a handoff to a name outside the swarm fails the step.
    members: Option<Vec<String>>,
}

impl AgentNode {
    /// A node that rejects handoffs to undeclared destinations.
    pub(super) fn checked(agent: &Agent) -> Self {
        Self {
            name: agent.name().to_owned(),
            runnable: Arc::clone(agent.runnable()),
            allowed: Some(agent.destinations().to_vec()),
            members: None,
        }
    }

    /// A node that leaves destination policing to the outgoing route but
    /// still rejects handoffs to agents outside `members`.
    pub(super) fn unchecked(agent: &Agent, members: &[String]) -> Self {
        Self {
            name: agent.name().to_owned(),
            runnable: Arc::clone(agent.runnable()),
            allowed: None,
            members: Some(members.to_vec()),
        }
    }

    fn check_handoff(&self, state: &SwarmState) -> Result<(), GraphError> {
        let Some(target) = state.active_agent() else {
            return Ok(());
        };
        if target == self.name {
            return Ok(());
        }

        let is_member = |members: &Vec<String>| members.iter().any(|m| m == target);
        if self.members.as_ref().is_some_and(|members| !is_member(members)) {
            tracing::error!(
                "| swarm | Agent: {} | Handoff to unknown agent: {}",
                self.name,
                target
            );
            return Err(GraphError::UnknownNode(target.to_owned()));
        }

        let Some(allowed) = &self.allowed else {
            return Ok(());
        };
        if allowed.iter().any(|d| d == target) {
            return Ok(());
        }

        tracing::error!(
            "| swarm | Agent: {} | Handoff to undeclared destination: {}",
            self.name,
            target
        );
        Err(GraphError::UndeclaredDestination {
            from: self.name.clone(),
            to: target.to_owned(),
        })
    }
}

impl Node for AgentNode {
    fn run(
        &self,
        ctx: RunContext,
        state: SwarmState,
    ) -> BoxFuture<'_, Result<NodeOutput, GraphError>> {
        Box::pin(async move {
            tracing::debug!(
                "| swarm | Agent: {} | Turn started with {} messages",
                self.name,
                state.messages.len()
            );
            let state = self.runnable.invoke(&ctx, state).await?;
            self.check_handoff(&state)?;
            Ok(state.into())
        })
    }
}
