use std::sync::Arc;

use crate::graph::StateGraph;

use super::{
    Agent, SwarmConfig, SwarmError, node::AgentNode, router::add_active_agent_router,
    validation::validate_config,
};

/// Build a swarm where each invocation runs exactly one agent turn.
///
/// The start routes to the state's active agent (or the default). The agent's
/// destinations are declared in the graph but never traversed: a handoff only
/// sets the active agent, which the router honours on the next invocation.
/// Handoffs to agents outside the declared destinations fail the run.
pub fn create_swarm(config: SwarmConfig) -> Result<StateGraph, SwarmError> {
    validate_config(&config)?;
    let SwarmConfig {
        agents,
        default_active_agent,
        context,
        settings,
    } = config;

    let mut graph = StateGraph::new().with_settings(settings);
    graph.set_context(context);

    for agent in &agents {
        graph.add_boxed_node(agent.name(), Arc::new(AgentNode::checked(agent)))?;
    }

    add_active_agent_router(&mut graph, agents.iter().map(Agent::name), &default_active_agent)?;

    for agent in &agents {
        for destination in agent.destinations() {
            graph.add_destination(agent.name(), destination)?;
        }
    }

    tracing::info!(
        "| swarm | Built swarm with {} agents | Default agent: {}",
        agents.len(),
        default_active_agent
    );
    Ok(graph)
}
