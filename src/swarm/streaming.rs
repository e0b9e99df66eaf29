use std::sync::Arc;

use crate::{
    graph::{END, StateGraph},
    state::SwarmState,
};

use super::{SwarmConfig, SwarmError, node::AgentNode, validation::validate_config};

/// Build a swarm that follows handoffs within a single invocation.
///
/// The run always enters at the default agent. After each turn, control moves
/// to the active agent if it is one of the current agent's destinations, and
/// the run ends otherwise. Agents without destinations end the run. A handoff
/// to a name that is not a member of the swarm fails the run.
pub fn create_streaming_swarm(config: SwarmConfig) -> Result<StateGraph, SwarmError> {
    validate_config(&config)?;
    let SwarmConfig {
        agents,
        default_active_agent,
        context,
        settings,
    } = config;

    let mut graph = StateGraph::new().with_settings(settings);
    graph.set_context(context);

    let members = agents.iter().map(|a| a.name().to_owned()).collect::<Vec<_>>();
    for agent in &agents {
        graph.add_boxed_node(agent.name(), Arc::new(AgentNode::unchecked(agent, &members)))?;
    }
    graph.set_entry_point(&default_active_agent)?;

    for agent in &agents {
        if agent.destinations().is_empty() {
            graph.add_edge(agent.name(), END)?;
            continue;
        }

        for destination in agent.destinations() {
            graph.add_destination(agent.name(), destination)?;
        }
        let current = agent.name().to_owned();
        let destinations = agent.destinations().to_vec();
        graph.add_conditional_edge(agent.name(), move |_ctx, state| {
            next_agent(&current, &destinations, state)
        })?;
    }

    tracing::info!(
        "| streaming swarm | Built swarm with {} agents | Entry agent: {}",
        agents.len(),
        default_active_agent
    );
    Ok(graph)
}

fn next_agent(current: &str, destinations: &[String], state: &SwarmState) -> String {
    match state.active_agent() {
        Some(next) if next != current && destinations.iter().any(|d| d == next) => {
            tracing::debug!("| streaming swarm | Handoff: {} -> {}", current, next);
            next.to_owned()
        }
        Some(next) if next != current => {
            tracing::warn!(
                "| streaming swarm | Agent: {} | Ignoring handoff to undeclared destination: {}",
                current,
                next
            );
            END.to_owned()
        }
        _ => END.to_owned(),
    }
}
