use std::collections::HashSet;

use super::{SwarmConfig, SwarmError};

/// Reject configurations no swarm can be built from.
///
/// Checks run in order: at least one agent, unique names, a known default
/// agent, and destinations that name members of the swarm.
pub fn validate_config(config: &SwarmConfig) -> Result<(), SwarmError> {
    if config.agents.is_empty() {
        return Err(SwarmError::EmptyAgents);
    }

    let mut names = HashSet::with_capacity(config.agents.len());
    for agent in &config.agents {
        if !names.insert(agent.name()) {
            return Err(SwarmError::DuplicateAgent(agent.name().to_owned()));
        }
    }

    validate_default_agent(&config.agent_names(), &config.default_active_agent)?;

    for agent in &config.agents {
        if let Some(destination) = agent
            .destinations()
            .iter()
            .find(|destination| !names.contains(destination.as_str()))
        {
            return Err(SwarmError::UnknownDestination {
                agent: agent.name().to_owned(),
                destination: destination.clone(),
            });
        }
    }

    Ok(())
}

pub(super) fn validate_default_agent<S: AsRef<str>>(
    agent_names: &[S],
    default_active_agent: &str,
) -> Result<(), SwarmError> {
    if agent_names
        .iter()
        .any(|name| name.as_ref() == default_active_agent)
    {
        return Ok(());
    }
    Err(SwarmError::UnknownDefaultAgent {
        default: default_active_agent.to_owned(),
        agents: agent_names
            .iter()
            .map(|name| name.as_ref().to_owned())
            .collect(),
    })
}
