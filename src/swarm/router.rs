use std::collections::HashMap;

use crate::{
    graph::{START, StateGraph},
    state::SwarmState,
};

use super::{SwarmError, validation::validate_default_agent};

/// Routes the start of a run to the state's active agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveAgentRouter {
    agent_names: Vec<String>,
    default_active_agent: String,
}

impl ActiveAgentRouter {
    pub fn new<I, S>(
        agent_names: I,
        default_active_agent: impl Into<String>,
    ) -> Result<Self, SwarmError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agent_names = agent_names.into_iter().map(Into::into).collect::<Vec<_>>();
        let default_active_agent = default_active_agent.into();
        validate_default_agent(&agent_names, &default_active_agent)?;

        Ok(Self {
            agent_names,
            default_active_agent,
        })
    }

    pub fn default_active_agent(&self) -> &str {
        &self.default_active_agent
    }

    /// The active agent of `state`, or the default when none is set.
    ///
    /// Names outside the swarm are returned unchanged so the graph reports
    /// them as unknown routes.
    pub fn route<'a>(&'a self, state: &'a SwarmState) -> &'a str {
        state.active_agent().unwrap_or(&self.default_active_agent)
    }

    /// Identity map over the agent names.
    pub fn path_map(&self) -> HashMap<String, String> {
        self.agent_names
            .iter()
            .map(|name| (name.clone(), name.clone()))
            .collect()
    }

    /// Branch from [`START`] on this router. The agents must already be nodes
    /// of `graph`.
    pub fn install(self, graph: &mut StateGraph) -> Result<(), SwarmError> {
        let path_map = self.path_map();
        graph.add_conditional_edges(START, move |state| self.route(state).to_owned(), path_map)?;
        Ok(())
    }
}

/// Route the start of `graph` to the active agent, falling back to
/// `default_active_agent`.
pub fn add_active_agent_router<I, S>(
    graph: &mut StateGraph,
    agent_names: I,
    default_active_agent: &str,
) -> Result<(), SwarmError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ActiveAgentRouter::new(agent_names, default_active_agent)?.install(graph)
}
