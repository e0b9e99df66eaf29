//! Multi-agent swarms built on the state graph.
//!
//! Every agent becomes a graph node. Which agent answers is decided by the
//! `active_agent` field of the shared state, which agents change through
//! handoff tools. Two builders are provided:
//!
//! * [`create_swarm`] routes from the start to the active agent, runs one turn
//!   and stops. A handoff takes effect on the next invocation.
//! * [`create_streaming_swarm`] enters at the default agent and follows
//!   handoffs within the same invocation until an agent stops handing off.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    agent::AgentRunnable,
    graph::{GraphError, GraphSettings},
    tool::Tool,
};

mod direct;
mod node;
mod router;
mod streaming;
mod validation;

pub use direct::create_swarm;
pub use router::{ActiveAgentRouter, add_active_agent_router};
pub use streaming::create_streaming_swarm;
pub use validation::validate_config;

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Agents list cannot be empty")]
    EmptyAgents,
    #[error("Agent's name should be unique, duplicate name: {0}")]
    DuplicateAgent(String),
    #[error("Default active agent '{default}' not found in agent names {agents:?}")]
    UnknownDefaultAgent { default: String, agents: Vec<String> },
    #[error("Agent '{agent}' lists unknown destination '{destination}'")]
    UnknownDestination { agent: String, destination: String },
    #[error("Graph error: {0}")]
    GraphError(#[from] GraphError),
}

/// A named swarm member.
#[derive(Clone)]
pub struct Agent {
    name: String,
    runnable: Arc<dyn AgentRunnable>,
    destinations: Vec<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, runnable: impl AgentRunnable + 'static) -> Self {
        Self::from_arc(name, Arc::new(runnable))
    }

    pub fn from_arc(name: impl Into<String>, runnable: Arc<dyn AgentRunnable>) -> Self {
        Self {
            name: name.into(),
            runnable,
            destinations: Vec::new(),
        }
    }

    /// Agents this one may hand off to.
    pub fn with_destinations<I, S>(mut self, destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for destination in destinations {
            self = self.add_destination(destination);
        }
        self
    }

    pub fn add_destination(mut self, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        if !self.destinations.contains(&destination) {
            self.destinations.push(destination);
        }
        self
    }

    /// Add the targets of the handoff tools among `tools` as destinations.
    pub fn with_handoff_tools(self, tools: &[Arc<dyn Tool>]) -> Self {
        self.with_destinations(crate::handoff::handoff_destinations(tools))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    pub fn runnable(&self) -> &Arc<dyn AgentRunnable> {
        &self.runnable
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("destinations", &self.destinations)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SwarmConfig {
    pub agents: Vec<Agent>,
    /// Agent that answers while the state names no active agent.
    pub default_active_agent: String,
    /// Extension handed to every agent whose run context carries none.
    pub context: Option<serde_json::Value>,
    pub settings: GraphSettings,
}

impl SwarmConfig {
    pub fn builder() -> SwarmConfigBuilder {
        SwarmConfigBuilder::default()
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(Agent::name).collect()
    }
}

#[derive(Default)]
pub struct SwarmConfigBuilder {
    config: SwarmConfig,
}

impl SwarmConfigBuilder {
    pub fn add_agent(mut self, agent: Agent) -> Self {
        self.config.agents.push(agent);
        self
    }

    pub fn agents(self, agents: Vec<Agent>) -> Self {
        agents
            .into_iter()
            .fold(self, |builder, agent| builder.add_agent(agent))
    }

    pub fn default_active_agent(mut self, name: impl Into<String>) -> Self {
        self.config.default_active_agent = name.into();
        self
    }

    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.config.context = Some(context);
        self
    }

    pub fn settings(mut self, settings: GraphSettings) -> Self {
        self.config.settings = settings;
        self
    }

    pub fn recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.config.settings.recursion_limit = recursion_limit;
        self
    }

    pub fn build(self) -> SwarmConfig {
        self.config
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::{HandoffToolConfig, create_handoff_tool};

    #[test]
    fn test_destinations_are_deduplicated() {
        let agent = Agent::new("Alice", test_agents::replying("Alice", "hi"))
            .with_destinations(["Bob", "Carol"])
            .add_destination("Bob");
        assert_eq!(agent.destinations(), ["Bob", "Carol"]);
    }

    #[test]
    fn test_destinations_from_handoff_tools() {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(create_handoff_tool(HandoffToolConfig::new("Bob"))),
            Arc::new(create_handoff_tool(HandoffToolConfig::new("Carol"))),
        ];
        let agent =
            Agent::new("Alice", test_agents::replying("Alice", "hi")).with_handoff_tools(&tools);
        assert_eq!(agent.destinations(), ["Bob", "Carol"]);
    }

    #[test]
    fn test_config_builder() {
        let config = SwarmConfig::builder()
            .agents(vec![
                Agent::new("Alice", test_agents::replying("Alice", "hi")),
                Agent::new("Bob", test_agents::replying("Bob", "hey")),
            ])
            .default_active_agent("Alice")
            .recursion_limit(5)
            .context(serde_json::json!({"tenant": "acme"}))
            .build();

        assert_eq!(config.agent_names(), ["Alice", "Bob"]);
        assert_eq!(config.default_active_agent, "Alice");
        assert_eq!(config.settings.recursion_limit, 5);
        assert!(config.context.is_some());
        assert!(format!("{:?}", config.agents[0]).contains("Alice"));
    }
}
