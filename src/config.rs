use std::{collections::HashMap, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    agent::AgentRunnable,
    graph::GraphSettings,
    swarm::{Agent, SwarmConfig},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("No runnable registered for agent '{0}'")]
    MissingRunnable(String),
}

/// Declarative description of one swarm member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<String>,
}

/// Swarm topology as stored on disk.
///
/// Runnables can not be serialized, so they are supplied by name when the
/// file is turned into a [`SwarmConfig`].
///
/// ```
/// use handoff_swarm::config::SwarmFileConfig;
///
/// let config = SwarmFileConfig::from_json(r#"{
///     "default_active_agent": "Alice",
///     "agents": [
///         {"name": "Alice", "destinations": ["Bob"]},
///         {"name": "Bob"}
///     ]
/// }"#).unwrap();
/// assert_eq!(config.settings.recursion_limit, 25);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwarmFileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub default_active_agent: String,
    pub agents: Vec<AgentDefinition>,
    #[serde(default)]
    pub settings: GraphSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl SwarmFileConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!("| swarm config | Loading {}", path.display());
        let data = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Attach the named runnables. Every agent in the file needs one; extra
    /// runnables are ignored.
    pub fn into_swarm_config(
        self,
        runnables: &HashMap<String, Arc<dyn AgentRunnable>>,
    ) -> Result<SwarmConfig, ConfigError> {
        let agents = self
            .agents
            .into_iter()
            .map(|definition| {
                let runnable = runnables
                    .get(&definition.name)
                    .cloned()
                    .ok_or_else(|| ConfigError::MissingRunnable(definition.name.clone()))?;
                Ok(Agent::from_arc(definition.name, runnable)
                    .with_destinations(definition.destinations))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        tracing::info!(
            "| swarm config | Swarm: {} | Agents: {}",
            self.name.as_deref().unwrap_or("unnamed"),
            agents.len()
        );
        Ok(SwarmConfig {
            agents,
            default_active_agent: self.default_active_agent,
            context: self.context,
            settings: self.settings,
        })
    }
}
