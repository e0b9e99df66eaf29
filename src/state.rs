use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Conversation state threaded through every agent of a swarm.
///
/// `active_agent` names the agent that receives control on the next
/// invocation. `None` (or an empty string) selects the swarm's default.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_agent: Option<String>,
}

impl SwarmState {
    pub fn new(messages: impl Into<Vec<Message>>) -> Self {
        Self {
            messages: messages.into(),
            active_agent: None,
        }
    }

    pub fn with_active_agent(mut self, agent: impl Into<String>) -> Self {
        self.active_agent = Some(agent.into());
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The active agent, with empty names treated as unset.
    pub fn active_agent(&self) -> Option<&str> {
        self.active_agent.as_deref().filter(|name| !name.is_empty())
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// A delta over [`SwarmState`], applied in one step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_agent: Option<String>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.active_agent.is_none()
    }

    /// Append the messages and set the active agent, if any.
    pub fn apply(self, mut state: SwarmState) -> SwarmState {
        state.messages.extend(self.messages);
        if let Some(agent) = self.active_agent {
            state.active_agent = Some(agent);
        }
        state
    }
}
