//! Handoff protocol between agents.
//!
//! A handoff tool never moves control itself. It returns a string signal,
//! [`HANDOFF_PREFIX`] followed by the target agent name, which the tool-calling
//! layer decodes into [`ToolOutcome::Handoff`]. The outcome is then applied to
//! the conversation as one update: a tool message confirming the transfer plus
//! the new active agent.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{
    context::RunContext,
    graph::Command,
    message::Message,
    state::{StateUpdate, SwarmState},
    tool::{Tool, ToolError},
};

/// Marker that distinguishes handoff signals from ordinary tool results.
pub const HANDOFF_PREFIX: &str = "__HANDOFF__";

/// Trim, collapse inner ASCII whitespace runs to `_` and lowercase.
///
/// Other Unicode whitespace, such as a no-break space, is kept as is.
///
/// ```
/// use handoff_swarm::handoff::normalize_agent_name;
///
/// assert_eq!(normalize_agent_name("Customer Support"), "customer_support");
/// ```
pub fn normalize_agent_name(agent_name: &str) -> String {
    agent_name
        .split_ascii_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

pub fn encode_handoff_signal(target_agent: &str) -> String {
    format!("{HANDOFF_PREFIX}{target_agent}")
}

/// Extract the target of a handoff signal.
///
/// Results without the prefix, or with nothing after it, are ordinary results.
pub fn decode_handoff_signal(tool_result: &str) -> Option<&str> {
    tool_result
        .strip_prefix(HANDOFF_PREFIX)
        .filter(|target| !target.is_empty())
}

/// A tool result, classified at the tool-calling boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    Ordinary(String),
    Handoff { target: String },
}

impl ToolOutcome {
    pub fn is_handoff(&self) -> bool {
        matches!(self, ToolOutcome::Handoff { .. })
    }

    pub fn handoff_target(&self) -> Option<&str> {
        match self {
            ToolOutcome::Handoff { target } => Some(target),
            ToolOutcome::Ordinary(_) => None,
        }
    }

    /// The wire form of this outcome.
    pub fn into_signal(self) -> String {
        match self {
            ToolOutcome::Ordinary(result) => result,
            ToolOutcome::Handoff { target } => encode_handoff_signal(&target),
        }
    }
}

impl From<String> for ToolOutcome {
    fn from(tool_result: String) -> Self {
        match decode_handoff_signal(&tool_result) {
            Some(target) => ToolOutcome::Handoff {
                target: target.to_owned(),
            },
            None => ToolOutcome::Ordinary(tool_result),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffToolConfig {
    /// Agent that receives control.
    pub agent_name: String,
    /// Tool name, defaults to `transfer_to_<normalized agent name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool description, defaults to `Ask agent '<agent name>' for help`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HandoffToolConfig {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Tool that signals a transfer of control to another agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoffTool {
    name: String,
    description: String,
    agent_name: String,
}

impl HandoffTool {
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }
}

impl Tool for HandoffTool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn call<'a>(
        &'a self,
        _ctx: &'a RunContext,
        _input: String,
    ) -> BoxFuture<'a, Result<String, ToolError>> {
        Box::pin(async move {
            tracing::debug!("| handoff tool | Tool: {} | Target: {}", self.name, self.agent_name);
            Ok(encode_handoff_signal(&self.agent_name))
        })
    }

    fn handoff_target(&self) -> Option<&str> {
        Some(&self.agent_name)
    }
}

pub fn create_handoff_tool(config: HandoffToolConfig) -> HandoffTool {
    let HandoffToolConfig {
        agent_name,
        name,
        description,
    } = config;

    let name = name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("transfer_to_{}", normalize_agent_name(&agent_name)));
    let description = description
        .filter(|description| !description.is_empty())
        .unwrap_or_else(|| format!("Ask agent '{agent_name}' for help"));

    HandoffTool {
        name,
        description,
        agent_name,
    }
}

/// The tool message recorded when control moves to `target_agent`.
pub fn transfer_message(target_agent: &str, tool_call_id: Option<&str>) -> Message {
    Message::tool(
        format!("Successfully transferred to {target_agent}"),
        tool_call_id.map(str::to_owned),
    )
}

pub fn handoff_update(target_agent: &str, tool_call_id: Option<&str>) -> StateUpdate {
    StateUpdate {
        messages: vec![transfer_message(target_agent, tool_call_id)],
        active_agent: Some(target_agent.to_owned()),
    }
}

/// A graph command that records the transfer and jumps to `target_agent`.
pub fn create_handoff_command(target_agent: &str, tool_call_id: Option<&str>) -> Command {
    Command::new(target_agent, handoff_update(target_agent, tool_call_id))
}

/// Apply a handoff to `state` in one step.
pub fn apply_handoff(
    state: SwarmState,
    target_agent: &str,
    tool_call_id: Option<&str>,
) -> SwarmState {
    handoff_update(target_agent, tool_call_id).apply(state)
}

/// Apply `tool_result` if it is a handoff signal, returning the target.
///
/// Ordinary results leave the state untouched.
pub fn process_tool_result(
    state: SwarmState,
    tool_result: &str,
    tool_call_id: Option<&str>,
) -> (SwarmState, Option<String>) {
    match decode_handoff_signal(tool_result) {
        Some(target) => (
            apply_handoff(state, target, tool_call_id),
            Some(target.to_owned()),
        ),
        None => (state, None),
    }
}

/// Handoff targets among `tools`, deduplicated, in tool order.
pub fn handoff_destinations(tools: &[Arc<dyn Tool>]) -> Vec<String> {
    tools
        .iter()
        .filter_map(|tool| tool.handoff_target())
        .fold(Vec::new(), |mut destinations, target| {
            if !destinations.iter().any(|d: &String| d == target) {
                destinations.push(target.to_owned());
            }
            destinations
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{message::Role, tool::FnTool};

    #[test]
    fn test_normalize_agent_name() {
        let cases = [
            ("SimpleAgent", "simpleagent"),
            ("Agent With Spaces", "agent_with_spaces"),
            ("  Trim Me  ", "trim_me"),
            ("Multiple   Spaces", "multiple_spaces"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_agent_name(input), expected, "input: {input:?}");
            assert_eq!(normalize_agent_name(expected), expected);
        }
        assert_eq!(normalize_agent_name("Tab\tAnd\nNewline"), "tab_and_newline");
        assert_eq!(normalize_agent_name("Agent\u{00A0}One"), "agent\u{00a0}one");
    }

    #[test]
    fn test_default_tool_name_and_description() {
        let tool = create_handoff_tool(HandoffToolConfig::new("Bob"));
        assert_eq!(tool.name(), "transfer_to_bob");
        assert_eq!(tool.description(), "Ask agent 'Bob' for help");
        assert_eq!(tool.handoff_target(), Some("Bob"));

        let tool = create_handoff_tool(HandoffToolConfig::new("Customer Support"));
        assert_eq!(tool.name(), "transfer_to_customer_support");
    }

    #[test]
    fn test_custom_tool_name_and_description() {
        let tool = create_handoff_tool(
            HandoffToolConfig::new("Bob")
                .name("escalate")
                .description("Escalate to Bob"),
        );
        assert_eq!(tool.name(), "escalate");
        assert_eq!(tool.description(), "Escalate to Bob");
        assert_eq!(tool.agent_name(), "Bob");

        let tool = create_handoff_tool(HandoffToolConfig::new("Bob").name(""));
        assert_eq!(tool.name(), "transfer_to_bob");
    }

    #[tokio::test]
    async fn test_tool_signal_ignores_input() {
        let tool = create_handoff_tool(HandoffToolConfig::new("Bob"));
        let ctx = RunContext::new();

        let first = tool.call(&ctx, "{}".to_owned()).await.unwrap();
        let second = tool.call(&ctx, "not json at all".to_owned()).await.unwrap();
        assert_eq!(first, "__HANDOFF__Bob");
        assert_eq!(first, second);
        assert_eq!(decode_handoff_signal(&first), Some("Bob"));
    }

    #[test]
    fn test_decode_handoff_signal() {
        assert_eq!(decode_handoff_signal("__HANDOFF__Alice"), Some("Alice"));
        assert_eq!(decode_handoff_signal("The weather is sunny"), None);
        assert_eq!(decode_handoff_signal("result __HANDOFF__Alice"), None);
        assert_eq!(decode_handoff_signal(HANDOFF_PREFIX), None);
    }

    #[test]
    fn test_outcome_from_tool_result() {
        assert_eq!(
            ToolOutcome::from(encode_handoff_signal("Customer Support")),
            ToolOutcome::Handoff {
                target: "Customer Support".to_owned()
            }
        );

        let outcome = ToolOutcome::from("42".to_owned());
        assert!(!outcome.is_handoff());
        assert_eq!(outcome.handoff_target(), None);
        assert_eq!(outcome.into_signal(), "42");
    }

    #[test]
    fn test_handoff_command() {
        let command = create_handoff_command("Bob", Some("call_7"));
        assert_eq!(command.goto, "Bob");
        assert_eq!(command.update.active_agent.as_deref(), Some("Bob"));

        let message = &command.update.messages[0];
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.content, "Successfully transferred to Bob");
        assert_eq!(message.tool_call_id.as_deref(), Some("call_7"));
    }

    #[test]
    fn test_process_tool_result_is_atomic() {
        let state = SwarmState::new(vec![Message::user("I need help")]).with_active_agent("Alice");

        let (unchanged, target) = process_tool_result(state.clone(), "sunny", Some("call_1"));
        assert_eq!(target, None);
        assert_eq!(unchanged, state);

        let (moved, target) = process_tool_result(state, "__HANDOFF__Bob", Some("call_2"));
        assert_eq!(target.as_deref(), Some("Bob"));
        assert_eq!(moved.active_agent(), Some("Bob"));
        assert_eq!(moved.messages.len(), 2);
        assert_eq!(moved.messages[1].content, "Successfully transferred to Bob");
    }

    #[test]
    fn test_handoff_destinations_skip_ordinary_tools() {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(create_handoff_tool(HandoffToolConfig::new("Bob"))),
            Arc::new(FnTool::new("lookup", "Look things up", |_| Ok(String::new()))),
            Arc::new(create_handoff_tool(HandoffToolConfig::new("Carol"))),
            Arc::new(create_handoff_tool(HandoffToolConfig::new("Bob").name("escalate"))),
        ];
        assert_eq!(handoff_destinations(&tools), vec!["Bob", "Carol"]);
    }
}
