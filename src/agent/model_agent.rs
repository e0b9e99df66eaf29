use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{
    context::RunContext,
    handoff::{HandoffToolConfig, ToolOutcome, apply_handoff, create_handoff_tool},
    llm::{CompletionRequest, Model},
    message::Message,
    state::SwarmState,
    swarm::Agent,
    tool::{Tool, ToolError, Toolset},
};

use super::{AgentError, AgentRunnable};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelAgentConfig {
    pub name: String,
    pub description: Option<String>,
    /// Model calls allowed per turn.
    pub max_loops: u32,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl Default for ModelAgentConfig {
    fn default() -> Self {
        Self {
            name: "Agent".to_owned(),
            description: None,
            max_loops: 10,
            temperature: None,
            max_tokens: None,
        }
    }
}

pub struct ModelAgentBuilder {
    model: Arc<dyn Model>,
    config: ModelAgentConfig,
    system_prompt: Option<String>,
    tools: Toolset,
}

impl ModelAgentBuilder {
    pub fn new_with_model(model: impl Model + 'static) -> Self {
        Self::new_with_shared_model(Arc::new(model))
    }

    /// Build on a model shared with other agents.
    pub fn new_with_shared_model(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            config: ModelAgentConfig::default(),
            system_prompt: None,
            tools: Toolset::new(),
        }
    }

    pub fn config(mut self, config: ModelAgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn add_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.add(tool);
        self
    }

    pub fn add_shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.add_arc(tool);
        self
    }

    /// Shorthand for adding a handoff tool to `agent_name` with default naming.
    pub fn handoff_to(self, agent_name: impl Into<String>) -> Self {
        self.add_tool(create_handoff_tool(HandoffToolConfig::new(agent_name)))
    }

    pub fn build(self) -> ModelAgent {
        ModelAgent {
            model: self.model,
            config: self.config,
            system_prompt: self.system_prompt,
            tools: self.tools,
        }
    }

    // Configuration methods

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_loops(mut self, max_loops: u32) -> Self {
        self.config.max_loops = max_loops;
        self
    }
}

/// An agent driven by a tool-calling [`Model`].
///
/// Each turn asks the model for a reply, runs the requested tools and feeds
/// their results back until the model answers without tool calls. A handoff
/// tool ends the turn at once with the new active agent set.
pub struct ModelAgent {
    model: Arc<dyn Model>,
    config: ModelAgentConfig,
    system_prompt: Option<String>,
    tools: Toolset,
}

impl ModelAgent {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ModelAgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &Toolset {
        &self.tools
    }

    /// Agents this one can hand off to, read from its handoff tools.
    pub fn destinations(&self) -> Vec<String> {
        self.tools.handoff_destinations()
    }

    /// Package as a swarm member named after the agent, with destinations
    /// taken from its handoff tools.
    pub fn into_swarm_agent(self) -> Agent {
        let name = self.config.name.clone();
        let destinations = self.destinations();
        Agent::new(name, self).with_destinations(destinations)
    }

    async fn run(&self, ctx: &RunContext, mut state: SwarmState) -> Result<SwarmState, AgentError> {
        tracing::debug!(
            "| model agent | Agent: {} | Messages: {}",
            self.config.name,
            state.messages.len()
        );

        for loop_count in 0..self.config.max_loops {
            if ctx.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let request = CompletionRequest {
                system_prompt: self.system_prompt.clone(),
                messages: state.messages.clone(),
                tools: self.tools.definitions(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };
            let response = self.model.completion(ctx, request).await?;

            let tool_calls = response.tool_calls.clone();
            state.push_message(
                Message::assistant(response.content)
                    .with_name(&self.config.name)
                    .with_tool_calls(response.tool_calls),
            );
            if tool_calls.is_empty() {
                return Ok(state);
            }

            for (index, call) in tool_calls.iter().enumerate() {
                match self.tools.call(ctx, call).await {
                    Ok(ToolOutcome::Handoff { target }) => {
                        tracing::info!(
                            "| model agent | Agent: {} | Handoff to: {}",
                            self.config.name,
                            target
                        );
                        // Every tool call needs a reply, including the ones the handoff cut off.
                        for skipped in &tool_calls[index + 1..] {
                            state.push_message(Message::tool(
                                format!("Skipped: control transferred to {target}"),
                                skipped.id.clone(),
                            ));
                        }
                        return Ok(apply_handoff(state, &target, Some(call.id.as_str())));
                    }
                    Ok(ToolOutcome::Ordinary(output)) => {
                        state.push_message(Message::tool(output, call.id.clone()));
                    }
                    Err(ToolError::Cancelled) => return Err(AgentError::Cancelled),
                    Err(e) => {
                        tracing::warn!(
                            "| model agent | Agent: {} | Loop: {} | Tool {} failed: {}",
                            self.config.name,
                            loop_count,
                            call.name,
                            e
                        );
                        state.push_message(Message::tool(format!("Error: {e}"), call.id.clone()));
                    }
                }
            }
        }

        tracing::warn!(
            "| model agent | Agent: {} | Max loops ({}) reached",
            self.config.name,
            self.config.max_loops
        );
        Ok(state)
    }
}

impl AgentRunnable for ModelAgent {
    fn invoke<'a>(
        &'a self,
        ctx: &'a RunContext,
        state: SwarmState,
    ) -> BoxFuture<'a, Result<SwarmState, AgentError>> {
        Box::pin(self.run(ctx, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        llm::{CompletionResponse, ModelError, ScriptedModel},
        message::Role,
        tool::FnTool,
    };

    fn weather_tool() -> FnTool {
        FnTool::new("get_weather", "Current weather for a city", |args| {
            let city = args["city"].as_str().unwrap_or("nowhere");
            Ok(format!("Sunny in {city}"))
        })
    }

    #[tokio::test]
    async fn test_plain_reply_ends_turn() {
        let agent = ModelAgentBuilder::new_with_model(ScriptedModel::new([
            CompletionResponse::text("Hello!"),
        ]))
        .agent_name("Alice")
        .build();

        let state = agent
            .invoke(&RunContext::new(), SwarmState::new(vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert_eq!(state.messages[1].name.as_deref(), Some("Alice"));
        assert_eq!(state.active_agent(), None);
    }

    #[tokio::test]
    async fn test_tool_results_feed_back() {
        let model = Arc::new(ScriptedModel::new([
            CompletionResponse::tool_call("get_weather", serde_json::json!({"city": "Oslo"})),
            CompletionResponse::text("It is sunny in Oslo."),
        ]));
        let agent = ModelAgentBuilder::new_with_shared_model(model.clone())
            .agent_name("Alice")
            .system_prompt("You are Alice")
            .add_tool(weather_tool())
            .build();

        let state = agent
            .invoke(&RunContext::new(), SwarmState::new(vec![Message::user("Weather?")]))
            .await
            .unwrap();

        let roles = state.messages.iter().map(|m| m.role).collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(state.messages[2].content, "Sunny in Oslo");
        assert_eq!(
            state.messages[2].tool_call_id,
            Some(state.messages[1].tool_calls[0].id.clone())
        );

        let requests = model.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system_prompt.as_deref(), Some("You are Alice"));
        assert_eq!(requests[0].tools[0].name, "get_weather");
        assert_eq!(requests[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_handoff_ends_turn_immediately() {
        let model = Arc::new(ScriptedModel::new([
            CompletionResponse::tool_call("transfer_to_bob", serde_json::json!({}))
                .with_tool_call("get_weather", serde_json::json!({"city": "Oslo"})),
            CompletionResponse::text("never reached"),
        ]));
        let agent = ModelAgentBuilder::new_with_shared_model(model.clone())
            .agent_name("Alice")
            .add_tool(weather_tool())
            .handoff_to("Bob")
            .build();
        assert_eq!(agent.destinations(), vec!["Bob".to_owned()]);

        let state = agent
            .invoke(&RunContext::new(), SwarmState::new(vec![Message::user("Get Bob")]))
            .await
            .unwrap();

        assert_eq!(state.active_agent(), Some("Bob"));
        let calls = &state.messages[1].tool_calls;
        assert_eq!(state.messages.len(), 4);

        let skipped = &state.messages[2];
        assert_eq!(skipped.role, Role::Tool);
        assert_eq!(skipped.content, "Skipped: control transferred to Bob");
        assert_eq!(skipped.tool_call_id.as_deref(), Some(calls[1].id.as_str()));

        let last = state.last_message().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.content, "Successfully transferred to Bob");
        assert_eq!(last.tool_call_id.as_deref(), Some(calls[0].id.as_str()));
        assert_eq!(model.remaining().await, 1);
    }

    #[tokio::test]
    async fn test_tool_errors_are_reported_to_model() {
        let model = Arc::new(ScriptedModel::new([
            CompletionResponse::tool_call("launch_rocket", serde_json::json!({})),
            CompletionResponse::text("Sorry, I can not do that."),
        ]));
        let agent = ModelAgentBuilder::new_with_shared_model(model.clone())
            .agent_name("Alice")
            .build();

        let state = agent
            .invoke(&RunContext::new(), SwarmState::default())
            .await
            .unwrap();
        assert_eq!(state.messages[1].content, "Error: Tool not found: launch_rocket");
        assert_eq!(
            state.last_message().unwrap().content,
            "Sorry, I can not do that."
        );
    }

    #[tokio::test]
    async fn test_max_loops_bounds_tool_calls() {
        let model = Arc::new(ScriptedModel::new(
            (0..5).map(|_| CompletionResponse::tool_call("get_weather", serde_json::json!({}))),
        ));
        let agent = ModelAgentBuilder::new_with_shared_model(model.clone())
            .add_tool(weather_tool())
            .max_loops(2)
            .build();

        let state = agent
            .invoke(&RunContext::new(), SwarmState::default())
            .await
            .unwrap();
        assert_eq!(state.messages.len(), 4);
        assert_eq!(model.remaining().await, 3);
    }

    #[tokio::test]
    async fn test_model_errors_propagate() {
        let agent = ModelAgentBuilder::new_with_model(ScriptedModel::default()).build();
        let err = agent
            .invoke(&RunContext::new(), SwarmState::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelError(ModelError::NoChoiceFound)));
    }

    #[tokio::test]
    async fn test_cancelled_before_model_call() {
        let model = Arc::new(ScriptedModel::new([CompletionResponse::text("unused")]));
        let agent = ModelAgentBuilder::new_with_shared_model(model.clone()).build();
        let ctx = RunContext::new();
        ctx.cancellation_token().cancel();

        let err = agent.invoke(&ctx, SwarmState::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert!(model.requests().await.is_empty());
    }

    #[test]
    fn test_into_swarm_agent_reads_handoff_tools() {
        let agent = ModelAgentBuilder::new_with_model(ScriptedModel::default())
            .agent_name("Alice")
            .handoff_to("Bob")
            .handoff_to("Carol")
            .build()
            .into_swarm_agent();
        assert_eq!(agent.name(), "Alice");
        assert_eq!(agent.destinations(), ["Bob", "Carol"]);
    }
}
