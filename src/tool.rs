use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{context::RunContext, handoff::ToolOutcome, message::ToolCall};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Tool execution failed: {0}")]
    Execution(String),
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Tool call cancelled")]
    Cancelled,
}

/// Schema advertised to the model for one tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

pub trait Tool: Send + Sync {
    fn name(&self) -> String;

    fn description(&self) -> String;

    /// JSON schema of the arguments, defaults to an empty object.
    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }

    /// Run the tool with JSON-encoded arguments.
    fn call<'a>(
        &'a self,
        ctx: &'a RunContext,
        input: String,
    ) -> BoxFuture<'a, Result<String, ToolError>>;

    /// The agent this tool hands off to, if it is a handoff tool.
    fn handoff_target(&self) -> Option<&str> {
        None
    }
}

type ToolFn = Arc<dyn Fn(serde_json::Value) -> Result<String, ToolError> + Send + Sync>;

/// A synchronous tool backed by a closure over the parsed arguments.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    parameters: serde_json::Value,
    f: ToolFn,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            f: Arc::new(f),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

impl Tool for FnTool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn parameters(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    fn call<'a>(
        &'a self,
        ctx: &'a RunContext,
        input: String,
    ) -> BoxFuture<'a, Result<String, ToolError>> {
        Box::pin(async move {
            if ctx.is_cancelled() {
                return Err(ToolError::Cancelled);
            }
            let args = if input.trim().is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(&input)?
            };
            (self.f)(args)
        })
    }
}

/// The tools of one agent, dispatched by name.
#[derive(Clone, Default)]
pub struct Toolset {
    tools: Vec<Arc<dyn Tool>>,
}

impl Toolset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tool: impl Tool + 'static) {
        self.add_arc(Arc::new(tool));
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn add_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == name) {
            tracing::warn!("| toolset | Tool: {} | Replacing existing tool", name);
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Agents reachable through the handoff tools of this set.
    pub fn handoff_destinations(&self) -> Vec<String> {
        crate::handoff::handoff_destinations(&self.tools)
    }

    /// Run a model-requested tool call, decoding handoff signals at the boundary.
    pub async fn call(
        &self,
        ctx: &RunContext,
        call: &ToolCall,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let input = match &call.arguments {
            serde_json::Value::Null => String::new(),
            arguments => serde_json::to_string(arguments)?,
        };
        tracing::debug!("| toolset | Tool: {} | Input: {}", call.name, input);

        let output = tool.call(ctx, input).await?;
        Ok(ToolOutcome::from(output))
    }
}

impl<T: Tool + 'static> FromIterator<T> for Toolset {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().fold(Toolset::new(), |mut toolset, tool| {
            toolset.add(tool);
            toolset
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::{HandoffToolConfig, create_handoff_tool};

    fn add_tool() -> FnTool {
        FnTool::new("add", "Add two numbers", |args| {
            let a = args["a"]
                .as_i64()
                .ok_or_else(|| ToolError::InvalidArguments("a must be an integer".to_owned()))?;
            let b = args["b"]
                .as_i64()
                .ok_or_else(|| ToolError::InvalidArguments("b must be an integer".to_owned()))?;
            Ok((a + b).to_string())
        })
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
            "required": ["a", "b"],
        }))
    }

    #[tokio::test]
    async fn test_toolset_dispatches_ordinary_calls() {
        let mut toolset = Toolset::new();
        toolset.add(add_tool());

        let call = ToolCall::new("call_1", "add", serde_json::json!({"a": 5, "b": 7}));
        let outcome = toolset.call(&RunContext::new(), &call).await.unwrap();
        assert_eq!(outcome, ToolOutcome::Ordinary("12".to_owned()));
    }

    #[tokio::test]
    async fn test_toolset_decodes_handoffs() {
        let mut toolset = Toolset::new();
        toolset.add(add_tool());
        toolset.add(create_handoff_tool(HandoffToolConfig::new("Bob")));

        let call = ToolCall::new("call_2", "transfer_to_bob", serde_json::Value::Null);
        let outcome = toolset.call(&RunContext::new(), &call).await.unwrap();
        assert_eq!(
            outcome,
            ToolOutcome::Handoff {
                target: "Bob".to_owned()
            }
        );
        assert_eq!(toolset.handoff_destinations(), vec!["Bob".to_owned()]);
    }

    #[tokio::test]
    async fn test_toolset_reports_unknown_and_invalid_calls() {
        let toolset = [add_tool()].into_iter().collect::<Toolset>();
        let ctx = RunContext::new();

        let call = ToolCall::new("call_3", "multiply", serde_json::json!({}));
        assert!(matches!(
            toolset.call(&ctx, &call).await,
            Err(ToolError::NotFound(name)) if name == "multiply"
        ));

        let call = ToolCall::new("call_4", "add", serde_json::json!({"a": "five"}));
        assert!(matches!(
            toolset.call(&ctx, &call).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_toolset_replaces_tools_by_name() {
        let mut toolset = Toolset::new();
        toolset.add(add_tool());
        toolset.add(FnTool::new("add", "Broken add", |_| Ok("0".to_owned())));

        assert_eq!(toolset.len(), 1);
        assert_eq!(toolset.definitions()[0].description, "Broken add");
    }

    #[test]
    fn test_definition_carries_schema() {
        let definition = add_tool().definition();
        assert_eq!(definition.name, "add");
        assert_eq!(definition.parameters["required"], serde_json::json!(["a", "b"]));
    }
}
