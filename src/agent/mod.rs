use futures::future::BoxFuture;
use thiserror::Error;

use crate::{
    context::RunContext,
    graph::{CompiledGraph, GraphError},
    llm::ModelError,
    state::SwarmState,
    tool::ToolError,
};

mod model_agent;

pub use model_agent::{ModelAgent, ModelAgentBuilder, ModelAgentConfig};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),
    #[error("Tool error: {0}")]
    ToolError(#[from] ToolError),
    #[error("Graph error: {0}")]
    GraphError(#[from] Box<GraphError>),
    #[error("Agent cancelled")]
    Cancelled,
    #[error("Agent error: {0}")]
    Custom(String),
}

/// Anything that can take a turn in a swarm: reads the conversation, returns
/// the updated one.
///
/// Setting `active_agent` on the returned state is how a runnable hands off.
pub trait AgentRunnable: Send + Sync {
    fn invoke<'a>(
        &'a self,
        ctx: &'a RunContext,
        state: SwarmState,
    ) -> BoxFuture<'a, Result<SwarmState, AgentError>>;
}

/// Compiled graphs nest as agents, e.g. a tool-calling loop built as a graph.
impl AgentRunnable for CompiledGraph {
    fn invoke<'a>(
        &'a self,
        ctx: &'a RunContext,
        state: SwarmState,
    ) -> BoxFuture<'a, Result<SwarmState, AgentError>> {
        Box::pin(async move {
            CompiledGraph::invoke(self, ctx, state)
                .await
                .map_err(|e| AgentError::GraphError(Box::new(e)))
        })
    }
}

pub struct FnAgent<F>(F);

/// Wrap a closure as an [`AgentRunnable`].
pub fn agent_fn<F>(f: F) -> FnAgent<F>
where
    F: Fn(RunContext, SwarmState) -> BoxFuture<'static, Result<SwarmState, AgentError>>
        + Send
        + Sync,
{
    FnAgent(f)
}

impl<F> AgentRunnable for FnAgent<F>
where
    F: Fn(RunContext, SwarmState) -> BoxFuture<'static, Result<SwarmState, AgentError>>
        + Send
        + Sync,
{
    fn invoke<'a>(
        &'a self,
        ctx: &'a RunContext,
        state: SwarmState,
    ) -> BoxFuture<'a, Result<SwarmState, AgentError>> {
        (self.0)(ctx.clone(), state)
    }
}
