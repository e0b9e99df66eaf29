//! handoff-swarm lets several conversational agents share one conversation and
//! pass control to each other through handoff tools.
//! This crate provides the handoff protocol, an active-agent router, swarm builders on top of a
//! small state-graph engine, and a tool-calling model agent.
pub mod agent;
pub mod config;
pub mod context;
pub mod graph;
pub mod handoff;
pub mod llm;
pub mod message;
pub mod state;
pub mod swarm;
pub mod tool;

pub use agent::{AgentError, AgentRunnable, FnAgent, ModelAgent, ModelAgentBuilder, agent_fn};
pub use context::RunContext;
pub use graph::{CompiledGraph, END, GraphError, START, StateGraph};
pub use handoff::{
    HandoffTool, HandoffToolConfig, ToolOutcome, create_handoff_command, create_handoff_tool,
    decode_handoff_signal, normalize_agent_name,
};
pub use message::{Message, Role};
pub use state::SwarmState;
pub use swarm::{
    Agent, SwarmConfig, SwarmError, add_active_agent_router, create_streaming_swarm, create_swarm,
};

// Re-export for callers that pass their own cancellation token.
pub use tokio_util::sync::CancellationToken;
