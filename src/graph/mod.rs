//! A small state-graph execution engine.
//!
//! Nodes receive the shared [`SwarmState`] and either return a replacement state
//! or a [`Command`] that applies an update and jumps to another node. Transitions
//! out of a node are a single direct edge or a single conditional branch.
//! Declared destinations ([`StateGraph::add_destination`]) are recorded in the
//! topology and whitelist `Command` jumps, but are never followed implicitly.

use std::{
    collections::{HashMap, hash_map},
    sync::Arc,
};

use futures::future::BoxFuture;
use petgraph::{Direction, graph::NodeIndex, prelude::StableGraph, visit::EdgeRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    agent::AgentError,
    context::RunContext,
    state::{StateUpdate, SwarmState},
};

mod compiled;

pub use compiled::{CompiledGraph, StepEvent};

/// Name of the pseudo-node every run starts from.
pub const START: &str = "__start__";
/// Name of the terminal pseudo-node.
pub const END: &str = "__end__";

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    UnknownNode(String),
    #[error("Node already registered: {0}")]
    DuplicateNode(String),
    #[error("Node name is reserved: {0}")]
    ReservedName(String),
    #[error("Node '{0}' already has an outgoing transition")]
    ConflictingTransition(String),
    #[error("Graph has no entry point")]
    MissingEntryPoint,
    #[error("Route '{route}' from '{from}' does not resolve to a node")]
    UnknownRoute { from: String, route: String },
    #[error("'{from}' can not hand off to undeclared destination '{to}'")]
    UndeclaredDestination { from: String, to: String },
    #[error("Recursion limit of {0} steps reached")]
    RecursionLimit(usize),
    #[error("Run cancelled")]
    Cancelled,
    #[error(transparent)]
    Agent(#[from] AgentError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Unconditional transition.
    Direct,
    /// Possible target of a conditional branch.
    Conditional,
    /// Handoff destination, only reachable through a [`Command`].
    Declared,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Maximum number of node executions per invocation.
    pub recursion_limit: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            recursion_limit: 25,
        }
    }
}

/// Jump to `goto` after applying `update` to the node's input state.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub goto: String,
    pub update: StateUpdate,
}

impl Command {
    pub fn new(goto: impl Into<String>, update: StateUpdate) -> Self {
        Self {
            goto: goto.into(),
            update,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeOutput {
    State(SwarmState),
    Command(Command),
}

impl From<SwarmState> for NodeOutput {
    fn from(state: SwarmState) -> Self {
        NodeOutput::State(state)
    }
}

impl From<Command> for NodeOutput {
    fn from(command: Command) -> Self {
        NodeOutput::Command(command)
    }
}

pub trait Node: Send + Sync {
    fn run(
        &self,
        ctx: RunContext,
        state: SwarmState,
    ) -> BoxFuture<'_, Result<NodeOutput, GraphError>>;
}

impl<F> Node for F
where
    F: Fn(RunContext, SwarmState) -> BoxFuture<'static, Result<NodeOutput, GraphError>>
        + Send
        + Sync,
{
    fn run(
        &self,
        ctx: RunContext,
        state: SwarmState,
    ) -> BoxFuture<'_, Result<NodeOutput, GraphError>> {
        self(ctx, state)
    }
}

type RouterFn = Arc<dyn Fn(&RunContext, &SwarmState) -> String + Send + Sync>;

struct Branch {
    router: RouterFn,
    path_map: Option<HashMap<String, String>>,
}

enum Vertex {
    Start,
    End,
    Node { name: String, node: Arc<dyn Node> },
}

impl Vertex {
    fn name(&self) -> &str {
        match self {
            Vertex::Start => START,
            Vertex::End => END,
            Vertex::Node { name, .. } => name,
        }
    }
}

pub struct StateGraph {
    graph: StableGraph<Vertex, EdgeKind>,
    name_to_node: HashMap<String, NodeIndex>,
    branches: HashMap<NodeIndex, Branch>,
    start: NodeIndex,
    end: NodeIndex,
    settings: GraphSettings,
    context: Option<Arc<serde_json::Value>>,
}

impl StateGraph {
    pub fn new() -> Self {
        let mut graph = StableGraph::new();
        let start = graph.add_node(Vertex::Start);
        let end = graph.add_node(Vertex::End);
        Self {
            graph,
            name_to_node: HashMap::from([(START.to_owned(), start), (END.to_owned(), end)]),
            branches: HashMap::new(),
            start,
            end,
            settings: GraphSettings::default(),
            context: None,
        }
    }

    pub fn with_settings(mut self, settings: GraphSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Extension handed to nodes when the caller's context carries none.
    pub fn set_context(&mut self, context: Option<serde_json::Value>) {
        self.context = context.map(Arc::new);
    }

    pub fn add_node<F>(&mut self, name: impl Into<String>, node: F) -> Result<&mut Self, GraphError>
    where
        F: Fn(RunContext, SwarmState) -> BoxFuture<'static, Result<NodeOutput, GraphError>>
            + Send
            + Sync
            + 'static,
    {
        self.add_boxed_node(name, Arc::new(node))
    }

    pub fn add_boxed_node(
        &mut self,
        name: impl Into<String>,
        node: Arc<dyn Node>,
    ) -> Result<&mut Self, GraphError> {
        let name = name.into();
        if name == START || name == END {
            return Err(GraphError::ReservedName(name));
        }

        match self.name_to_node.entry(name.clone()) {
            hash_map::Entry::Occupied(_) => return Err(GraphError::DuplicateNode(name)),
            hash_map::Entry::Vacant(e) => {
                let index = self.graph.add_node(Vertex::Node { name, node });
                e.insert(index);
            }
        }
        Ok(self)
    }

    /// Unconditional transition. `from` may be [`START`], `to` may be [`END`].
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<&mut Self, GraphError> {
        let from_idx = self.source_index(from)?;
        let to_idx = self.target_index(to)?;
        self.ensure_no_transition(from_idx, from)?;

        self.graph.add_edge(from_idx, to_idx, EdgeKind::Direct);
        Ok(self)
    }

    pub fn set_entry_point(&mut self, name: &str) -> Result<&mut Self, GraphError> {
        self.add_edge(START, name)
    }

    /// Branch on `router`, whose result is looked up in `path_map`.
    pub fn add_conditional_edges<R>(
        &mut self,
        from: &str,
        router: R,
        path_map: HashMap<String, String>,
    ) -> Result<&mut Self, GraphError>
    where
        R: Fn(&SwarmState) -> String + Send + Sync + 'static,
    {
        let targets = path_map
            .values()
            .map(|target| self.target_index(target))
            .collect::<Result<Vec<_>, _>>()?;

        let router: RouterFn =
            Arc::new(move |_ctx: &RunContext, state: &SwarmState| router(state));
        self.insert_branch(from, router, Some(path_map), targets)
    }

    /// Branch on `router`, which returns a node name or [`END`].
    pub fn add_conditional_edge<R>(
        &mut self,
        from: &str,
        router: R,
    ) -> Result<&mut Self, GraphError>
    where
        R: Fn(&RunContext, &SwarmState) -> String + Send + Sync + 'static,
    {
        self.insert_branch(from, Arc::new(router), None, Vec::new())
    }

    /// Declare that `from` may hand off to `to`.
    pub fn add_destination(&mut self, from: &str, to: &str) -> Result<&mut Self, GraphError> {
        let from_idx = self.node_index(from)?;
        let to_idx = self.node_index(to)?;

        if !self.declared_targets(from_idx).contains(&to_idx) {
            self.graph.add_edge(from_idx, to_idx, EdgeKind::Declared);
        }
        Ok(self)
    }

    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        if !self.has_transition(self.start) {
            tracing::error!("| state graph | Compile failed: no entry point");
            return Err(GraphError::MissingEntryPoint);
        }
        Ok(CompiledGraph::new(self))
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.node_index(name).is_ok()
    }

    /// Registered node names, in registration order.
    pub fn node_names(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter_map(|index| match &self.graph[index] {
                Vertex::Node { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Declared handoff destinations of `name`.
    pub fn destinations(&self, name: &str) -> Vec<&str> {
        match self.name_to_node.get(name) {
            Some(index) => self
                .declared_targets(*index)
                .into_iter()
                .map(|target| self.graph[target].name())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn edges(&self) -> Vec<(String, String, EdgeKind)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| {
                let (source, target) = self.graph.edge_endpoints(edge)?;
                let kind = self.graph.edge_weight(edge)?;
                Some((
                    self.graph[source].name().to_owned(),
                    self.graph[target].name().to_owned(),
                    *kind,
                ))
            })
            .collect()
    }

    /// Export the topology in DOT format for Graphviz.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph {\n");

        for index in self.graph.node_indices() {
            let name = self.graph[index].name();
            dot.push_str(&format!("    \"{}\" [label=\"{}\"];\n", name, name));
        }

        for (source, target, kind) in self.edges() {
            let style = match kind {
                EdgeKind::Direct => "solid",
                EdgeKind::Conditional => "dashed",
                EdgeKind::Declared => "dotted",
            };
            dot.push_str(&format!(
                "    \"{}\" -> \"{}\" [style={}];\n",
                source, target, style
            ));
        }

        dot.push_str("}\n");
        dot
    }

    fn insert_branch(
        &mut self,
        from: &str,
        router: RouterFn,
        path_map: Option<HashMap<String, String>>,
        targets: Vec<NodeIndex>,
    ) -> Result<&mut Self, GraphError> {
        let from_idx = self.source_index(from)?;
        self.ensure_no_transition(from_idx, from)?;

        for target in targets {
            if self.graph.find_edge(from_idx, target).is_none() {
                self.graph.add_edge(from_idx, target, EdgeKind::Conditional);
            }
        }
        self.branches.insert(from_idx, Branch { router, path_map });
        Ok(self)
    }

    fn index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        self.name_to_node
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(name.to_owned()))
    }

    fn source_index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        let index = self.index(name)?;
        if index == self.end {
            return Err(GraphError::ReservedName(name.to_owned()));
        }
        Ok(index)
    }

    fn target_index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        let index = self.index(name)?;
        if index == self.start {
            return Err(GraphError::ReservedName(name.to_owned()));
        }
        Ok(index)
    }

    fn node_index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        let index = self.index(name)?;
        if index == self.start || index == self.end {
            return Err(GraphError::ReservedName(name.to_owned()));
        }
        Ok(index)
    }

    fn has_transition(&self, index: NodeIndex) -> bool {
        self.branches.contains_key(&index)
            || self
                .graph
                .edges_directed(index, Direction::Outgoing)
                .any(|edge| *edge.weight() == EdgeKind::Direct)
    }

    fn ensure_no_transition(&self, index: NodeIndex, name: &str) -> Result<(), GraphError> {
        if self.has_transition(index) {
            return Err(GraphError::ConflictingTransition(name.to_owned()));
        }
        Ok(())
    }

    fn declared_targets(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut targets = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .filter(|edge| *edge.weight() == EdgeKind::Declared)
            .map(|edge| (edge.id(), edge.target()))
            .collect::<Vec<_>>();
        targets.sort_by_key(|(edge, _)| *edge);
        targets.into_iter().map(|(_, target)| target).collect()
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough(
        _ctx: RunContext,
        state: SwarmState,
    ) -> BoxFuture<'static, Result<NodeOutput, GraphError>> {
        Box::pin(async move { Ok(state.into()) })
    }

    #[test]
    fn test_reserved_and_duplicate_names() {
        let mut graph = StateGraph::new();
        assert!(matches!(
            graph.add_node(START, passthrough),
            Err(GraphError::ReservedName(_))
        ));
        assert!(matches!(
            graph.add_node(END, passthrough),
            Err(GraphError::ReservedName(_))
        ));

        graph.add_node("a", passthrough).unwrap();
        assert!(matches!(
            graph.add_node("a", passthrough),
            Err(GraphError::DuplicateNode(name)) if name == "a"
        ));
    }

    #[test]
    fn test_edges_require_registered_nodes() {
        let mut graph = StateGraph::new();
        graph.add_node("a", passthrough).unwrap();

        assert!(matches!(
            graph.add_edge("a", "missing"),
            Err(GraphError::UnknownNode(name)) if name == "missing"
        ));
        assert!(matches!(
            graph.add_edge(END, "a"),
            Err(GraphError::ReservedName(_))
        ));
        assert!(matches!(
            graph.add_edge("a", START),
            Err(GraphError::ReservedName(_))
        ));
        assert!(matches!(
            graph.add_destination("a", END),
            Err(GraphError::ReservedName(_))
        ));
    }

    #[test]
    fn test_single_transition_per_node() {
        let mut graph = StateGraph::new();
        graph
            .add_node("a", passthrough)
            .unwrap()
            .add_node("b", passthrough)
            .unwrap();

        graph.add_edge("a", "b").unwrap();
        assert!(matches!(
            graph.add_edge("a", END),
            Err(GraphError::ConflictingTransition(name)) if name == "a"
        ));
        assert!(matches!(
            graph.add_conditional_edge("a", |_, _| END.to_owned()),
            Err(GraphError::ConflictingTransition(_))
        ));

        // declared destinations are not transitions
        graph.add_destination("b", "a").unwrap();
        graph.add_edge("b", END).unwrap();
    }

    #[test]
    fn test_compile_requires_entry_point() {
        let mut graph = StateGraph::new();
        graph.add_node("a", passthrough).unwrap();
        assert!(matches!(
            graph.compile(),
            Err(GraphError::MissingEntryPoint)
        ));
    }

    #[test]
    fn test_destinations_deduplicate_and_keep_order() {
        let mut graph = StateGraph::new();
        for name in ["a", "b", "c"] {
            graph.add_node(name, passthrough).unwrap();
        }
        graph.add_destination("a", "c").unwrap();
        graph.add_destination("a", "b").unwrap();
        graph.add_destination("a", "c").unwrap();

        assert_eq!(graph.destinations("a"), vec!["c", "b"]);
        assert!(graph.destinations("b").is_empty());
        assert!(graph.destinations("missing").is_empty());
    }

    #[test]
    fn test_topology_export() {
        let mut graph = StateGraph::new();
        graph
            .add_node("Alice", passthrough)
            .unwrap()
            .add_node("Bob", passthrough)
            .unwrap();
        graph
            .add_conditional_edges(
                START,
                |_| "Alice".to_owned(),
                HashMap::from([
                    ("Alice".to_owned(), "Alice".to_owned()),
                    ("Bob".to_owned(), "Bob".to_owned()),
                ]),
            )
            .unwrap();
        graph.add_destination("Alice", "Bob").unwrap();

        assert_eq!(graph.node_names(), vec!["Alice", "Bob"]);

        let edges = graph.edges();
        assert_eq!(edges.len(), 3);
        assert!(edges.contains(&(START.to_owned(), "Bob".to_owned(), EdgeKind::Conditional)));
        assert!(edges.contains(&("Alice".to_owned(), "Bob".to_owned(), EdgeKind::Declared)));

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph {\n"));
        assert!(dot.contains("\"__start__\" -> \"Alice\" [style=dashed];"));
        assert!(dot.contains("\"Alice\" -> \"Bob\" [style=dotted];"));
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: GraphSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.recursion_limit, 25);

        let settings: GraphSettings = serde_json::from_str(r#"{"recursion_limit": 3}"#).unwrap();
        assert_eq!(settings.recursion_limit, 3);
    }
}
