use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use petgraph::{Direction, graph::NodeIndex, visit::EdgeRef};

use crate::{context::RunContext, state::SwarmState};

use super::{END, EdgeKind, GraphError, GraphSettings, NodeOutput, StateGraph, Vertex};

/// Snapshot emitted after each executed node.
#[derive(Clone, Debug, PartialEq)]
pub struct StepEvent {
    pub node: String,
    pub step: usize,
    pub state: SwarmState,
}

/// A validated [`StateGraph`], ready to run.
pub struct CompiledGraph {
    graph: StateGraph,
}

enum Target {
    Node(NodeIndex),
    End,
}

enum Cursor {
    Entry(SwarmState),
    Next {
        index: NodeIndex,
        state: SwarmState,
        step: usize,
    },
    Done,
}

impl CompiledGraph {
    pub(super) fn new(graph: StateGraph) -> Self {
        Self { graph }
    }

    pub fn settings(&self) -> &GraphSettings {
        self.graph.settings()
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.graph.node_names()
    }

    pub fn destinations(&self, name: &str) -> Vec<&str> {
        self.graph.destinations(name)
    }

    pub fn edges(&self) -> Vec<(String, String, EdgeKind)> {
        self.graph.edges()
    }

    pub fn to_dot(&self) -> String {
        self.graph.to_dot()
    }

    /// Run until the graph reaches [`END`] and return the final state.
    ///
    /// On error nothing is returned: the caller's copy of the input state is
    /// the last known good state.
    pub async fn invoke(
        &self,
        ctx: &RunContext,
        state: SwarmState,
    ) -> Result<SwarmState, GraphError> {
        let mut steps = self.stream(ctx, state.clone());
        let mut last = state;
        while let Some(event) = steps.try_next().await? {
            last = event.state;
        }
        Ok(last)
    }

    /// Run the graph, yielding the state after every node.
    ///
    /// The stream ends after the first error.
    pub fn stream<'a>(
        &'a self,
        ctx: &RunContext,
        state: SwarmState,
    ) -> BoxStream<'a, Result<StepEvent, GraphError>> {
        let ctx = ctx.or_extension(self.graph.context.as_ref());
        stream::try_unfold(Cursor::Entry(state), move |cursor| {
            self.advance(ctx.clone(), cursor)
        })
        .boxed()
    }

    async fn advance(
        &self,
        ctx: RunContext,
        cursor: Cursor,
    ) -> Result<Option<(StepEvent, Cursor)>, GraphError> {
        let (index, state, step) = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Entry(state) => match self.route(self.graph.start, &ctx, &state)? {
                Target::End => return Ok(None),
                Target::Node(index) => (index, state, 0),
            },
            Cursor::Next { index, state, step } => (index, state, step),
        };

        let (event, target) = self.execute(&ctx, index, state, step).await?;
        let cursor = match target {
            Target::End => {
                tracing::debug!("| state graph | Finished after {} steps", step + 1);
                Cursor::Done
            }
            Target::Node(index) => Cursor::Next {
                index,
                state: event.state.clone(),
                step: step + 1,
            },
        };
        Ok(Some((event, cursor)))
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        index: NodeIndex,
        state: SwarmState,
        step: usize,
    ) -> Result<(StepEvent, Target), GraphError> {
        let limit = self.graph.settings.recursion_limit;
        if step >= limit {
            return Err(GraphError::RecursionLimit(limit));
        }

        let Some(Vertex::Node { name, node }) = self.graph.graph.node_weight(index) else {
            return Err(GraphError::UnknownNode(format!("{index:?}")));
        };
        tracing::debug!("| state graph | Node: {} | Step: {}", name, step);

        let input = state.clone();
        let output = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(GraphError::Cancelled),
            output = node.run(ctx.clone(), state) => output.inspect_err(|e| {
                tracing::error!("| state graph | Node: {} | Error: {}", name, e)
            })?,
        };

        let (state, target) = match output {
            NodeOutput::State(state) => {
                let target = self.route(index, ctx, &state)?;
                (state, target)
            }
            NodeOutput::Command(command) => {
                let target = self.jump(index, &command.goto)?;
                (command.update.apply(input), target)
            }
        };

        let event = StepEvent {
            node: name.clone(),
            step,
            state,
        };
        Ok((event, target))
    }

    /// Follow the transition out of `index`; no transition means [`END`].
    fn route(
        &self,
        index: NodeIndex,
        ctx: &RunContext,
        state: &SwarmState,
    ) -> Result<Target, GraphError> {
        let from = self.graph.graph[index].name();

        if let Some(branch) = self.graph.branches.get(&index) {
            let route = (branch.router)(ctx, state);
            let resolved = match &branch.path_map {
                Some(path_map) => path_map.get(&route),
                None => Some(&route),
            };
            tracing::debug!("| state graph | Route: {} -> {}", from, route);

            return resolved
                .and_then(|target| self.target(target))
                .ok_or_else(|| GraphError::UnknownRoute {
                    from: from.to_owned(),
                    route,
                });
        }

        let next = self
            .graph
            .graph
            .edges_directed(index, Direction::Outgoing)
            .find(|edge| *edge.weight() == EdgeKind::Direct)
            .map(|edge| edge.target());
        Ok(match next {
            Some(next) if next != self.graph.end => Target::Node(next),
            _ => Target::End,
        })
    }

    fn jump(&self, index: NodeIndex, goto: &str) -> Result<Target, GraphError> {
        let from = self.graph.graph[index].name();
        let target = self
            .target(goto)
            .ok_or_else(|| GraphError::UnknownNode(goto.to_owned()))?;

        if let Target::Node(next) = target {
            let declared = self.graph.declared_targets(index);
            if !declared.is_empty() && !declared.contains(&next) {
                return Err(GraphError::UndeclaredDestination {
                    from: from.to_owned(),
                    to: goto.to_owned(),
                });
            }
        }

        tracing::info!("| state graph | Jump: {} -> {}", from, goto);
        Ok(target)
    }

    fn target(&self, name: &str) -> Option<Target> {
        if name == END {
            return Some(Target::End);
        }
        self.graph
            .name_to_node
            .get(name)
            .filter(|index| **index != self.graph.start)
            .map(|index| Target::Node(*index))
    }
}
