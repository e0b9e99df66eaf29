use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Per-invocation context handed to every node, agent, tool and model call.
///
/// Cloning is cheap; clones share the same cancellation token.
#[derive(Clone, Debug, Default)]
pub struct RunContext {
    cancellation: CancellationToken,
    thread_id: Option<String>,
    extension: Option<Arc<serde_json::Value>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Opaque conversation key, for callers that persist state per thread.
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_extension(mut self, extension: serde_json::Value) -> Self {
        self.extension = Some(Arc::new(extension));
        self
    }

    pub(crate) fn or_extension(&self, extension: Option<&Arc<serde_json::Value>>) -> Self {
        let mut ctx = self.clone();
        if ctx.extension.is_none() {
            ctx.extension = extension.cloned();
        }
        ctx
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn extension(&self) -> Option<&serde_json::Value> {
        self.extension.as_deref()
    }
}
