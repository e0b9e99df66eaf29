use std::collections::VecDeque;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    context::RunContext,
    message::{Message, ToolCall},
    tool::ToolDefinition,
};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Model returned no choices")]
    NoChoiceFound,
    #[error("Model call cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl CompletionRequest {
    /// The conversation with the system prompt, if any, in front.
    pub fn to_messages(&self) -> Vec<Message> {
        self.system_prompt
            .iter()
            .map(Message::system)
            .chain(self.messages.iter().cloned())
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A response that calls `name` with a generated call id.
    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::default().with_tool_call(name, arguments)
    }

    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        self.tool_calls.push(ToolCall::new(id, name, arguments));
        self
    }
}

/// A chat model that can call tools.
pub trait Model: Send + Sync {
    fn completion<'a>(
        &'a self,
        ctx: &'a RunContext,
        request: CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, ModelError>>;
}

/// Replays canned responses in order, recording every request.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: impl IntoIterator<Item = CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn push_response(&self, response: CompletionResponse) {
        self.responses.lock().await.push_back(response);
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.responses.lock().await.len()
    }
}

impl Model for ScriptedModel {
    fn completion<'a>(
        &'a self,
        ctx: &'a RunContext,
        request: CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, ModelError>> {
        Box::pin(async move {
            if ctx.is_cancelled() {
                return Err(ModelError::Cancelled);
            }
            self.requests.lock().await.push(request);
            self.responses
                .lock()
                .await
                .pop_front()
                .ok_or(ModelError::NoChoiceFound)
        })
    }
}
