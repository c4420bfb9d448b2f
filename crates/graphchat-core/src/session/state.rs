//! Conversation and tool-trace state owned by the stream controller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool call reported by the backend.
///
/// `args` keeps the key order of the wire object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// Conversation plus per-request tool trace.
///
/// Turns and trace records sit behind `Arc`: snapshots share unchanged
/// entries, and a changed turn is always a new allocation, so consumers can
/// detect updates with `Arc::ptr_eq`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub turns: Vec<Arc<ConversationTurn>>,
    pub trace: Vec<Arc<ToolInvocationRecord>>,
    pub live_query: Option<String>,
    pub streaming: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_turn(&self) -> Option<&Arc<ConversationTurn>> {
        self.turns.last()
    }

    /// Turns as plain values, in order.
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.turns.iter().map(|turn| (**turn).clone()).collect()
    }

    /// Resets per-request state and opens a new exchange.
    ///
    /// Appends the user turn and an empty assistant turn that becomes the
    /// active turn.
    pub(crate) fn begin_request(&mut self, message: &str) {
        self.turns.push(Arc::new(ConversationTurn::user(message)));
        self.turns.push(Arc::new(ConversationTurn::assistant("")));
        self.trace.clear();
        self.live_query = None;
        self.streaming = true;
    }

    pub(crate) fn end_request(&mut self) {
        self.streaming = false;
    }
}
