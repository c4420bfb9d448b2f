//! Typed events carried by the chat stream.

use crate::session::ToolInvocationRecord;

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Content fragment appended to the active assistant turn.
    Token(String),
    /// A tool call began on the backend.
    ToolStart(ToolInvocationRecord),
    /// Current text of the graph query; replaces any previous one.
    QueryUpdate(String),
    /// An event type this client does not know. Always safe to ignore.
    Unrecognized { kind: String },
}

impl StreamEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::Token(_) => "token",
            StreamEvent::ToolStart(_) => "tool_start",
            StreamEvent::QueryUpdate(_) => "sparql_update",
            StreamEvent::Unrecognized { kind } => kind,
        }
    }
}
