//! Core library for graphchat: streaming client for a SPARQL chat agent.
//!
//! Bytes from the backend flow through `stream` (UTF-8 → frames → events),
//! get folded into `session` state, and the `controller` publishes a
//! snapshot after every change. Nothing here touches the terminal.

pub mod client;
pub mod config;
pub mod controller;
pub mod debug_trace;
pub mod interrupt;
pub mod logging;
pub mod models;
pub mod session;
pub mod stream;

pub use client::{
    ByteStream, ChatRequest, ChatTransport, HttpTransport, TransportError, TransportErrorKind,
    TransportResult,
};
pub use controller::{
    ControllerHandle, ControllerOptions, FailureCause, RequestStatus, Snapshot, SnapshotRx,
    SubmitOutcome, spawn_controller,
};
pub use session::{ConversationTurn, Role, SessionState, ToolInvocationRecord};
pub use stream::StreamEvent;
