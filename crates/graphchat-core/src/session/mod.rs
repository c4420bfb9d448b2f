//! Conversation state and the reducer that folds stream events into it.

pub mod reducer;
mod state;

pub use reducer::{apply, reduce};
pub use state::{ConversationTurn, Role, SessionState, ToolInvocationRecord};
