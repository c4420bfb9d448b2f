//! Session reducer.
//!
//! All event-driven state changes happen here. The controller calls
//! `apply(state, event)` once per decoded event, in arrival order.
//! Request lifecycle (`streaming`, resets) is not the reducer's business.

use std::sync::Arc;

use crate::session::{ConversationTurn, SessionState};
use crate::stream::StreamEvent;

/// Applies one event to the state in place.
///
/// Returns `true` if the state changed and a snapshot should be published.
pub fn apply(state: &mut SessionState, event: StreamEvent) -> bool {
    match event {
        StreamEvent::Token(text) => {
            append_to_active_turn(state, &text);
            true
        }
        StreamEvent::ToolStart(record) => {
            state.trace.push(Arc::new(record));
            true
        }
        StreamEvent::QueryUpdate(query) => {
            state.live_query = Some(query);
            true
        }
        StreamEvent::Unrecognized { .. } => false,
    }
}

/// Value-style form of [`apply`].
pub fn reduce(mut state: SessionState, event: StreamEvent) -> SessionState {
    apply(&mut state, event);
    state
}

// Replaces the last turn with a new value instead of editing it, so every
// token produces a distinct `Arc`.
fn append_to_active_turn(state: &mut SessionState, text: &str) {
    let Some(last) = state.turns.last_mut() else {
        state.turns.push(Arc::new(ConversationTurn::assistant(text)));
        return;
    };

    let mut content = String::with_capacity(last.content.len() + text.len());
    content.push_str(&last.content);
    content.push_str(text);
    *last = Arc::new(ConversationTurn {
        role: last.role,
        content,
    });
}
