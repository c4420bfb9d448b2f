//! Terminal rendering of controller snapshots.
//!
//! Answer text goes to `out`; tool calls and the live query go to `err` so
//! piping stdout yields only the answer.

use std::io::{self, Write};

use anyhow::{Result, bail};
use graphchat_core::session::Role;
use graphchat_core::{ControllerHandle, RequestStatus, Snapshot, SnapshotRx, interrupt};

/// Breaks a SPARQL query onto a new line before every `#` comment marker.
pub fn format_live_query(query: &str) -> String {
    query.replace('#', "\n#")
}

/// Turns consecutive snapshots of one request into incremental output.
pub struct Renderer<W, E> {
    out: W,
    err: E,
    prefix: Option<&'static str>,
    printed: usize,
    trace_seen: usize,
    last_query: Option<String>,
}

impl<W: Write, E: Write> Renderer<W, E> {
    pub fn new(out: W, err: E, prefix: Option<&'static str>) -> Self {
        Self {
            out,
            err,
            prefix,
            printed: 0,
            trace_seen: 0,
            last_query: None,
        }
    }

    /// Writes whatever changed since the previous snapshot.
    pub fn render(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        let state = &snapshot.state;

        if snapshot.status == RequestStatus::Opening {
            self.printed = 0;
            self.trace_seen = 0;
            self.last_query = None;
        }

        for record in state.trace.iter().skip(self.trace_seen) {
            let args = serde_json::to_string(&record.args).unwrap_or_default();
            writeln!(self.err, "[tool] {} {args}", record.name)?;
        }
        self.trace_seen = state.trace.len();

        if let Some(query) = &state.live_query
            && self.last_query.as_ref() != Some(query)
        {
            writeln!(self.err, "[query]")?;
            for line in format_live_query(query).lines() {
                writeln!(self.err, "  {line}")?;
            }
            self.last_query = Some(query.clone());
        }
        self.err.flush()?;

        if let Some(turn) = state.last_turn().filter(|t| t.role == Role::Assistant)
            && let Some(fresh) = turn.content.get(self.printed..)
            && !fresh.is_empty()
        {
            if self.printed == 0
                && let Some(prefix) = self.prefix
            {
                write!(self.out, "{prefix}")?;
            }
            write!(self.out, "{fresh}")?;
            self.printed = turn.content.len();
            self.out.flush()?;
        }

        if snapshot.status.is_terminal() && self.printed > 0 {
            writeln!(self.out)?;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn err(&mut self) -> &mut E {
        &mut self.err
    }
}

/// Renders snapshots until the current request settles.
///
/// Ctrl+C while waiting cancels the request; the flag is cleared once the
/// request has settled. A Ctrl+C from before the call (at an idle prompt)
/// is discarded.
///
/// # Errors
/// Returns an error if writing fails or the controller went away.
pub async fn follow<W: Write, E: Write>(
    renderer: &mut Renderer<W, E>,
    snapshots: &mut SnapshotRx,
    handle: &ControllerHandle,
) -> Result<RequestStatus> {
    interrupt::reset();
    let mut cancelled = false;
    loop {
        let snapshot = tokio::select! {
            biased;
            () = interrupt::wait_for_interrupt(), if !cancelled => {
                tracing::debug!("interrupt: cancelling request");
                handle.cancel();
                cancelled = true;
                continue;
            }
            snapshot = snapshots.recv() => snapshot,
        };

        let Some(snapshot) = snapshot else {
            bail!("chat controller stopped");
        };
        renderer.render(&snapshot)?;

        if snapshot.status.is_terminal() {
            if cancelled {
                interrupt::reset();
            }
            return Ok(snapshot.status);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use graphchat_core::session::{ConversationTurn, SessionState, ToolInvocationRecord};
    use graphchat_core::FailureCause;
    use serde_json::{Map, json};

    use super::*;

    fn snapshot(state: &SessionState, status: RequestStatus) -> Snapshot {
        Snapshot {
            state: state.clone(),
            status,
        }
    }

    fn with_answer(state: &mut SessionState, content: &str) {
        state.turns.pop();
        state
            .turns
            .push(Arc::new(ConversationTurn::assistant(content)));
    }

    #[test]
    fn test_format_live_query_breaks_before_comments() {
        assert_eq!(
            format_live_query("# people\nSELECT ?p WHERE { ?p a :Person } # all"),
            "\n# people\nSELECT ?p WHERE { ?p a :Person } \n# all"
        );
        assert_eq!(format_live_query("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_render_streams_only_new_suffix() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut renderer = Renderer::new(&mut out, &mut err, Some("assistant> "));

        let mut state = SessionState {
            turns: vec![
                Arc::new(ConversationTurn::user("hi")),
                Arc::new(ConversationTurn::assistant("")),
            ],
            streaming: true,
            ..SessionState::default()
        };
        renderer
            .render(&snapshot(&state, RequestStatus::Opening))
            .unwrap();
        with_answer(&mut state, "Hel");
        renderer
            .render(&snapshot(&state, RequestStatus::Streaming))
            .unwrap();
        with_answer(&mut state, "Hello");
        renderer
            .render(&snapshot(&state, RequestStatus::Streaming))
            .unwrap();
        state.streaming = false;
        renderer
            .render(&snapshot(&state, RequestStatus::Closed))
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "assistant> Hello\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_render_tool_and_query_go_to_err_once() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut renderer = Renderer::new(&mut out, &mut err, None);

        let mut args = Map::new();
        args.insert("limit".to_string(), json!(5));
        args.insert("graph".to_string(), json!("dbpedia"));
        let mut state = SessionState {
            turns: vec![
                Arc::new(ConversationTurn::user("q")),
                Arc::new(ConversationTurn::assistant("")),
            ],
            streaming: true,
            ..SessionState::default()
        };
        state.trace.push(Arc::new(ToolInvocationRecord {
            name: "sparql_query".to_string(),
            args,
        }));
        state.live_query = Some("# count\nSELECT (COUNT(*) AS ?n) WHERE { ?s ?p ?o }".to_string());

        renderer
            .render(&snapshot(&state, RequestStatus::Streaming))
            .unwrap();
        renderer
            .render(&snapshot(&state, RequestStatus::Streaming))
            .unwrap();

        let err = String::from_utf8(err).unwrap();
        assert_eq!(
            err,
            concat!(
                "[tool] sparql_query {\"limit\":5,\"graph\":\"dbpedia\"}\n",
                "[query]\n",
                "  \n",
                "  # count\n",
                "  SELECT (COUNT(*) AS ?n) WHERE { ?s ?p ?o }\n",
            )
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_render_failure_keeps_partial_line_terminated() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut renderer = Renderer::new(&mut out, &mut err, None);

        let mut state = SessionState {
            turns: vec![
                Arc::new(ConversationTurn::user("q")),
                Arc::new(ConversationTurn::assistant("part")),
            ],
            streaming: true,
            ..SessionState::default()
        };
        renderer
            .render(&snapshot(&state, RequestStatus::Streaming))
            .unwrap();
        state.streaming = false;
        renderer
            .render(&snapshot(
                &state,
                RequestStatus::Failed(FailureCause::Cancelled),
            ))
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "part\n");
    }
}
