//! Stream controller.
//!
//! Owns the `SessionState` and drives one request at a time through
//! `Idle → Opening → Streaming → (Closed | Failed) → Idle`. The UI talks to
//! it through a cloneable [`ControllerHandle`] and reads [`Snapshot`]s from a
//! bounded channel, in order, one per state change.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{ByteStream, ChatRequest, ChatTransport, TransportError};
use crate::session::{SessionState, apply};
use crate::stream::EventPipeline;

/// Where the current request is.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestStatus {
    /// Request sent, waiting for the response to become readable.
    Opening,
    /// Response body is being consumed.
    Streaming,
    /// Stream ended normally.
    Closed,
    /// Transport failed or the request was cancelled. State is kept as-is.
    Failed(FailureCause),
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Closed | RequestStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    Transport {
        kind: crate::client::TransportErrorKind,
        message: String,
    },
    Cancelled,
}

impl From<TransportError> for FailureCause {
    fn from(err: TransportError) -> Self {
        FailureCause::Transport {
            kind: err.kind,
            message: err.message,
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Transport { message, .. } => f.write_str(message),
            FailureCause::Cancelled => f.write_str("Request cancelled"),
        }
    }
}

/// Read-only copy of the session published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: SessionState,
    pub status: RequestStatus,
}

pub type SnapshotRx = mpsc::Receiver<Snapshot>;

/// Answer to [`ControllerHandle::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The request started. Snapshots follow.
    Accepted,
    /// Input was empty or whitespace; nothing happened.
    Blank,
    /// A request is already in flight; nothing happened.
    Busy,
    /// The controller task has stopped.
    Closed,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Backend provider id sent as `model`
    pub model: String,
    pub snapshot_capacity: usize,
}

enum Command {
    Submit {
        text: String,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    Cancel,
}

/// Cloneable handle to a running controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Submit { text, .. } => f.debug_struct("Submit").field("text", text).finish(),
            Command::Cancel => f.write_str("Cancel"),
        }
    }
}

impl ControllerHandle {
    /// Submits a user message.
    ///
    /// Returns once the controller has either started the request (the
    /// `Opening` snapshot is already queued) or refused it.
    pub async fn submit(&self, text: impl Into<String>) -> SubmitOutcome {
        let (reply, outcome) = oneshot::channel();
        let command = Command::Submit {
            text: text.into(),
            reply,
        };
        if self.commands.send(command).is_err() {
            return SubmitOutcome::Closed;
        }
        outcome.await.unwrap_or(SubmitOutcome::Closed)
    }

    /// Cancels the in-flight request, if any.
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }

    /// Stops the controller task. An in-flight request is dropped without a
    /// final snapshot.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Spawns the controller task on the current tokio runtime.
pub fn spawn_controller(
    transport: Arc<dyn ChatTransport>,
    options: ControllerOptions,
) -> (ControllerHandle, SnapshotRx) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = mpsc::channel(options.snapshot_capacity.max(1));
    let shutdown = CancellationToken::new();

    let controller = Controller {
        transport,
        model: options.model,
        state: SessionState::new(),
        commands: command_rx,
        snapshots: snapshot_tx,
        shutdown: shutdown.clone(),
    };
    tokio::spawn(controller.run());

    let handle = ControllerHandle {
        commands: command_tx,
        shutdown,
    };
    (handle, snapshot_rx)
}

/// The controller can no longer do useful work: shutdown was requested,
/// every handle is gone, or nobody reads snapshots.
struct Detached;

type Flow = Result<(), Detached>;

enum BusyAction {
    Continue,
    Cancel,
}

struct Controller {
    transport: Arc<dyn ChatTransport>,
    model: String,
    state: SessionState,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshots: mpsc::Sender<Snapshot>,
    shutdown: CancellationToken,
}

impl Controller {
    async fn run(mut self) {
        loop {
            let command = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                command = self.commands.recv() => command,
            };
            let Some(command) = command else {
                break;
            };

            match command {
                Command::Submit { text, reply } => {
                    let text = text.trim();
                    if text.is_empty() {
                        let _ = reply.send(SubmitOutcome::Blank);
                        continue;
                    }

                    let request_id = Uuid::new_v4();
                    let span = tracing::info_span!("chat_request", %request_id, model = %self.model);
                    let text = text.to_string();
                    if self.run_request(text, reply).instrument(span).await.is_err() {
                        break;
                    }
                }
                // Nothing in flight.
                Command::Cancel => {}
            }
        }
        tracing::debug!("controller stopped");
    }

    async fn run_request(&mut self, text: String, reply: oneshot::Sender<SubmitOutcome>) -> Flow {
        let request = ChatRequest {
            message: text.clone(),
            model: self.model.clone(),
            history: self.state.history(),
        };
        self.state.begin_request(&text);
        self.publish(RequestStatus::Opening).await?;
        let _ = reply.send(SubmitOutcome::Accepted);
        tracing::info!(history = request.history.len(), "request started");

        let mut open = self.transport.open(request);
        let opened = loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Err(Detached),
                command = self.commands.recv() => match Self::on_busy_command(command)? {
                    BusyAction::Continue => {}
                    BusyAction::Cancel => return self.fail(FailureCause::Cancelled).await,
                },
                result = &mut open => break result,
            }
        };
        drop(open);

        let stream = match opened {
            Ok(stream) => stream,
            Err(err) => return self.fail(err.into()).await,
        };
        self.publish(RequestStatus::Streaming).await?;
        self.consume(stream).await
    }

    async fn consume(&mut self, mut stream: ByteStream) -> Flow {
        let mut pipeline = EventPipeline::new();
        let mut events = 0usize;

        loop {
            let chunk = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Err(Detached),
                command = self.commands.recv() => {
                    match Self::on_busy_command(command)? {
                        BusyAction::Continue => continue,
                        BusyAction::Cancel => {
                            drop(stream);
                            return self.fail(FailureCause::Cancelled).await;
                        }
                    }
                }
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    for event in pipeline.push(&bytes) {
                        events += 1;
                        tracing::trace!(kind = event.kind(), "event");
                        if apply(&mut self.state, event) {
                            self.publish(RequestStatus::Streaming).await?;
                        }
                    }
                }
                Some(Err(err)) => {
                    drop(stream);
                    return self.fail(err.into()).await;
                }
                None => break,
            }
        }

        pipeline.finish();
        self.state.end_request();
        tracing::info!(events, "request finished");
        self.publish(RequestStatus::Closed).await
    }

    /// Handles a command that arrives while a request is in flight.
    fn on_busy_command(command: Option<Command>) -> Result<BusyAction, Detached> {
        match command {
            Some(Command::Submit { reply, .. }) => {
                tracing::debug!("submit rejected: request in flight");
                let _ = reply.send(SubmitOutcome::Busy);
                Ok(BusyAction::Continue)
            }
            Some(Command::Cancel) => Ok(BusyAction::Cancel),
            None => Err(Detached),
        }
    }

    async fn fail(&mut self, cause: FailureCause) -> Flow {
        match &cause {
            FailureCause::Cancelled => tracing::info!("request cancelled"),
            FailureCause::Transport { kind, message } => {
                tracing::error!(%kind, error = %message, "request failed");
            }
        }
        self.state.end_request();
        self.publish(RequestStatus::Failed(cause)).await
    }

    async fn publish(&self, status: RequestStatus) -> Flow {
        let snapshot = Snapshot {
            state: self.state.clone(),
            status,
        };
        self.snapshots.send(snapshot).await.map_err(|_| Detached)
    }
}
