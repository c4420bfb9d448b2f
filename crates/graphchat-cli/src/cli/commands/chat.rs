//! Interactive chat REPL.
//!
//! Conversation history lives in the controller and accumulates across
//! prompts for the life of the process.

use std::io::{self, BufRead, Write};

use anyhow::{Result, bail};
use graphchat_core::{ControllerHandle, FailureCause, RequestStatus, SnapshotRx, SubmitOutcome};

use super::render::{Renderer, follow};
use crate::cli::ChatSettings;

const QUIT_COMMAND: &str = ":q";
const PROMPT_PREFIX: &str = "you> ";
const ASSISTANT_PREFIX: &str = "assistant> ";

pub async fn run(settings: &ChatSettings) -> Result<()> {
    let (handle, mut snapshots) = settings.start()?;
    eprintln!(
        "graphchat: {} via {} ({} to quit)",
        settings.model.label(),
        settings.base_url,
        QUIT_COMMAND
    );

    let result = run_chat(
        io::stdin().lock(),
        io::stdout(),
        io::stderr(),
        &handle,
        &mut snapshots,
    )
    .await;
    handle.shutdown();
    result
}

/// Runs the REPL over arbitrary reader/writers.
///
/// Exits on `:q` or EOF. Blank lines send nothing.
pub async fn run_chat<R, W, E>(
    input: R,
    out: W,
    err: E,
    handle: &ControllerHandle,
    snapshots: &mut SnapshotRx,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut renderer = Renderer::new(out, err, Some(ASSISTANT_PREFIX));
    prompt(&mut renderer)?;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed == QUIT_COMMAND {
            writeln!(renderer.out(), "Goodbye!")?;
            break;
        }

        if trimmed.is_empty() {
            prompt(&mut renderer)?;
            continue;
        }

        match handle.submit(trimmed).await {
            SubmitOutcome::Accepted => match follow(&mut renderer, snapshots, handle).await? {
                RequestStatus::Failed(FailureCause::Cancelled) => {
                    writeln!(renderer.err(), "Interrupted")?;
                }
                RequestStatus::Failed(cause) => {
                    writeln!(renderer.err(), "Error: {cause}")?;
                }
                _ => {}
            },
            SubmitOutcome::Blank | SubmitOutcome::Busy => {}
            SubmitOutcome::Closed => bail!("chat controller stopped"),
        }

        prompt(&mut renderer)?;
    }

    Ok(())
}

fn prompt<W: Write, E: Write>(renderer: &mut Renderer<W, E>) -> io::Result<()> {
    let err = renderer.err();
    write!(err, "{PROMPT_PREFIX}")?;
    err.flush()
}
