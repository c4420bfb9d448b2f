//! Ask command handler: one prompt, one streamed answer.

use std::io;

use anyhow::{Result, anyhow, bail};
use graphchat_core::{FailureCause, RequestStatus, SubmitOutcome, interrupt};

use super::render::{Renderer, follow};
use crate::cli::ChatSettings;

pub async fn run(prompt: &str, settings: &ChatSettings) -> Result<()> {
    let (handle, mut snapshots) = settings.start()?;
    let mut renderer = Renderer::new(io::stdout(), io::stderr(), None);

    let status = match handle.submit(prompt).await {
        SubmitOutcome::Accepted => follow(&mut renderer, &mut snapshots, &handle).await?,
        SubmitOutcome::Blank => bail!("Prompt is empty"),
        SubmitOutcome::Busy | SubmitOutcome::Closed => bail!("chat controller unavailable"),
    };
    handle.shutdown();

    match status {
        RequestStatus::Failed(FailureCause::Cancelled) => Err(interrupt::InterruptedError.into()),
        RequestStatus::Failed(cause) => Err(anyhow!("Error: {cause}")),
        _ => Ok(()),
    }
}
