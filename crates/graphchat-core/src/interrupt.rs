//! Process-wide Ctrl+C flag.
//!
//! The first Ctrl+C cancels the in-flight request; a second one while the
//! flag is still set exits with status 130.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C (and, via `ctrlc`'s `termination` feature,
/// SIGTERM/SIGHUP) handler.
///
/// The handler only sets the flag. Printing belongs to the renderer.
///
/// # Errors
/// Returns an error if a handler is already installed.
pub fn init() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(trigger_ctrl_c)
}

fn notify_waiters() {
    INTERRUPT_NOTIFY.get_or_init(Notify::new).notify_waiters();
}

/// Triggers an interrupt, force-exiting on a second one.
pub fn trigger_ctrl_c() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        std::process::exit(130);
    }
    notify_waiters();
}

/// Checks if an interrupt has been requested.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until an interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        let notify = INTERRUPT_NOTIFY.get_or_init(Notify::new);
        let notified = notify.notified();
        if is_interrupted() {
            return;
        }
        notified.await;
    }
}

/// Resets the interrupt flag.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
