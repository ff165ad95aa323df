// ABOUTME: Signal coordinator for SIGTERM/SIGINT delivered to the supervisor.
// ABOUTME: First signal requests shutdown; any signal after that force-exits the supervisor.

use crate::error::{Result, SupervisorError};
use crate::output::Console;
use crate::termination::{TermSignal, TerminationState};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

/// Exit status used when a repeated signal forces the supervisor down.
pub const FORCED_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// This signal started the shutdown.
    Requested,
    /// Shutdown was already underway; the supervisor must exit now.
    Forced,
}

#[derive(Debug, Clone)]
pub struct SignalCoordinator {
    state: Arc<TerminationState>,
}

impl SignalCoordinator {
    pub fn new(state: Arc<TerminationState>) -> Self {
        Self { state }
    }

    /// Decide what a received signal means. Only touches the shared record.
    pub fn handle(&self, received: TermSignal) -> SignalOutcome {
        if self.state.request(received) {
            SignalOutcome::Requested
        } else {
            SignalOutcome::Forced
        }
    }
}

/// Install SIGTERM and SIGINT listeners. The streams are registered before
/// this returns, so signals arriving afterwards are never lost to the default
/// disposition.
///
/// A [`SignalOutcome::Forced`] terminates the process with
/// [`FORCED_EXIT_CODE`] without any further cleanup.
pub fn spawn_signal_listener(
    coordinator: SignalCoordinator,
    console: Console,
) -> Result<JoinHandle<()>> {
    let mut terminate = signal(SignalKind::terminate()).map_err(SupervisorError::SignalHandler)?;
    let mut interrupt = signal(SignalKind::interrupt()).map_err(SupervisorError::SignalHandler)?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = terminate.recv() => TermSignal::Term,
                Some(()) = interrupt.recv() => TermSignal::Int,
                else => break,
            };

            match coordinator.handle(received) {
                SignalOutcome::Requested => {
                    console.notice(&format!("Signal handler called with signal : {received}"));
                    tracing::info!(signal = %received, "Shutdown requested by signal");
                }
                SignalOutcome::Forced => {
                    console.notice("Forced termination of supervisor");
                    tracing::warn!(signal = %received, "Repeated signal, exiting immediately");
                    std::process::exit(FORCED_EXIT_CODE);
                }
            }
        }
    }))
}
