// ABOUTME: Liveness watchdog that turns the first unexpected worker exit into fleet shutdown.
// ABOUTME: Polls on a fixed interval and stands down as soon as shutdown is requested.

use crate::output::Console;
use crate::process::ProcessHandle;
use crate::termination::{TermSignal, TerminationState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A named process the watchdog keeps an eye on.
#[derive(Debug, Clone)]
pub struct Probe {
    pub instance: String,
    pub process: Arc<ProcessHandle>,
}

/// Resolves to the instance whose exit triggered shutdown, or `None` if
/// something else requested shutdown first.
pub fn spawn_watchdog(
    probes: Vec<Probe>,
    state: Arc<TerminationState>,
    console: Console,
    poll_interval: Duration,
) -> JoinHandle<Option<String>> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if state.is_requested() {
                return None;
            }

            let Some((probe, code)) = probes
                .iter()
                .find_map(|p| p.process.exit_code().map(|code| (p, code)))
            else {
                continue;
            };

            if !state.request(TermSignal::Term) {
                // A signal got there first.
                return None;
            }
            console.status(
                &probe.instance,
                &format!("Exited unexpectedly (retcode: {code}), shutting down"),
            );
            tracing::warn!(
                instance = %probe.instance,
                pid = probe.process.pid(),
                code,
                "Worker exited unexpectedly, starting shutdown"
            );
            return Some(probe.instance.clone());
        }
    })
}
