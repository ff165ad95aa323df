// ABOUTME: Shutdown sequencer: signal live workers, wait for exits, wait for monitors to drain.
// ABOUTME: Both waits are bounded; timeouts are reported once and never escalated.

use crate::output::Console;
use crate::supervisor::WorkerInstance;
use crate::termination::TermSignal;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct ShutdownPolicy {
    pub termination_timeout: Duration,
    pub drain_timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&herd_core::SupervisorSettings> for ShutdownPolicy {
    fn from(settings: &herd_core::SupervisorSettings) -> Self {
        Self {
            termination_timeout: settings.termination_timeout(),
            drain_timeout: settings.drain_timeout(),
            poll_interval: settings.poll_interval(),
        }
    }
}

/// What the shutdown did, by instance name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub signal: TermSignal,
    /// Workers that were sent `signal`.
    pub signaled: Vec<String>,
    /// Workers still alive when the termination timeout elapsed.
    pub stragglers: Vec<String>,
    /// Monitors still running when the drain timeout elapsed.
    pub live_monitors: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.stragglers.is_empty() && self.live_monitors.is_empty()
    }
}

/// Run the shutdown sequence once. Always returns; never kills harder than
/// `signal`.
pub async fn shutdown(
    workers: &[WorkerInstance],
    signal: TermSignal,
    policy: &ShutdownPolicy,
    console: &Console,
) -> ShutdownReport {
    console.notice("Start to terminate worker processes");

    let mut signaled = Vec::new();
    for worker in workers {
        match worker.process.terminate(signal) {
            Ok(true) => {
                console.status(&worker.name, &format!("{signal} is requested"));
                signaled.push(worker.name.clone());
            }
            Ok(false) => {}
            Err(e) => {
                console.status(&worker.name, &format!("Failed to send {signal}: {e}"));
                tracing::warn!(instance = %worker.name, error = %e, "Signal delivery failed");
            }
        }
    }

    let stragglers = wait_until_empty(policy.termination_timeout, policy.poll_interval, || {
        workers
            .iter()
            .filter(|w| !w.process.has_exited())
            .map(|w| w.name.clone())
            .collect()
    })
    .await;
    if !stragglers.is_empty() {
        console.notice("Timeout while waiting the termination of worker processes");
        for name in &stragglers {
            console.status(name, &format!("Still running after {signal}"));
        }
        tracing::warn!(stragglers = ?stragglers, "Termination timeout elapsed");
    }

    let live_monitors = wait_until_empty(policy.drain_timeout, policy.poll_interval, || {
        workers
            .iter()
            .filter(|w| !w.monitor.is_finished())
            .map(|w| w.name.clone())
            .collect()
    })
    .await;
    if !live_monitors.is_empty() {
        console.notice("Timeout while waiting the termination of monitor tasks");
        console.notice("Live monitor tasks:");
        for name in &live_monitors {
            console.notice(&format!("- {name}"));
        }
        tracing::warn!(monitors = ?live_monitors, "Drain timeout elapsed");
    }

    ShutdownReport {
        signal,
        signaled,
        stragglers,
        live_monitors,
    }
}

/// Poll `pending` until it comes back empty or `timeout` (measured from the
/// call) passes. Returns the last pending set.
///
/// A timeout too large to add to the clock means waiting without a deadline.
async fn wait_until_empty<F>(timeout: Duration, poll_interval: Duration, mut pending: F) -> Vec<String>
where
    F: FnMut() -> Vec<String>,
{
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let remaining = pending();
        let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if remaining.is_empty() || expired {
            return remaining;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
