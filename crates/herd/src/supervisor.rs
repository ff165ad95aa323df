// ABOUTME: Top-level supervisor wiring launcher, monitors, watchdog, signals, and shutdown.
// ABOUTME: Owns every WorkerInstance from launch until the shutdown report is produced.

use crate::descriptor::{expand_descriptors, WorkerDescriptor};
use crate::error::Result;
use crate::launcher::{launch, LaunchedWorker};
use crate::monitor::spawn_monitor;
use crate::output::{Console, LineSink};
use crate::process::ProcessHandle;
use crate::shutdown::{shutdown, ShutdownPolicy, ShutdownReport};
use crate::signals::{spawn_signal_listener, SignalCoordinator};
use crate::termination::TerminationState;
use crate::watchdog::{spawn_watchdog, Probe};
use chrono::{DateTime, Utc};
use herd_core::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One running replica and the monitor draining its output.
#[derive(Debug)]
pub struct WorkerInstance {
    pub name: String,
    pub command: Vec<String>,
    pub process: Arc<ProcessHandle>,
    pub monitor: JoinHandle<()>,
    pub started_at: DateTime<Utc>,
}

impl WorkerInstance {
    /// Attach an output monitor to a freshly launched worker.
    pub fn start(launched: LaunchedWorker, console: Console, poll_interval: Duration) -> Self {
        let LaunchedWorker {
            descriptor: WorkerDescriptor {
                instance_name,
                command,
                ..
            },
            process,
            output,
            started_at,
        } = launched;

        let monitor = spawn_monitor(
            instance_name.clone(),
            output,
            Arc::clone(&process),
            console,
            poll_interval,
        );

        Self {
            name: instance_name,
            command,
            process,
            monitor,
            started_at,
        }
    }

    pub fn pid(&self) -> u32 {
        self.process.pid()
    }
}

pub struct Supervisor {
    config: Config,
    sink: Arc<dyn LineSink>,
    state: Arc<TerminationState>,
    handle_signals: bool,
}

impl Supervisor {
    pub fn new(config: Config, sink: Arc<dyn LineSink>) -> Self {
        Self {
            config,
            sink,
            state: Arc::new(TerminationState::new()),
            handle_signals: true,
        }
    }

    /// Skip installing SIGTERM/SIGINT handlers, for embedders that route
    /// signals themselves through [`Supervisor::termination_state`].
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    pub fn termination_state(&self) -> Arc<TerminationState> {
        Arc::clone(&self.state)
    }

    /// Launch the fleet, wait for the first stop condition, then shut down.
    ///
    /// Fails only if startup fails; timeouts during shutdown are part of the
    /// returned report.
    ///
    /// With signal handling on, tokio's SIGTERM/SIGINT handlers stay installed
    /// for the rest of the process after this returns. Those signals no longer
    /// terminate the process by default; an embedder that keeps running must
    /// listen for them itself.
    pub async fn run(self) -> Result<ShutdownReport> {
        let settings = &self.config.supervisor;
        let poll_interval = settings.poll_interval();
        let policy = ShutdownPolicy::from(settings);

        let descriptors = expand_descriptors(&self.config.groups);
        let console = Console::new(
            Arc::clone(&self.sink),
            &settings.label,
            descriptors.iter().map(|d| d.instance_name.as_str()),
        );

        let listener = if self.handle_signals {
            Some(spawn_signal_listener(
                SignalCoordinator::new(Arc::clone(&self.state)),
                console.clone(),
            )?)
        } else {
            None
        };

        let launched = match launch(&descriptors) {
            Ok(launched) => launched,
            Err(e) => {
                if let Some(listener) = &listener {
                    listener.abort();
                }
                return Err(e);
            }
        };
        let workers: Vec<WorkerInstance> = launched
            .into_iter()
            .map(|launched| WorkerInstance::start(launched, console.clone(), poll_interval))
            .collect();

        for worker in &workers {
            console.status(
                &worker.name,
                &format!("Started a process with PID {}", worker.pid()),
            );
            tracing::debug!(
                instance = %worker.name,
                pid = worker.pid(),
                command = ?worker.command,
                started_at = %worker.started_at,
                "Worker running"
            );
        }
        tracing::info!(instances = workers.len(), "Fleet started");

        let probes = workers
            .iter()
            .map(|w| Probe {
                instance: w.name.clone(),
                process: Arc::clone(&w.process),
            })
            .collect();
        let watchdog = spawn_watchdog(
            probes,
            Arc::clone(&self.state),
            console.clone(),
            poll_interval,
        );

        let signal = self.state.wait().await;
        let trigger = watchdog.await.ok().flatten();
        tracing::info!(
            signal = %signal,
            trigger = trigger.as_deref().unwrap_or("signal"),
            "Shutdown requested"
        );

        let report = shutdown(&workers, signal, &policy, &console).await;

        // Armed through the whole shutdown so a repeated signal still force-exits.
        if let Some(listener) = listener {
            listener.abort();
        }

        Ok(report)
    }
}
