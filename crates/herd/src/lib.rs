// ABOUTME: herd library: a local supervisor for replicated worker processes.
// ABOUTME: Re-exports the launcher, monitors, watchdog, signal handling, and shutdown sequencer.

pub mod descriptor;
pub mod error;
pub mod launcher;
pub mod monitor;
pub mod output;
pub mod process;
pub mod shutdown;
pub mod signals;
pub mod supervisor;
pub mod termination;
pub mod watchdog;

pub use descriptor::{expand_descriptors, WorkerDescriptor};
pub use error::{Result, SupervisorError};
pub use herd_core::{Config, SupervisorSettings, WorkerGroupSpec};
pub use launcher::{launch, LaunchedWorker};
pub use output::{BufferSink, Console, LineSink, Marker, StdoutSink};
pub use process::ProcessHandle;
pub use shutdown::{shutdown, ShutdownPolicy, ShutdownReport};
pub use signals::{SignalCoordinator, SignalOutcome, FORCED_EXIT_CODE};
pub use supervisor::{Supervisor, WorkerInstance};
pub use termination::{TermSignal, TerminationState};
