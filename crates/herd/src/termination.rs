// ABOUTME: Process-wide termination record shared by the watchdog, signals, and shutdown.
// ABOUTME: First writer wins; later requests are rejected and leave the record untouched.

use nix::sys::signal::Signal;
use std::fmt;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

/// The two termination signals the supervisor accepts and forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermSignal {
    Term,
    Int,
}

impl TermSignal {
    pub fn name(self) -> &'static str {
        match self {
            TermSignal::Term => "SIGTERM",
            TermSignal::Int => "SIGINT",
        }
    }

    pub fn as_nix(self) -> Signal {
        match self {
            TermSignal::Term => Signal::SIGTERM,
            TermSignal::Int => Signal::SIGINT,
        }
    }
}

impl fmt::Display for TermSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `{requested: false}` until the first `request`, then frozen with the
/// signal that request carried.
#[derive(Debug, Default)]
pub struct TerminationState {
    signal: OnceLock<TermSignal>,
    requested: CancellationToken,
}

impl TerminationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a shutdown request. Returns `true` only for the caller that
    /// actually flipped the state.
    pub fn request(&self, signal: TermSignal) -> bool {
        let first = self.signal.set(signal).is_ok();
        if first {
            self.requested.cancel();
        }
        first
    }

    pub fn is_requested(&self) -> bool {
        self.signal.get().is_some()
    }

    /// The signal to forward to workers, once shutdown has been requested.
    pub fn signal(&self) -> Option<TermSignal> {
        self.signal.get().copied()
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&self) -> TermSignal {
        self.requested.cancelled().await;
        self.signal().unwrap_or(TermSignal::Term)
    }
}
