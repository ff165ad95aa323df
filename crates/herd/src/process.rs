// ABOUTME: Shared handle to one worker's OS process.
// ABOUTME: Non-blocking exit polling for many readers; signal delivery at most once.

use crate::error::Result;
use crate::termination::TermSignal;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use tokio::process::Child;

/// Polled by the monitor, the watchdog, and the shutdown sequencer; only the
/// sequencer signals it.
///
/// The child is only ever reaped under the lock, so a signal sent while the
/// lock is held can never reach a recycled pid.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    child: Mutex<Child>,
    exit_code: OnceLock<i32>,
    signaled: AtomicBool,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        // id() is only None once the child has been awaited to completion.
        let pid = child.id().unwrap_or_default();
        Self {
            pid,
            child: Mutex::new(child),
            exit_code: OnceLock::new(),
            signaled: AtomicBool::new(false),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit code if the process has finished, without blocking.
    ///
    /// A process killed by signal `N` reports `-N`.
    pub fn exit_code(&self) -> Option<i32> {
        if let Some(code) = self.exit_code.get() {
            return Some(*code);
        }
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        self.poll_locked(&mut child)
    }

    pub fn has_exited(&self) -> bool {
        self.exit_code().is_some()
    }

    pub fn was_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// Send `signal` unless the process already exited or was already
    /// signaled. Returns whether a signal was actually delivered.
    pub fn terminate(&self, signal: TermSignal) -> Result<bool> {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if self.exit_code.get().is_some() || self.poll_locked(&mut child).is_some() {
            return Ok(false);
        }
        if self.signaled.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        kill(Pid::from_raw(self.pid as i32), signal.as_nix())?;
        tracing::debug!(pid = self.pid, signal = %signal, "Signal delivered");
        Ok(true)
    }

    fn poll_locked(&self, child: &mut Child) -> Option<i32> {
        match child.try_wait() {
            Ok(Some(status)) => {
                let code = exit_code_of(status);
                let _ = self.exit_code.set(code);
                self.exit_code.get().copied()
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "Failed to poll worker exit status");
                None
            }
        }
    }
}

pub fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}
