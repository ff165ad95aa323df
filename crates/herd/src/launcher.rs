// ABOUTME: Starts one OS process per worker descriptor in its own process group.
// ABOUTME: stdout and stderr share a single pipe so the monitor reads one merged stream.

use crate::descriptor::WorkerDescriptor;
use crate::error::{Result, SupervisorError};
use crate::process::ProcessHandle;
use crate::termination::TermSignal;
use chrono::{DateTime, Utc};
use std::os::fd::OwnedFd;
use std::process::Stdio;
use std::sync::Arc;
use tokio::net::unix::pipe;
use tokio::process::Command;

/// A started worker whose output has not been picked up by a monitor yet.
pub struct LaunchedWorker {
    pub descriptor: WorkerDescriptor,
    pub process: Arc<ProcessHandle>,
    pub output: pipe::Receiver,
    pub started_at: DateTime<Utc>,
}

/// Start every descriptor, or none of them.
///
/// If any spawn fails, the workers already started are sent SIGTERM and the
/// error is returned; the supervisor never runs a partial fleet.
pub fn launch(descriptors: &[WorkerDescriptor]) -> Result<Vec<LaunchedWorker>> {
    let mut launched = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        match spawn_worker(descriptor) {
            Ok(worker) => launched.push(worker),
            Err(e) => {
                tracing::error!(
                    instance = %descriptor.instance_name,
                    error = %e,
                    started = launched.len(),
                    "Launch failed, stopping workers already started"
                );
                abort_launched(&launched);
                return Err(e);
            }
        }
    }
    Ok(launched)
}

fn spawn_worker(descriptor: &WorkerDescriptor) -> Result<LaunchedWorker> {
    let pipe_error = |source| SupervisorError::Pipe {
        instance: descriptor.instance_name.clone(),
        source,
    };

    let (reader, writer) = std::io::pipe().map_err(pipe_error)?;
    let stderr = writer.try_clone().map_err(pipe_error)?;

    let mut cmd = Command::new(descriptor.program());
    cmd.args(descriptor.args())
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr)
        .process_group(0);

    let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
        instance: descriptor.instance_name.clone(),
        program: descriptor.program().to_string(),
        source,
    })?;
    // Close our copies of the write end so EOF arrives when the worker exits.
    drop(cmd);

    let output = pipe::Receiver::from_owned_fd(OwnedFd::from(reader)).map_err(pipe_error)?;
    let process = Arc::new(ProcessHandle::new(child));

    tracing::info!(
        instance = %descriptor.instance_name,
        pid = process.pid(),
        program = %descriptor.program(),
        "Spawned worker"
    );

    Ok(LaunchedWorker {
        descriptor: descriptor.clone(),
        process,
        output,
        started_at: Utc::now(),
    })
}

fn abort_launched(launched: &[LaunchedWorker]) {
    for worker in launched {
        if let Err(e) = worker.process.terminate(TermSignal::Term) {
            tracing::warn!(
                instance = %worker.descriptor.instance_name,
                error = %e,
                "Failed to stop worker after launch failure"
            );
        }
    }
}
