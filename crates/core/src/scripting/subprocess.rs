//! Shared subprocess management.
//!
//! [`run_command`] spawns one child through a [`ProcessSpawner`], drains
//! stdout and stderr on separate tasks while waiting for exit, and enforces
//! the timeout by killing the child's process group.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::{AbortHandle, JoinHandle};

use super::executor::{ExecutionError, ExecutionErrorKind, ScriptOutput};
use super::spawn::{LaunchSpec, ProcessHandle, ProcessSpawner, WaitOutcome};

/// Maximum stdout or stderr size retained per stream (10 MiB).
///
/// Bytes beyond the limit are read and discarded so the child never blocks
/// on a full pipe.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long drain tasks may run after a forced kill before being aborted.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Spawn `spec`, capture both output streams, and wait up to `timeout`.
///
/// Returns the captured output for any process that exits on its own,
/// whatever its status. Spawn errors map to
/// [`SpawnFailure`](ExecutionErrorKind::SpawnFailure) and an elapsed
/// deadline to [`Timeout`](ExecutionErrorKind::Timeout).
pub async fn run_command(
    spawner: &dyn ProcessSpawner,
    spec: &LaunchSpec,
    timeout: Duration,
) -> Result<ScriptOutput, ExecutionError> {
    let program = spec.program.to_string_lossy().into_owned();
    let start = Instant::now();

    let mut handle = spawner.spawn(spec).map_err(|e| {
        ExecutionError::new(
            ExecutionErrorKind::SpawnFailure,
            format!("Failed to start '{program}': {e}"),
        )
    })?;

    // Drain both pipes on their own tasks so a chatty child cannot fill a
    // pipe buffer and stall while we wait for it.
    let stdout_task = tokio::spawn(drain_stream(handle.take_stdout()));
    let stderr_task = tokio::spawn(drain_stream(handle.take_stderr()));
    let mut guard = InFlight {
        pid: handle.pid(),
        drains: [stdout_task.abort_handle(), stderr_task.abort_handle()],
        armed: true,
    };

    let outcome = handle.wait_with_timeout(timeout).await;

    let status = match outcome {
        Ok(WaitOutcome::Exited(status)) => status,
        Ok(WaitOutcome::TimedOut) => {
            if let Err(e) = handle.kill().await {
                tracing::warn!(program = %program, error = %e, "Failed to kill timed-out process");
            }
            finish_drain(stdout_task, DRAIN_GRACE).await;
            finish_drain(stderr_task, DRAIN_GRACE).await;
            guard.disarm();
            let elapsed_ms = start.elapsed().as_millis() as u64;
            return Err(ExecutionError::new(
                ExecutionErrorKind::Timeout,
                format!("Script execution timed out after {elapsed_ms}ms"),
            ));
        }
        Err(e) => {
            if let Err(kill_err) = handle.kill().await {
                tracing::warn!(program = %program, error = %kill_err, "Failed to kill process");
            }
            finish_drain(stdout_task, DRAIN_GRACE).await;
            finish_drain(stderr_task, DRAIN_GRACE).await;
            guard.disarm();
            return Err(ExecutionError::new(
                ExecutionErrorKind::SpawnFailure,
                format!("Failed waiting for '{program}': {e}"),
            ));
        }
    };

    let stdout_bytes = join_after_exit(&handle, stdout_task).await;
    let stderr_bytes = join_after_exit(&handle, stderr_task).await;
    guard.disarm();

    Ok(ScriptOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_code: status.code().unwrap_or(-1),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Cleanup for a [`run_command`] future dropped before it finished.
///
/// Aborts both drain tasks and kills the process group. Once the command
/// has run to completion the guard is disarmed and dropping it is a no-op.
struct InFlight {
    pid: Option<u32>,
    drains: [AbortHandle; 2],
    armed: bool,
}

impl InFlight {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(pid = ?self.pid, "Invocation abandoned, killing process group");
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            super::spawn::kill_process_group(pid);
        }
        for drain in &self.drains {
            drain.abort();
        }
    }
}

/// Read a stream to EOF, keeping at most [`MAX_OUTPUT_BYTES`].
async fn drain_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(mut reader) = handle else {
        return buf;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "Output stream read failed, stopping drain");
                break;
            }
        }
    }
    buf
}

/// Join a drain task once the child has exited.
///
/// The pipe normally closes with the child. A leftover background
/// descendant can keep it open; after [`DRAIN_GRACE`] the process group is
/// killed so the drain sees EOF with everything written so far.
async fn join_after_exit(handle: &ProcessHandle, mut task: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_elapsed) => {
            tracing::warn!(
                pid = ?handle.pid(),
                "Descendant still holds an output pipe, killing process group",
            );
            handle.kill_group();
            finish_drain(task, DRAIN_GRACE).await
        }
    }
}

/// Join a drain task, aborting it if the pipe stays open past `grace`.
/// An aborted drain yields no output.
async fn finish_drain(task: JoinHandle<Vec<u8>>, grace: Duration) -> Vec<u8> {
    let abort = task.abort_handle();
    match tokio::time::timeout(grace, task).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_elapsed) => {
            tracing::warn!("Output pipe still open, abandoning drain");
            abort.abort();
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
