//! Process spawning capability.
//!
//! [`ProcessSpawner`] is the seam between the engine and the OS: it turns a
//! [`LaunchSpec`] into a running [`ProcessHandle`]. Production code uses
//! [`TokioSpawner`]; tests substitute wrappers to observe spawns.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Everything needed to start one child process.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    /// Program to execute (name resolved through `PATH`, or a path).
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Complete child environment. Nothing is inherited from the host.
    pub env: Vec<(String, String)>,
    pub working_directory: Option<PathBuf>,
}

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
}

/// Starts child processes.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, spec: &LaunchSpec) -> io::Result<ProcessHandle>;
}

/// Spawner backed by [`tokio::process::Command`].
///
/// Children get piped stdout/stderr, a null stdin, and (on Unix) their own
/// process group so that a timeout kill reaches every descendant.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, spec: &LaunchSpec) -> io::Result<ProcessHandle> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .env_clear()
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.working_directory {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        Ok(ProcessHandle::new(child))
    }
}

/// A running child process.
///
/// Dropping a handle whose child has not been reaped kills the child's
/// whole process group, so an abandoned invocation leaves nothing behind.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    /// Captured at spawn time; `Child::id` returns `None` once reaped.
    pid: Option<u32>,
    reaped: bool,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            reaped: false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the process to exit, giving up after `timeout`.
    ///
    /// A timed-out process is left running; call [`kill`](Self::kill).
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> io::Result<WaitOutcome> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.reaped = true;
                Ok(WaitOutcome::Exited(status))
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Ok(WaitOutcome::TimedOut),
        }
    }

    /// Forcibly terminate the process and its process group, then reap it.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.kill_group();
        self.child.kill().await?;
        self.reaped = true;
        Ok(())
    }

    /// Send `SIGKILL` to the child's process group without waiting.
    ///
    /// Reaches descendants that outlive the child itself. No-op off Unix.
    pub fn kill_group(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill_group();
        }
    }
}

/// Send `SIGKILL` to the process group led by `pid`.
#[cfg(unix)]
pub(crate) fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // Safety: kill(2) has no memory-safety preconditions. The child was
    // spawned with `process_group(0)`, so its pid is also its group id.
    let ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if ret != 0 {
        tracing::debug!(
            pid,
            error = %io::Error::last_os_error(),
            "Process group kill failed",
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> LaunchSpec {
        LaunchSpec {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            env: vec![(
                "PATH".to_string(),
                std::env::var("PATH").unwrap_or_default(),
            )],
            working_directory: None,
        }
    }

    #[tokio::test]
    async fn wait_reports_exit_status() {
        let mut handle = TokioSpawner.spawn(&sh("exit 3")).expect("spawn");
        let outcome = handle
            .wait_with_timeout(Duration::from_secs(5))
            .await
            .expect("wait");
        match outcome {
            WaitOutcome::Exited(status) => assert_eq!(status.code(), Some(3)),
            WaitOutcome::TimedOut => panic!("should not time out"),
        }
    }

    #[tokio::test]
    async fn wait_times_out_then_kill_reaps() {
        let mut handle = TokioSpawner.spawn(&sh("sleep 30")).expect("spawn");
        assert!(handle.pid().is_some());
        let outcome = handle
            .wait_with_timeout(Duration::from_millis(100))
            .await
            .expect("wait");
        assert_eq!(outcome, WaitOutcome::TimedOut);
        handle.kill().await.expect("kill");
    }

    #[tokio::test]
    async fn dropping_unreaped_handle_kills_group() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("bg.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());
        let handle = TokioSpawner.spawn(&sh(&script)).expect("spawn");

        let pid = wait_for_pid_file(&pid_file).await;
        drop(handle);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        // Signal 0 still succeeds on a zombie, so only procfs is trusted here.
        while std::path::Path::new(&format!("/proc/{pid}")).exists()
            && !is_zombie(pid)
            && std::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(
            !std::path::Path::new(&format!("/proc/{pid}")).exists() || is_zombie(pid),
            "background process {pid} survived handle drop",
        );
    }

    async fn wait_for_pid_file(path: &std::path::Path) -> u32 {
        for _ in 0..100 {
            if let Ok(text) = std::fs::read_to_string(path) {
                if let Ok(pid) = text.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("pid file never written");
    }

    fn is_zombie(pid: u32) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                stat.rsplit_once(')')
                    .map(|(_, rest)| rest.trim_start().starts_with('Z'))
            })
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn environment_is_not_inherited() {
        std::env::set_var("TRADESIGNAL_SPAWN_TEST_SECRET", "leaked");
        let mut handle = TokioSpawner
            .spawn(&sh("test -z \"$TRADESIGNAL_SPAWN_TEST_SECRET\""))
            .expect("spawn");
        let outcome = handle
            .wait_with_timeout(Duration::from_secs(5))
            .await
            .expect("wait");
        match outcome {
            WaitOutcome::Exited(status) => assert!(status.success(), "secret leaked into child"),
            WaitOutcome::TimedOut => panic!("should not time out"),
        }
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let _guard = rt.enter();
        let spec = LaunchSpec {
            program: "/nonexistent/interpreter".into(),
            ..LaunchSpec::default()
        };
        let err = TokioSpawner.spawn(&spec).expect_err("spawn should fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
