//! Python interpreter specifics: invocation shape, child environment, and
//! the availability probe.

use std::path::Path;
use std::time::Duration;

use super::spawn::{LaunchSpec, ProcessSpawner, TokioSpawner, WaitOutcome};

/// Fixed timeout for the `--version` probe, independent of script timeouts.
pub const INTERPRETER_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Host variables passed through to scripts. Everything else is dropped.
const PASSTHROUGH_ENV: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "TMPDIR", "SYSTEMROOT"];

/// Variable pointing scripts at the provisioned auxiliary data.
pub const DATA_DIR_ENV: &str = "TRADESIGNAL_DATA_DIR";

/// Build the launch spec `[interpreter, script_path, json_args]`.
pub fn script_launch_spec(
    interpreter: &str,
    script_path: &Path,
    json_args: String,
    env: Vec<(String, String)>,
    working_directory: &Path,
) -> LaunchSpec {
    LaunchSpec {
        program: interpreter.into(),
        args: vec![script_path.into(), json_args.into()],
        env,
        working_directory: Some(working_directory.to_path_buf()),
    }
}

/// Child environment for scripts provisioned under `scripts_dir`.
///
/// `PYTHONPATH` lets scripts import their siblings; the data directory is
/// exported so scripts need not guess where auxiliary files live.
pub fn script_environment(scripts_dir: &Path, data_dir: &Path) -> Vec<(String, String)> {
    let mut env = passthrough_env();
    env.push((
        "PYTHONPATH".to_string(),
        scripts_dir.to_string_lossy().into_owned(),
    ));
    env.push(("PYTHONUNBUFFERED".to_string(), "1".to_string()));
    env.push((
        DATA_DIR_ENV.to_string(),
        data_dir.to_string_lossy().into_owned(),
    ));
    env
}

fn passthrough_env() -> Vec<(String, String)> {
    PASSTHROUGH_ENV
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
        .collect()
}

/// Whether `interpreter --version` exits successfully within
/// [`INTERPRETER_CHECK_TIMEOUT`]. Never errors.
pub async fn is_interpreter_available(interpreter: &str) -> bool {
    is_interpreter_available_with(&TokioSpawner, interpreter).await
}

pub(crate) async fn is_interpreter_available_with(
    spawner: &dyn ProcessSpawner,
    interpreter: &str,
) -> bool {
    let spec = LaunchSpec {
        program: interpreter.into(),
        args: vec!["--version".into()],
        env: passthrough_env(),
        working_directory: None,
    };

    let mut handle = match spawner.spawn(&spec) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(interpreter, error = %e, "Interpreter not available");
            return false;
        }
    };

    match handle.wait_with_timeout(INTERPRETER_CHECK_TIMEOUT).await {
        Ok(WaitOutcome::Exited(status)) => {
            if !status.success() {
                tracing::warn!(interpreter, exit_code = ?status.code(), "Interpreter version check failed");
            }
            status.success()
        }
        Ok(WaitOutcome::TimedOut) => {
            tracing::warn!(interpreter, "Interpreter version check timed out");
            let _ = handle.kill().await;
            false
        }
        Err(e) => {
            tracing::warn!(interpreter, error = %e, "Interpreter version check failed");
            let _ = handle.kill().await;
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
