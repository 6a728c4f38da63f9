//! Script execution settings supplied by the host configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default interpreter executable, resolved through `PATH`.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Default per-invocation timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings consumed by provisioning and the execution engine.
///
/// All fields are externally supplied; [`Default`] gives the values used
/// when the host configuration leaves them unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSettings {
    /// Interpreter executable name or path.
    pub interpreter: String,
    /// Maximum wall-clock time for one script invocation.
    pub timeout: Duration,
    /// Base location of an on-disk script registry. When `None` the scripts
    /// compiled into the binary are provisioned instead.
    pub scripts_path: Option<PathBuf>,
    /// Fixed scratch directory. When `None` a fresh temporary directory is
    /// created for the lifetime of the process.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            scripts_path: None,
            scratch_dir: None,
        }
    }
}
