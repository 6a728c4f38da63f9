//! Analysis script orchestration.
//!
//! Scripts are bundled with the application, provisioned into a scratch
//! directory at startup ([`provision`]), and executed one child process per
//! request by the [`engine::ScriptEngine`]. Nothing in here interprets the
//! analysis results; scripts are opaque programs that take a JSON argument
//! and print a JSON object.

pub mod bundle;
pub mod engine;
pub mod executor;
pub mod provision;
pub mod python;
pub mod registry;
pub mod settings;
pub mod spawn;
pub mod status;
pub mod subprocess;

/// Shared test helpers for engine and provisioning tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use super::engine::ScriptEngine;
    use super::provision::{ScriptPaths, SCRIPTS_SUBDIR};
    use super::registry::script_file_name;

    /// Interpreter used by tests. Scripts are written as POSIX shell so the
    /// suite does not depend on a Python installation.
    pub const TEST_INTERPRETER: &str = "sh";

    /// Write `body` as the script `script_id` under `root/python-scripts`
    /// and return its path.
    pub fn write_script(root: &Path, script_id: &str, body: &str) -> PathBuf {
        let dir = root.join(SCRIPTS_SUBDIR);
        std::fs::create_dir_all(&dir).expect("create scripts dir");
        let path = dir.join(script_file_name(script_id));
        std::fs::write(&path, body).expect("write script");
        path
    }

    /// Build an engine over a scratch root where every `(id, body)` pair has
    /// been written as a script.
    pub fn engine_with_scripts(root: &Path, scripts: &[(&str, &str)]) -> ScriptEngine {
        let mut paths = ScriptPaths::new(root);
        for (id, body) in scripts {
            let path = write_script(root, id, body);
            paths.insert(id, path);
        }
        ScriptEngine::new(TEST_INTERPRETER, Arc::new(paths), Duration::from_secs(5))
    }
}
