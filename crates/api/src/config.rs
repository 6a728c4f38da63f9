use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tradesignal_core::scripting::settings::{
    ScriptSettings, DEFAULT_INTERPRETER, DEFAULT_TIMEOUT_SECS,
};

/// Headroom between the script timeout and the derived HTTP timeout.
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 10;

/// Invalid value in the environment.
#[derive(Debug, thiserror::Error)]
#[error("{key} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub key: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`, or the script timeout
    /// plus 10 when that is larger). Always above the script timeout so
    /// script timeouts surface as 504 with a JSON body.
    pub request_timeout_secs: u64,
    /// Interpreter, script timeout, bundle location and scratch directory.
    pub scripts: ScriptSettings,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8080`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `max(60, script + 10)`     |
    /// | `PYTHON_INTERPRETER`   | `python3`                  |
    /// | `PYTHON_SCRIPTS_PATH`  | unset (embedded scripts)   |
    /// | `PYTHON_TIMEOUT_SECS`  | `30`                       |
    /// | `SCRATCH_DIR`          | unset (temporary dir)      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse(&var, "PORT", "a valid u16", 8080)?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let interpreter = var("PYTHON_INTERPRETER").unwrap_or_else(|| DEFAULT_INTERPRETER.into());
        let timeout_secs: u64 = parse(
            &var,
            "PYTHON_TIMEOUT_SECS",
            "a positive number of seconds",
            DEFAULT_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError {
                key: "PYTHON_TIMEOUT_SECS",
                expected: "a positive number of seconds",
                value: "0".into(),
            });
        }

        let derived = timeout_secs
            .saturating_add(REQUEST_TIMEOUT_MARGIN_SECS)
            .max(60);
        let request_timeout_secs: u64 = parse(
            &var,
            "REQUEST_TIMEOUT_SECS",
            "a valid u64",
            derived,
        )?;
        if request_timeout_secs <= timeout_secs {
            return Err(ConfigError {
                key: "REQUEST_TIMEOUT_SECS",
                expected: "greater than PYTHON_TIMEOUT_SECS",
                value: request_timeout_secs.to_string(),
            });
        }

        let scripts = ScriptSettings {
            interpreter,
            timeout: Duration::from_secs(timeout_secs),
            scripts_path: var("PYTHON_SCRIPTS_PATH").map(PathBuf::from),
            scratch_dir: var("SCRATCH_DIR").map(PathBuf::from),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            scripts,
        })
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
            key,
            expected,
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.scripts, ScriptSettings::default());
    }

    #[test]
    fn script_settings_come_from_environment() {
        let config = config_from(&[
            ("PYTHON_INTERPRETER", "/usr/bin/python3.12"),
            ("PYTHON_TIMEOUT_SECS", "12"),
            ("PYTHON_SCRIPTS_PATH", "/opt/scripts"),
            ("SCRATCH_DIR", "/var/tmp/tradesignal"),
        ])
        .unwrap();
        assert_eq!(config.scripts.interpreter, "/usr/bin/python3.12");
        assert_eq!(config.scripts.timeout, Duration::from_secs(12));
        assert_eq!(config.scripts.scripts_path, Some(PathBuf::from("/opt/scripts")));
        assert_eq!(
            config.scripts.scratch_dir,
            Some(PathBuf::from("/var/tmp/tradesignal"))
        );
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config =
            config_from(&[("CORS_ORIGINS", "http://a.test, http://b.test ,,")]).unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert_matches!(
            config_from(&[("PORT", "eighty")]),
            Err(ConfigError { key: "PORT", .. })
        );
        assert_matches!(
            config_from(&[("PYTHON_TIMEOUT_SECS", "0")]),
            Err(ConfigError { key: "PYTHON_TIMEOUT_SECS", .. })
        );
    }

    #[test]
    fn request_timeout_follows_long_script_timeout() {
        let config = config_from(&[("PYTHON_TIMEOUT_SECS", "120")]).unwrap();
        assert_eq!(config.request_timeout_secs, 130);
        assert!(Duration::from_secs(config.request_timeout_secs) > config.scripts.timeout);
    }

    #[test]
    fn request_timeout_must_exceed_script_timeout() {
        assert_matches!(
            config_from(&[("PYTHON_TIMEOUT_SECS", "120"), ("REQUEST_TIMEOUT_SECS", "60")]),
            Err(ConfigError { key: "REQUEST_TIMEOUT_SECS", .. })
        );
        assert_matches!(
            config_from(&[("PYTHON_TIMEOUT_SECS", "30"), ("REQUEST_TIMEOUT_SECS", "30")]),
            Err(ConfigError { key: "REQUEST_TIMEOUT_SECS", value, .. }) if value == "30"
        );

        let config = config_from(&[("REQUEST_TIMEOUT_SECS", "45")]).unwrap();
        assert_eq!(config.request_timeout_secs, 45);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("PYTHON_INTERPRETER", "  "), ("PORT", "")]).unwrap();
        assert_eq!(config.scripts.interpreter, DEFAULT_INTERPRETER);
        assert_eq!(config.port, 8080);
    }
}
