//! Configuration for the Warden CLI.
//!
//! Loads [`WardenConfig`] from TOML files, environment variables, and
//! defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `WARDEN_CONFIG` environment variable
//! 3. XDG default: `~/.config/warden/config.toml`
//! 4. Built-in defaults
//!
//! `WARDEN_<SECTION>_<KEY>` environment variables override file values.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use confyg::{Confygery, env};
use serde::{Deserialize, Serialize};
use warden_core::{Error, Result};
use warden_deploy::command::{DEFAULT_ARGS, DEFAULT_PROGRAM};
use warden_deploy::{CommandTarget, DryRunTarget, EngineOptions, RetryTarget, Target};

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Where statements are sent.
    pub target: TargetConfig,

    /// Engine and retry tuning.
    pub deploy: DeployConfig,
}

/// Database bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Target project identifier sent with every statement.
    pub project_id: String,

    /// Bridge executable.
    pub program: String,

    /// Arguments placed before the JSON payload.
    pub args: Vec<String>,
}

/// Deployment tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Per-rule timeout in seconds.
    #[serde(deserialize_with = "lenient::deserialize")]
    pub timeout_secs: u64,

    /// Characters of error text kept per failed rule.
    #[serde(deserialize_with = "lenient::deserialize")]
    pub max_error_len: usize,

    /// Attempts per rule for transient failures; 1 disables retries.
    #[serde(deserialize_with = "lenient::deserialize")]
    pub retry_attempts: u32,

    /// First backoff delay in milliseconds.
    #[serde(deserialize_with = "lenient::deserialize")]
    pub retry_initial_delay_ms: u64,

    /// Backoff cap in milliseconds.
    #[serde(deserialize_with = "lenient::deserialize")]
    pub retry_max_delay_ms: u64,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_error_len: 200,
            retry_attempts: 3,
            retry_initial_delay_ms: 500,
            retry_max_delay_ms: 10_000,
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl WardenConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level("WARDEN");
        env_opts.add_section("target");
        env_opts.add_section("deploy");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("WARDEN_CONFIG") {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("warden").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into `WARDEN_*` environment variable pairs.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value = toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, "WARDEN", &mut vars);
        Ok(vars)
    }

    /// Engine settings derived from `[deploy]`.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            timeout: Duration::from_secs(self.deploy.timeout_secs),
            max_error_len: self.deploy.max_error_len,
        }
    }

    /// Builds the target a deployment sends statements to.
    ///
    /// Dry runs need no project; real runs fail with a configuration error
    /// when none is set. Transient failures are retried unless
    /// `retry_attempts` is 1 or `retry` is false.
    pub fn build_target(&self, dry_run: bool, retry: bool) -> Result<Arc<dyn Target>> {
        if dry_run {
            return Ok(Arc::new(DryRunTarget::new()));
        }
        if self.target.project_id.trim().is_empty() {
            return Err(Error::config(
                "target.project_id is not set (use --project-id, WARDEN_TARGET_PROJECT_ID or the config file)",
            ));
        }

        let command: Arc<dyn Target> = Arc::new(
            CommandTarget::new(&self.target.project_id)
                .with_program(&self.target.program)
                .with_args(&self.target.args),
        );
        if !retry || self.deploy.retry_attempts <= 1 {
            return Ok(command);
        }
        Ok(Arc::new(
            RetryTarget::new(command)
                .with_max_attempts(self.deploy.retry_attempts)
                .with_initial_delay(Duration::from_millis(self.deploy.retry_initial_delay_ms))
                .with_max_delay(Duration::from_millis(self.deploy.retry_max_delay_ms)),
        ))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Numbers that may arrive as strings from the environment layer.
mod lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText<T> {
        Number(T),
        Text(String),
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match NumberOrText::<T>::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s.trim().parse().map_err(D::Error::custom),
        }
    }
}

/// Recursively flatten a TOML value into `KEY=value` pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                flatten_toml_value(val, &format!("{prefix}_{}", key.to_uppercase()), out);
            }
        }
        toml::Value::Array(items) => {
            if let Ok(json) = serde_json::to_string(items) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// RAII guard for env var manipulation in tests.
    struct EnvGuard {
        key: String,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn new(key: &str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: test-only; each guarded key is touched by a single test.
            unsafe { std::env::set_var(key, value) };
            Self {
                key: key.to_string(),
                prev,
            }
        }

        fn remove(key: &str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: as above.
            unsafe { std::env::remove_var(key) };
            Self {
                key: key.to_string(),
                prev,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: as above.
            unsafe {
                match &self.prev {
                    Some(val) => std::env::set_var(&self.key, val),
                    None => std::env::remove_var(&self.key),
                }
            }
        }
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    // ------------------------------------------------------------------------
    // Defaults and serialization
    // ------------------------------------------------------------------------

    #[test]
    fn test_defaults() {
        let config = WardenConfig::default();
        assert!(config.target.project_id.is_empty());
        assert_eq!(config.target.program, "manus-mcp-cli");
        assert_eq!(config.deploy.timeout_secs, 30);
        assert_eq!(config.deploy.max_error_len, 200);
        assert_eq!(config.deploy.retry_attempts, 3);
    }

    #[test]
    fn test_from_toml() {
        let config: WardenConfig = toml::from_str(
            r#"
                [target]
                project_id = "abc123"
                program = "/usr/local/bin/bridge"
                args = ["exec"]

                [deploy]
                timeout_secs = 10
                retry_attempts = "1"
            "#,
        )
        .unwrap();
        assert_eq!(config.target.project_id, "abc123");
        assert_eq!(config.target.args, vec!["exec"]);
        assert_eq!(config.deploy.timeout_secs, 10);
        assert_eq!(config.deploy.retry_attempts, 1);
        assert_eq!(config.deploy.max_error_len, 200);
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = WardenConfig::default().to_toml_string().unwrap();
        assert!(toml_str.contains("[target]"));
        assert!(toml_str.contains("timeout_secs = 30"));
        let parsed: WardenConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.deploy.retry_max_delay_ms, 10_000);
    }

    #[test]
    fn test_to_env_vars() {
        let vars: HashMap<_, _> = WardenConfig::default().to_env_vars().unwrap().into_iter().collect();
        assert_eq!(vars.get("WARDEN_DEPLOY_TIMEOUT_SECS").unwrap(), "30");
        assert_eq!(vars.get("WARDEN_TARGET_PROGRAM").unwrap(), "manus-mcp-cli");
        assert!(vars.get("WARDEN_TARGET_ARGS").unwrap().starts_with("[\"tool\""));
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    #[test]
    fn test_load_from_file() {
        let (_dir, path) = write_config(
            r#"
                [target]
                args = ["exec", "--sql"]
                [deploy]
                timeout_secs = 12
            "#,
        );
        let config = WardenConfig::load(Some(&path)).unwrap();
        assert_eq!(config.target.args, vec!["exec", "--sql"]);
        assert_eq!(config.deploy.timeout_secs, 12);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = WardenConfig::load(Some("/nonexistent/warden.toml")).unwrap();
        assert_eq!(config.deploy.timeout_secs, 30);
    }

    #[test]
    fn test_load_env_overlay() {
        let (_dir, path) = write_config(
            r#"
                [target]
                program = "bridge-from-file"
            "#,
        );
        let _guard = EnvGuard::new("WARDEN_TARGET_PROGRAM", "bridge-from-env");
        let config = WardenConfig::load(Some(&path)).unwrap();
        assert_eq!(config.target.program, "bridge-from-env");
    }

    #[test]
    fn test_load_project_id_from_env() {
        let _guard = EnvGuard::new("WARDEN_TARGET_PROJECT_ID", "from-env");
        let config = WardenConfig::load(Some("/nonexistent/warden.toml")).unwrap();
        assert_eq!(config.target.project_id, "from-env");
        assert!(config.build_target(false, false).is_ok());
    }

    #[test]
    fn test_resolve_config_path() {
        assert_eq!(
            WardenConfig::resolve_config_path(Some("/explicit.toml")),
            Some(PathBuf::from("/explicit.toml"))
        );

        let _guard = EnvGuard::remove("WARDEN_CONFIG");
        let path = WardenConfig::resolve_config_path(None).unwrap();
        assert!(path.ends_with("warden/config.toml"));
    }

    // ------------------------------------------------------------------------
    // Target construction
    // ------------------------------------------------------------------------

    #[test]
    fn test_build_target() {
        let mut config = WardenConfig::default();
        assert!(config.build_target(true, true).is_ok());
        assert!(matches!(config.build_target(false, true), Err(Error::Config(_))));

        config.target.project_id = "p".into();
        assert_eq!(config.build_target(false, false).unwrap().name(), "manus-mcp-cli");
        assert_eq!(config.build_target(false, true).unwrap().name(), "manus-mcp-cli");
        assert_eq!(config.build_target(true, true).unwrap().name(), "dry-run");
    }

    #[test]
    fn test_engine_options() {
        let mut config = WardenConfig::default();
        config.deploy.timeout_secs = 7;
        config.deploy.max_error_len = 80;
        let options = config.engine_options();
        assert_eq!(options.timeout, Duration::from_secs(7));
        assert_eq!(options.max_error_len, 80);
    }
}
