//! Target that runs an external database bridge per statement.

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

use crate::error::ApplyError;
use crate::statement::Statement;
use crate::target::Target;

/// Default bridge program.
pub const DEFAULT_PROGRAM: &str = "manus-mcp-cli";

/// Default arguments placed before the JSON payload.
pub const DEFAULT_ARGS: [&str; 6] = [
    "tool",
    "call",
    "execute_sql",
    "--server",
    "supabase",
    "--input",
];

#[derive(Serialize)]
struct Payload<'a> {
    project_id: &'a str,
    query: &'a str,
}

/// Sends each statement to a command-line bridge.
///
/// The bridge is invoked as `program args... <payload>` where the payload is
/// `{"project_id": ..., "query": ...}`. A zero exit status is success;
/// otherwise stderr is classified with [`ApplyError::classify`].
#[derive(Debug, Clone)]
pub struct CommandTarget {
    program: String,
    args: Vec<String>,
    project_id: String,
}

impl CommandTarget {
    /// A bridge using the default program and arguments.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(ToString::to_string).collect(),
            project_id: project_id.into(),
        }
    }

    /// Overrides the program.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Overrides the arguments placed before the payload.
    pub fn with_args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// JSON payload for `query`.
    pub fn payload(&self, query: &str) -> Result<String, ApplyError> {
        serde_json::to_string(&Payload {
            project_id: &self.project_id,
            query,
        })
        .map_err(|e| ApplyError::permanent(format!("cannot encode payload: {e}")))
    }
}

#[async_trait]
impl Target for CommandTarget {
    async fn apply(&self, statement: &Statement) -> Result<(), ApplyError> {
        let payload = self.payload(&statement.to_sql())?;
        log::debug!("Running {} for {}", self.program, statement.name());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(payload)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ApplyError::permanent(format!("cannot run {}: {e}", self.program))
                }
                _ => ApplyError::transient(format!("cannot run {}: {e}", self.program)),
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.trim().is_empty() {
            return Err(ApplyError::permanent(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        Err(ApplyError::classify(&stderr))
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use warden_core::{Policy, Predicate, ResourceType};

    fn statement() -> Statement {
        Policy::select("Badges viewable", ResourceType::Badge)
            .using(Predicate::tenant())
            .into()
    }

    /// A bridge that runs `script` through `sh -c`, with the payload as `$1`.
    fn shell(script: &str) -> CommandTarget {
        CommandTarget::new("proj-1")
            .with_program("sh")
            .with_args(["-c", script, "bridge"])
    }

    #[test]
    fn test_payload_shape() {
        let target = CommandTarget::new("proj-1");
        let payload = target.payload("SELECT 'a' AS \"b\"").unwrap();
        assert_eq!(
            payload,
            r#"{"project_id":"proj-1","query":"SELECT 'a' AS \"b\""}"#
        );
    }

    #[test]
    fn test_defaults() {
        let target = CommandTarget::new("p");
        assert_eq!(target.name(), "manus-mcp-cli");
        assert_eq!(target.args.last().map(String::as_str), Some("--input"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_receives_payload() {
        let target = shell(r#"case "$1" in *'"project_id":"proj-1"'*) exit 0;; *) exit 3;; esac"#);
        assert!(target.apply(&statement()).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_is_classified() {
        let exists = shell(r#"echo 'policy "Badges viewable" already exists' >&2; exit 1"#);
        assert!(exists.apply(&statement()).await.unwrap_err().is_already_exists());

        let flaky = shell("echo 'connection refused' >&2; exit 1");
        assert!(flaky.apply(&statement()).await.unwrap_err().is_retryable());

        let silent = shell("exit 4");
        let err = silent.apply(&statement()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(!err.is_already_exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_permanent() {
        let target = CommandTarget::new("p").with_program("warden-no-such-bridge");
        let err = target.apply(&statement()).await.unwrap_err();
        assert!(matches!(err, ApplyError::Permanent(_)));
    }
}
