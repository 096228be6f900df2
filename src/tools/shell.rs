//! Shell command tool for Parley
//!
//! Runs a command through the platform shell with the workspace as the
//! working directory. Output is truncated to keep tool results bounded.
//! Hung commands are covered by the registry's per-invocation timeout.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ParleyError, Result};

use super::{ParamKind, ParamSpec, Tool, ToolContext, ToolSpec};

/// Maximum bytes of combined output returned to the model.
const MAX_OUTPUT_BYTES: usize = 16 * 1024;

/// Tool for executing shell commands in the workspace.
pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "shell",
            "Execute a shell command in the workspace and return its output",
            vec![ParamSpec::required(
                "command",
                ParamKind::String,
                "The command line to execute",
            )],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let command = args["command"].as_str().unwrap_or_default();
        if command.trim().is_empty() {
            return Err(ParleyError::Tool("empty command".to_string()));
        }

        debug!(command, "Running shell command");

        #[cfg(target_os = "windows")]
        let mut cmd = {
            let mut c = tokio::process::Command::new("cmd");
            c.args(["/C", command]);
            c
        };
        #[cfg(not(target_os = "windows"))]
        let mut cmd = {
            let mut c = tokio::process::Command::new("sh");
            c.args(["-c", command]);
            c
        };

        if let Some(workspace) = &ctx.workspace {
            cmd.current_dir(workspace);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| ParleyError::Tool(format!("Failed to run command: {}", e)))?;

        let mut combined = String::new();
        combined.push_str(&String::from_utf8_lossy(&output.stdout));
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str("stderr: ");
            combined.push_str(&stderr);
        }

        if combined.len() > MAX_OUTPUT_BYTES {
            combined.truncate(MAX_OUTPUT_BYTES);
            while !combined.is_char_boundary(combined.len()) {
                combined.pop();
            }
            combined.push_str("\n...[output truncated]");
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(ParleyError::Tool(format!(
                "command exited with status {}: {}",
                code,
                combined.trim_end()
            )));
        }

        Ok(Value::String(combined))
    }
}

#[cfg(test)]
#[cfg(not(target_os = "windows"))]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_shell_echo() {
        let result = ShellTool
            .execute(json!({"command": "echo hello"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(result.as_str().unwrap().trim(), "hello");
    }

    #[tokio::test]
    async fn test_shell_runs_in_workspace() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let ctx = ToolContext::new().with_workspace(&dir.path().to_string_lossy());

        let result = ShellTool
            .execute(json!({"command": "ls"}), &ctx)
            .await
            .unwrap();
        assert!(result.as_str().unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_shell_nonzero_exit_is_tool_error() {
        let err = ShellTool
            .execute(json!({"command": "exit 3"}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status 3"));
    }

    #[tokio::test]
    async fn test_shell_captures_stderr() {
        let err = ShellTool
            .execute(json!({"command": "echo oops >&2; exit 1"}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("oops"));
    }

    #[tokio::test]
    async fn test_shell_empty_command_rejected() {
        let err = ShellTool
            .execute(json!({"command": "  "}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty command"));
    }
}
