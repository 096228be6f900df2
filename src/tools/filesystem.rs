//! Filesystem tools for Parley
//!
//! Read, write, list, and find files. All paths resolve relative to the
//! workspace in the tool context; parent-directory traversal is rejected.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ParleyError, Result};

use super::{ParamKind, ParamSpec, Tool, ToolContext, ToolSpec};

/// Resolve a path against the context workspace.
///
/// Requires a workspace to be configured and rejects `..` components so a
/// hallucinated path cannot escape it.
fn resolve_path(path: &str, ctx: &ToolContext) -> Result<PathBuf> {
    let workspace = ctx.workspace.as_ref().ok_or_else(|| {
        ParleyError::Tool("workspace not configured; filesystem tools require one".to_string())
    })?;

    let candidate = Path::new(path);
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ParleyError::Tool(format!(
            "path '{}' must not contain '..'",
            path
        )));
    }

    if candidate.is_absolute() {
        if !candidate.starts_with(workspace) {
            return Err(ParleyError::Tool(format!(
                "path '{}' is outside the workspace",
                path
            )));
        }
        return Ok(candidate.to_path_buf());
    }

    Ok(Path::new(workspace).join(candidate))
}

/// Tool for reading file contents.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "read_file",
            "Read the contents of a file at the specified path",
            vec![ParamSpec::required(
                "path",
                ParamKind::String,
                "The path to the file to read, relative to the workspace",
            )],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let path = args["path"].as_str().unwrap_or_default();
        let full_path = resolve_path(path, ctx)?;

        let content = tokio::fs::read_to_string(&full_path).await.map_err(|e| {
            ParleyError::Tool(format!("Failed to read '{}': {}", full_path.display(), e))
        })?;
        Ok(Value::String(content))
    }
}

/// Tool for writing content to a file, creating parent directories as needed.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "write_file",
            "Write content to a file at the specified path, creating it if necessary",
            vec![
                ParamSpec::required(
                    "path",
                    ParamKind::String,
                    "The path to the file to write, relative to the workspace",
                ),
                ParamSpec::required(
                    "content",
                    ParamKind::String,
                    "The content to write to the file",
                ),
            ],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let path = args["path"].as_str().unwrap_or_default();
        let content = args["content"].as_str().unwrap_or_default();
        let full_path = resolve_path(path, ctx)?;

        if let Some(parent) = full_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ParleyError::Tool(format!("Failed to create parent directories: {}", e))
                })?;
            }
        }

        tokio::fs::write(&full_path, content).await.map_err(|e| {
            ParleyError::Tool(format!("Failed to write '{}': {}", full_path.display(), e))
        })?;

        Ok(Value::String(format!(
            "Wrote {} bytes to {}",
            content.len(),
            full_path.display()
        )))
    }
}

/// Tool for listing directory contents.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "list_dir",
            "List the files and directories at the specified path",
            vec![ParamSpec::optional(
                "path",
                ParamKind::String,
                "The directory to list, relative to the workspace (default: workspace root)",
            )],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let path = args["path"].as_str().unwrap_or(".");
        let full_path = resolve_path(path, ctx)?;

        let mut entries = tokio::fs::read_dir(&full_path).await.map_err(|e| {
            ParleyError::Tool(format!("Failed to list '{}': {}", full_path.display(), e))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ParleyError::Tool(format!("Failed to list '{}': {}", full_path.display(), e))
        })? {
            let file_type = entry.file_type().await;
            let name = entry.file_name().to_string_lossy().to_string();
            let suffix = match file_type {
                Ok(t) if t.is_dir() => "/",
                _ => "",
            };
            names.push(format!("{}{}", name, suffix));
        }
        names.sort();

        Ok(json!(names))
    }
}

/// Tool for finding files matching a glob pattern.
pub struct FindFilesTool;

#[async_trait]
impl Tool for FindFilesTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "find_files",
            "Find files under the workspace matching a glob pattern (e.g. '**/*.rs')",
            vec![ParamSpec::required(
                "pattern",
                ParamKind::String,
                "Glob pattern relative to the workspace",
            )],
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let pattern = args["pattern"].as_str().unwrap_or_default();
        // Anchor the pattern itself; resolve_path also rejects '..'
        let anchored = resolve_path(pattern, ctx)?;
        let anchored = anchored.to_string_lossy().to_string();

        // Glob iteration is synchronous; run it off the async executor.
        let matches = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let paths = glob::glob(&anchored)
                .map_err(|e| ParleyError::Tool(format!("Invalid glob pattern: {}", e)))?;
            let mut found = Vec::new();
            for entry in paths.flatten() {
                found.push(entry.to_string_lossy().to_string());
            }
            found.sort();
            Ok(found)
        })
        .await
        .map_err(|e| ParleyError::Tool(format!("find task failed: {}", e)))??;

        Ok(json!(matches))
    }
}
