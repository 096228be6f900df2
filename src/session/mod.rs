//! Session module - session runtimes and their persistence
//!
//! This module provides the per-session state bundle (`SessionRuntime`) and a
//! store for persisting runtimes by session id. Persistence is deliberately
//! outside the agent core: the core only requires that `update_runtime` be
//! handed a runtime, wherever it came from.
//!
//! # Example
//!
//! ```
//! use parley::session::{SessionStore, SessionRuntime, Message};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SessionStore::new_memory();
//!
//!     let mut runtime = store.get_or_create("cli:main").await.unwrap();
//!     runtime.history.push(Message::user("Hello!"));
//!     store.save(&runtime).await.unwrap();
//! }
//! ```

pub mod types;

pub use types::{Message, Role, SessionRuntime, ToolCall, DEFAULT_SYSTEM_PROMPT};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::config::Config;
use crate::error::Result;

/// Store for persisting and retrieving session runtimes.
///
/// The store keeps an in-memory map of runtimes and, when configured with a
/// storage path, mirrors each runtime to a JSON file named after the
/// (percent-encoded) session id. Cloning shares the underlying map.
pub struct SessionStore {
    /// In-memory cache of runtimes
    runtimes: Arc<RwLock<HashMap<String, SessionRuntime>>>,
    /// Optional directory for file-based persistence
    storage_path: Option<PathBuf>,
}

impl SessionStore {
    /// Create a session store persisting to the default directory
    /// (`~/.parley/sessions`).
    ///
    /// # Errors
    /// Returns an error if the sessions directory cannot be created.
    pub fn new() -> Result<Self> {
        let storage_path = Config::dir().join("sessions");
        std::fs::create_dir_all(&storage_path)?;
        Ok(Self {
            runtimes: Arc::new(RwLock::new(HashMap::new())),
            storage_path: Some(storage_path),
        })
    }

    /// Create an in-memory store without persistence.
    ///
    /// Useful for tests and for sessions that should not survive restarts.
    pub fn new_memory() -> Self {
        Self {
            runtimes: Arc::new(RwLock::new(HashMap::new())),
            storage_path: None,
        }
    }

    /// Create a store persisting to a custom directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn with_path(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            runtimes: Arc::new(RwLock::new(HashMap::new())),
            storage_path: Some(path),
        })
    }

    /// Load a runtime by session id without creating it.
    ///
    /// Checks the in-memory map first, then disk when persistence is enabled.
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionRuntime>> {
        {
            let runtimes = self.runtimes.read().await;
            if let Some(runtime) = runtimes.get(session_id) {
                return Ok(Some(runtime.clone()));
            }
        }

        if let Some(ref storage_path) = self.storage_path {
            let file_path = storage_path.join(format!("{}.json", sanitize_id(session_id)));
            if file_path.exists() {
                let content = tokio::fs::read_to_string(&file_path).await?;
                let runtime: SessionRuntime = serde_json::from_str(&content)?;

                let mut runtimes = self.runtimes.write().await;
                runtimes.insert(session_id.to_string(), runtime.clone());
                return Ok(Some(runtime));
            }
        }

        Ok(None)
    }

    /// Load an existing runtime or create a fresh one for the id.
    ///
    /// # Example
    /// ```
    /// use parley::session::SessionStore;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let store = SessionStore::new_memory();
    ///     let runtime = store.get_or_create("cli:main").await.unwrap();
    ///     assert_eq!(runtime.session_id, "cli:main");
    /// }
    /// ```
    pub async fn get_or_create(&self, session_id: &str) -> Result<SessionRuntime> {
        if let Some(runtime) = self.load(session_id).await? {
            return Ok(runtime);
        }

        let runtime = SessionRuntime::new(session_id);
        let mut runtimes = self.runtimes.write().await;
        runtimes.insert(session_id.to_string(), runtime.clone());
        Ok(runtime)
    }

    /// Save a runtime to memory and, when enabled, to disk.
    pub async fn save(&self, runtime: &SessionRuntime) -> Result<()> {
        {
            let mut runtimes = self.runtimes.write().await;
            runtimes.insert(runtime.session_id.clone(), runtime.clone());
        }

        if let Some(ref storage_path) = self.storage_path {
            let file_path =
                storage_path.join(format!("{}.json", sanitize_id(&runtime.session_id)));
            let content = serde_json::to_string_pretty(runtime)?;
            tokio::fs::write(&file_path, content).await?;
        }

        Ok(())
    }

    /// Delete a runtime from memory and disk.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        {
            let mut runtimes = self.runtimes.write().await;
            runtimes.remove(session_id);
        }

        if let Some(ref storage_path) = self.storage_path {
            let file_path = storage_path.join(format!("{}.json", sanitize_id(session_id)));
            if file_path.exists() {
                tokio::fs::remove_file(&file_path).await?;
            }
        }

        Ok(())
    }

    /// List all known session ids, sorted.
    ///
    /// Session files that fail to parse are skipped with a warning rather
    /// than failing the whole listing.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();

        {
            let runtimes = self.runtimes.read().await;
            ids.extend(runtimes.keys().cloned());
        }

        // Read each file to recover the original id, not the encoded filename
        if let Some(ref storage_path) = self.storage_path {
            let mut dir_entries = tokio::fs::read_dir(storage_path).await?;
            while let Some(entry) = dir_entries.next_entry().await? {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    match tokio::fs::read_to_string(&path).await {
                        Ok(content) => match serde_json::from_str::<SessionRuntime>(&content) {
                            Ok(runtime) => {
                                if !ids.contains(&runtime.session_id) {
                                    ids.push(runtime.session_id);
                                }
                            }
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "Skipping unreadable session file")
                            }
                        },
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Skipping unreadable session file")
                        }
                    }
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Load the most recently updated runtime, if any.
    ///
    /// Used by the CLI to resume where the user left off.
    pub async fn latest(&self) -> Result<Option<SessionRuntime>> {
        let mut latest: Option<SessionRuntime> = None;
        for id in self.list().await? {
            if let Some(runtime) = self.load(&id).await? {
                let newer = latest
                    .as_ref()
                    .map(|l| runtime.updated_at > l.updated_at)
                    .unwrap_or(true);
                if newer {
                    latest = Some(runtime);
                }
            }
        }
        Ok(latest)
    }

    /// Check if a session exists in memory or on disk.
    pub async fn exists(&self, session_id: &str) -> bool {
        {
            let runtimes = self.runtimes.read().await;
            if runtimes.contains_key(session_id) {
                return true;
            }
        }

        if let Some(ref storage_path) = self.storage_path {
            return storage_path
                .join(format!("{}.json", sanitize_id(session_id)))
                .exists();
        }

        false
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            runtimes: Arc::clone(&self.runtimes),
            storage_path: self.storage_path.clone(),
        }
    }
}

impl Default for SessionStore {
    /// Creates an in-memory store. Use `SessionStore::new()` for persistence.
    fn default() -> Self {
        Self::new_memory()
    }
}

/// Sanitize a session id for use as a filename.
///
/// Uses percent-encoding so the mapping is bijective: distinct ids never
/// collide on the same filename, and `%` itself is escaped to keep the
/// encoding reversible.
fn sanitize_id(id: &str) -> String {
    let mut result = String::with_capacity(id.len() * 3);
    for c in id.chars() {
        match c {
            '/' => result.push_str("%2F"),
            '\\' => result.push_str("%5C"),
            ':' => result.push_str("%3A"),
            '*' => result.push_str("%2A"),
            '?' => result.push_str("%3F"),
            '"' => result.push_str("%22"),
            '<' => result.push_str("%3C"),
            '>' => result.push_str("%3E"),
            '|' => result.push_str("%7C"),
            '%' => result.push_str("%25"),
            c => result.push(c),
        }
    }
    result
}
