//! Tool registry and executor for Parley
//!
//! The registry holds the registered capabilities, presents their schemas to
//! providers in registration order, and executes requested invocations under
//! isolation: unknown tools, malformed arguments, tool errors, panics, and
//! timeouts all become failed `ToolResult`s rather than escaping into the
//! agent loop.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::error::{ParleyError, Result};
use crate::providers::ToolDefinition;
use crate::session::ToolCall;

use super::{Tool, ToolContext, ToolResult, ToolSpec};

/// Default per-invocation timeout.
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Callback invoked after each individual tool execution, for observability.
pub type ToolObserver = Arc<dyn Fn(&str, &serde_json::Value, &ToolResult) + Send + Sync>;

/// A registry that holds and executes tools.
///
/// Registration happens at startup; afterwards the registry is immutable and
/// may be shared (e.g. behind an `Arc`) across any number of agent loops
/// without locking.
///
/// # Example
///
/// ```
/// use parley::tools::{EchoTool, ToolContext, ToolRegistry};
/// use parley::session::ToolCall;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(EchoTool)).unwrap();
///
/// let call = ToolCall::new("call_1", "echo", json!({"message": "hello"}));
/// let result = registry.execute(&call, &ToolContext::new()).await;
/// assert!(result.success);
/// # });
/// ```
pub struct ToolRegistry {
    /// Registered tools with their cached specs, in registration order
    entries: Vec<(ToolSpec, Box<dyn Tool>)>,
    /// Name → index into `entries`
    index: HashMap<String, usize>,
    /// Per-invocation timeout
    tool_timeout: Duration,
    /// Optional per-execution observer callback
    observer: Option<ToolObserver>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            observer: None,
        }
    }

    /// Set the per-invocation timeout (builder pattern).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Install an observer callback invoked after every execution with
    /// `(tool name, arguments, result)`. Observer panics are caught and
    /// logged; they never abort execution.
    pub fn set_observer(&mut self, observer: ToolObserver) {
        self.observer = Some(observer);
    }

    /// Register a new tool.
    ///
    /// # Errors
    /// Fails with `ParleyError::DuplicateTool` if a tool of the same name is
    /// already registered; the first registration is retained.
    ///
    /// # Example
    /// ```
    /// use parley::tools::{EchoTool, ToolRegistry};
    ///
    /// let mut registry = ToolRegistry::new();
    /// registry.register(Box::new(EchoTool)).unwrap();
    /// assert!(registry.register(Box::new(EchoTool)).is_err());
    /// assert_eq!(registry.len(), 1);
    /// ```
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        let spec = tool.spec();
        if self.index.contains_key(&spec.name) {
            return Err(ParleyError::DuplicateTool(spec.name));
        }
        info!(tool = %spec.name, "Registering tool");
        self.index.insert(spec.name.clone(), self.entries.len());
        self.entries.push((spec, tool));
        Ok(())
    }

    /// Get a registered tool's spec by name.
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.entries[i].0)
    }

    /// Get all tool definitions for presentation to a model.
    ///
    /// Pure and side-effect-free; order matches registration order.
    ///
    /// # Example
    /// ```
    /// use parley::tools::{EchoTool, ToolRegistry};
    ///
    /// let mut registry = ToolRegistry::new();
    /// registry.register(Box::new(EchoTool)).unwrap();
    ///
    /// let definitions = registry.definitions();
    /// assert_eq!(definitions.len(), 1);
    /// assert_eq!(definitions[0].name, "echo");
    /// ```
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .map(|(spec, _)| {
                ToolDefinition::new(&spec.name, &spec.description, spec.json_schema())
            })
            .collect()
    }

    /// Execute one requested invocation.
    ///
    /// Never returns an error: unknown tools, invalid arguments, tool-body
    /// errors, panics, and timeouts are all reported as failed results so the
    /// model can see and adapt to them.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let result = self.execute_inner(call, ctx).await;
        self.notify_observer(call, &result);
        result
    }

    /// Execute an ordered batch of invocations concurrently.
    ///
    /// Results are returned in the same order as the input calls; pairing
    /// downstream is by `call_id`, so concurrent completion order never
    /// matters.
    pub async fn execute_many(&self, calls: &[ToolCall], ctx: &ToolContext) -> Vec<ToolResult> {
        futures::future::join_all(calls.iter().map(|call| self.execute(call, ctx))).await
    }

    async fn execute_inner(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let (spec, tool) = match self.index.get(&call.name) {
            Some(&i) => &self.entries[i],
            None => {
                let mut available: Vec<&str> = self.names();
                available.sort_unstable();
                return ToolResult::failure(
                    &call.name,
                    &call.id,
                    &format!(
                        "Unknown tool '{}'. Available: {}",
                        call.name,
                        available.join(", ")
                    ),
                );
            }
        };

        let args = match spec.validate_args(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Invalid tool arguments");
                return ToolResult::failure(&call.name, &call.id, &format!("Invalid arguments: {}", e));
            }
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(
            self.tool_timeout,
            AssertUnwindSafe(tool.execute(args, ctx)).catch_unwind(),
        )
        .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(Ok(output))) => {
                debug!(tool = %call.name, latency_ms, "Tool executed successfully");
                ToolResult::ok(&call.name, &call.id, output)
            }
            Ok(Ok(Err(e))) => {
                error!(tool = %call.name, latency_ms, error = %e, "Tool execution failed");
                ToolResult::failure(&call.name, &call.id, &e.to_string())
            }
            Ok(Err(_panic)) => {
                error!(tool = %call.name, latency_ms, "Tool panicked during execution");
                ToolResult::failure(&call.name, &call.id, "tool panicked during execution")
            }
            Err(_elapsed) => {
                error!(tool = %call.name, latency_ms, "Tool execution timed out");
                ToolResult::failure(
                    &call.name,
                    &call.id,
                    &format!("timed out after {}s", self.tool_timeout.as_secs()),
                )
            }
        }
    }

    fn notify_observer(&self, call: &ToolCall, result: &ToolResult) {
        if let Some(observer) = &self.observer {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                observer(&call.name, &call.arguments, result)
            }));
            if outcome.is_err() {
                warn!(tool = %call.name, "Tool observer panicked; continuing");
            }
        }
    }

    /// Get the names of all registered tools, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(spec, _)| spec.name.as_str()).collect()
    }

    /// Check if a tool exists in the registry.
    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParleyError, Result};
    use crate::tools::{EchoTool, ParamKind, ParamSpec};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("failing", "Always fails", vec![])
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
            Err(ParleyError::Tool("deliberate failure".into()))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("panicking", "Always panics", vec![])
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
            panic!("tool blew up");
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("slow", "Sleeps forever", vec![])
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!("never"))
        }
    }

    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(
                "add",
                "Add two integers",
                vec![
                    ParamSpec::required("a", ParamKind::Integer, "Left operand"),
                    ParamSpec::required("b", ParamKind::Integer, "Right operand"),
                ],
            )
        }

        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();

        assert!(registry.has("echo"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.spec("echo").unwrap().name, "echo");
        assert!(registry.spec("nonexistent").is_none());
    }

    #[test]
    fn test_register_duplicate_fails_first_wins() {
        struct OtherEcho;

        #[async_trait]
        impl Tool for OtherEcho {
            fn spec(&self) -> ToolSpec {
                ToolSpec::new("echo", "An impostor", vec![])
            }
            async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
                Ok(json!("impostor"))
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let err = registry.register(Box::new(OtherEcho)).unwrap_err();
        assert!(matches!(err, ParleyError::DuplicateTool(ref name) if name == "echo"));

        // First registration retained
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.spec("echo").unwrap().description,
            "Echoes back the provided message"
        );
    }

    #[test]
    fn test_definitions_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool)).unwrap();
        registry.register(Box::new(EchoTool)).unwrap();
        registry.register(Box::new(FailingTool)).unwrap();

        let names: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["add", "echo", "failing"]);
        // Stable across calls
        let again: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, again);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool)).unwrap();

        let call = ToolCall::new("call_1", "add", json!({"a": 2, "b": 2}));
        let result = registry.execute(&call, &ToolContext::new()).await;

        assert!(result.success);
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.output, Some(json!(4)));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();

        let call = ToolCall::new("call_1", "nonexistent", json!({}));
        let result = registry.execute(&call, &ToolContext::new()).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("Unknown tool 'nonexistent'"));
        assert!(error.contains("echo"));
    }

    #[tokio::test]
    async fn test_execute_invalid_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool)).unwrap();

        let call = ToolCall::new("call_1", "add", json!({"a": 2}));
        let result = registry.execute(&call, &ToolContext::new()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("missing required parameter 'b'"));
    }

    #[tokio::test]
    async fn test_execute_tool_error_is_contained() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FailingTool)).unwrap();

        let call = ToolCall::new("call_1", "failing", json!({}));
        let result = registry.execute(&call, &ToolContext::new()).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(!error.is_empty());
        assert!(error.contains("deliberate failure"));
    }

    #[tokio::test]
    async fn test_execute_panic_is_contained() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PanickingTool)).unwrap();

        let call = ToolCall::new("call_1", "panicking", json!({}));
        let result = registry.execute(&call, &ToolContext::new()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_millis(50));
        registry.register(Box::new(SlowTool)).unwrap();

        let call = ToolCall::new("call_1", "slow", json!({}));
        let result = registry.execute(&call, &ToolContext::new()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_execute_many_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool)).unwrap();
        registry.register(Box::new(FailingTool)).unwrap();

        let calls = vec![
            ToolCall::new("call_a", "add", json!({"a": 1, "b": 1})),
            ToolCall::new("call_b", "failing", json!({})),
            ToolCall::new("call_c", "add", json!({"a": 2, "b": 3})),
        ];
        let results = registry.execute_many(&calls, &ToolContext::new()).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].call_id, "call_a");
        assert_eq!(results[0].output, Some(json!(2)));
        assert_eq!(results[1].call_id, "call_b");
        assert!(!results[1].success);
        assert_eq!(results[2].call_id, "call_c");
        assert_eq!(results[2].output, Some(json!(5)));
    }

    #[tokio::test]
    async fn test_observer_sees_each_execution() {
        static SEEN: AtomicUsize = AtomicUsize::new(0);

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool)).unwrap();
        registry.set_observer(Arc::new(|name, _args, result| {
            assert_eq!(name, "add");
            assert!(result.success);
            SEEN.fetch_add(1, Ordering::SeqCst);
        }));

        let calls = vec![
            ToolCall::new("c1", "add", json!({"a": 1, "b": 1})),
            ToolCall::new("c2", "add", json!({"a": 2, "b": 2})),
        ];
        registry.execute_many(&calls, &ToolContext::new()).await;

        assert_eq!(SEEN.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_observer_panic_does_not_abort() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool)).unwrap();
        registry.set_observer(Arc::new(|_, _, _| panic!("observer bug")));

        let call = ToolCall::new("call_1", "add", json!({"a": 2, "b": 2}));
        let result = registry.execute(&call, &ToolContext::new()).await;

        // The execution itself still succeeds
        assert!(result.success);
        assert_eq!(result.output, Some(json!(4)));
    }
}
