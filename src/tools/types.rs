//! Tool types for Parley
//!
//! This module defines the core types for tool execution: the `Tool` trait
//! that all tools implement, the declarative `ToolSpec` parameter schema the
//! registry validates arguments against, the `ToolResult` outcome type, and
//! the `ToolContext` passed to executing tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::Result;

/// The JSON type a tool parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    /// The JSON Schema type name for this kind.
    pub fn schema_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }
}

/// Declarative description of one tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name as it appears in the argument object
    pub name: String,
    /// Accepted JSON type
    pub kind: ParamKind,
    /// Whether the parameter must be present
    pub required: bool,
    /// Human-readable description presented to the model
    pub description: String,
}

impl ParamSpec {
    /// Create a required parameter.
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            description: description.to_string(),
        }
    }

    /// Create an optional parameter.
    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            description: description.to_string(),
        }
    }
}

/// Declarative metadata for a registered capability.
///
/// Immutable after registration. The registry converts specs into the JSON
/// Schema form providers present to the model, and validates model-supplied
/// arguments against them before a tool body ever runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name within a registry
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// Parameter declarations
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Create a new tool spec.
    ///
    /// # Example
    /// ```
    /// use parley::tools::{ParamKind, ParamSpec, ToolSpec};
    ///
    /// let spec = ToolSpec::new(
    ///     "web_search",
    ///     "Search the web for information",
    ///     vec![ParamSpec::required("query", ParamKind::String, "Search query")],
    /// );
    /// assert_eq!(spec.name, "web_search");
    /// ```
    pub fn new(name: &str, description: &str, params: Vec<ParamSpec>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
        }
    }

    /// Render the parameter declarations as a JSON Schema object.
    ///
    /// # Example
    /// ```
    /// use parley::tools::{ParamKind, ParamSpec, ToolSpec};
    ///
    /// let spec = ToolSpec::new(
    ///     "add",
    ///     "Add two integers",
    ///     vec![
    ///         ParamSpec::required("a", ParamKind::Integer, "Left operand"),
    ///         ParamSpec::required("b", ParamKind::Integer, "Right operand"),
    ///     ],
    /// );
    /// let schema = spec.json_schema();
    /// assert_eq!(schema["type"], "object");
    /// assert_eq!(schema["properties"]["a"]["type"], "integer");
    /// assert_eq!(schema["required"][0], "a");
    /// ```
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                json!({
                    "type": p.kind.schema_type(),
                    "description": p.description,
                }),
            );
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": Value::Array(required),
        })
    }

    /// Validate and coerce an argument payload against this spec.
    ///
    /// Returns the coerced argument object on success, or a description of
    /// the mismatch. Malformed model-supplied arguments are expected, not
    /// exceptional, so this reports strings rather than errors. Unknown keys
    /// are dropped; lossless coercions (numeric strings, integral floats,
    /// "true"/"false") are applied.
    pub fn validate_args(&self, args: &Value) -> std::result::Result<Value, String> {
        let empty = Map::new();
        let obj = match args {
            Value::Object(obj) => obj,
            Value::Null => &empty,
            other => {
                return Err(format!(
                    "arguments must be a JSON object, got {}",
                    type_name(other)
                ))
            }
        };

        let mut coerced = Map::new();
        for p in &self.params {
            match obj.get(&p.name) {
                Some(value) => {
                    let v = coerce_value(value, p.kind).ok_or_else(|| {
                        format!(
                            "parameter '{}' expects {}, got {}",
                            p.name,
                            p.kind.schema_type(),
                            type_name(value)
                        )
                    })?;
                    coerced.insert(p.name.clone(), v);
                }
                None if p.required => {
                    return Err(format!("missing required parameter '{}'", p.name));
                }
                None => {}
            }
        }

        Ok(Value::Object(coerced))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerce a value to the expected kind, returning `None` when no lossless
/// conversion exists.
fn coerce_value(value: &Value, kind: ParamKind) -> Option<Value> {
    match (kind, value) {
        (ParamKind::String, Value::String(_)) => Some(value.clone()),
        (ParamKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ParamKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
        (ParamKind::Integer, Value::Number(n)) => {
            let f = n.as_f64()?;
            (f.fract() == 0.0).then(|| json!(f as i64))
        }
        (ParamKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| json!(i)),
        (ParamKind::Number, Value::Number(_)) => Some(value.clone()),
        (ParamKind::Number, Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| json!(f)),
        (ParamKind::Boolean, Value::Bool(_)) => Some(value.clone()),
        (ParamKind::Boolean, Value::String(s)) => match s.trim() {
            "true" => Some(json!(true)),
            "false" => Some(json!(false)),
            _ => None,
        },
        (ParamKind::Array, Value::Array(_)) => Some(value.clone()),
        (ParamKind::Object, Value::Object(_)) => Some(value.clone()),
        _ => None,
    }
}

/// Outcome of one tool execution.
///
/// `output` and `error` are mutually exclusive by construction: use the
/// `ok` and `failure` constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool that was invoked
    pub tool_name: String,
    /// Identifier of the originating call
    pub call_id: String,
    /// Whether the execution succeeded
    pub success: bool,
    /// Result payload (opaque to the runtime), present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error description, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result.
    pub fn ok(tool_name: &str, call_id: &str, output: Value) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            call_id: call_id.to_string(),
            success: true,
            output: Some(output),
            error: None,
        }
    }

    /// Create a failed result.
    pub fn failure(tool_name: &str, call_id: &str, error: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            call_id: call_id.to_string(),
            success: false,
            output: None,
            error: Some(error.to_string()),
        }
    }

    /// Render this result as tool-message content for the conversation.
    ///
    /// String payloads are passed through verbatim; other payloads are
    /// serialized. Failures are narrated so the model can adapt.
    ///
    /// # Example
    /// ```
    /// use parley::tools::ToolResult;
    /// use serde_json::json;
    ///
    /// assert_eq!(ToolResult::ok("echo", "c1", json!("hi")).render(), "hi");
    /// assert_eq!(ToolResult::ok("add", "c2", json!(4)).render(), "4");
    /// assert_eq!(
    ///     ToolResult::failure("add", "c3", "bad input").render(),
    ///     "Error: bad input"
    /// );
    /// ```
    pub fn render(&self) -> String {
        if self.success {
            match &self.output {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            }
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown"))
        }
    }
}

/// Trait that all tools must implement.
///
/// Tools are named, schema-described callables the model may request. The
/// registry validates arguments against `spec()` before `execute` runs, so
/// tool bodies may assume required parameters are present and well-typed.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use parley::tools::{ParamKind, ParamSpec, Tool, ToolContext, ToolSpec};
/// use parley::error::Result;
///
/// struct AddTool;
///
/// #[async_trait]
/// impl Tool for AddTool {
///     fn spec(&self) -> ToolSpec {
///         ToolSpec::new(
///             "add",
///             "Add two integers",
///             vec![
///                 ParamSpec::required("a", ParamKind::Integer, "Left operand"),
///                 ParamSpec::required("b", ParamKind::Integer, "Right operand"),
///             ],
///         )
///     }
///
///     async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
///         let a = args["a"].as_i64().unwrap_or(0);
///         let b = args["b"].as_i64().unwrap_or(0);
///         Ok(json!(a + b))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get this tool's declarative spec (name, description, parameters).
    fn spec(&self) -> ToolSpec;

    /// Execute the tool with validated arguments.
    ///
    /// Errors returned here are converted into failed `ToolResult`s by the
    /// executor; they never terminate the agent loop.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The session this invocation belongs to
    pub session_id: Option<String>,
    /// The workspace directory for file operations
    pub workspace: Option<String>,
}

impl ToolContext {
    /// Create a new empty tool context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session id.
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Set the workspace directory.
    ///
    /// # Example
    /// ```
    /// use parley::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_workspace("/home/user/project");
    /// assert_eq!(ctx.workspace.as_deref(), Some("/home/user/project"));
    /// ```
    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }
}
