//! Tool system: trait-based tools with runtime registration.
//!
//! Tools are what a role may ask the model to invoke. Each tool implements the
//! [`Tool`] trait and is registered in a [`ToolRegistry`]; the registry's
//! signatures are what gets declared to the model.

use std::collections::{BTreeMap, HashMap};

use super::error::{AgentError, AgentResult};

/// Description of a tool's interface.
#[derive(Debug, Clone)]
pub struct ToolSignature {
    /// Unique name of the tool.
    pub name: String,
    /// What this tool does.
    pub description: String,
    /// Parameters the tool accepts.
    pub parameters: Vec<ToolParam>,
}

impl ToolSignature {
    /// JSON Schema object for the parameters (all parameters are strings).
    pub fn json_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({ "type": "string", "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A single parameter in a tool's signature.
#[derive(Debug, Clone)]
pub struct ToolParam {
    /// Parameter name.
    pub name: String,
    /// What this parameter controls.
    pub description: String,
    /// Whether this parameter must be provided.
    pub required: bool,
}

/// Input to a tool execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolInput {
    /// Named parameters.
    pub params: BTreeMap<String, String>,
}

impl ToolInput {
    /// Create a new empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Build from a model-supplied JSON object. Non-string values are kept in
    /// their JSON text form; anything that is not an object yields no params.
    pub fn from_json(args: &serde_json::Value) -> Self {
        let params = args
            .as_object()
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| {
                        let text = match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), text)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { params }
    }

    /// The parameters as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }

    /// Get a parameter value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Get a required, non-blank parameter, returning an error if missing.
    pub fn require(&self, name: &str, tool_name: &str) -> AgentResult<&str> {
        self.get(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or(AgentError::ToolExecution {
                tool_name: tool_name.into(),
                message: format!("missing required parameter: {name}"),
            })
    }
}

/// Output from a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Human-readable result. Failures travel as `AgentError`, not as output.
    pub result: String,
}

impl ToolOutput {
    /// Create an output.
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}

/// A tool a role can invoke.
pub trait Tool: Send + Sync {
    /// Describe this tool's interface.
    fn signature(&self) -> ToolSignature;

    /// Execute the tool with the given input.
    fn execute(&self, input: ToolInput) -> AgentResult<ToolOutput>;
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. If a tool with the same name exists, it is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let sig = tool.signature();
        self.tools.insert(sig.name.clone(), tool);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    /// List all registered tool signatures, sorted by name.
    pub fn list(&self) -> Vec<ToolSignature> {
        let mut sigs: Vec<ToolSignature> = self.tools.values().map(|t| t.signature()).collect();
        sigs.sort_by(|a, b| a.name.cmp(&b.name));
        sigs
    }

    /// Execute a tool by name.
    pub fn execute(&self, name: &str, input: ToolInput) -> AgentResult<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound { name: name.into() })?;
        tool.execute(input)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
