//! Tool Registry
//!
//! Maps unique tool names to their descriptors. Handlers are closures, so a
//! test can register a fake under any name without touching the transports.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::auth::Claims;
use crate::core::error::{ServerError, ServerResult, ToolError};

/// Tool handler function type.
///
/// Handlers receive the per-call context and the raw JSON arguments and
/// return either a JSON result or a `ToolError`.
pub type ToolHandler = Arc<dyn Fn(&ToolContext, Value) -> Result<Value, ToolError> + Send + Sync>;

/// Per-call context handed to tool handlers.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    claims: Option<Claims>,
}

impl ToolContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(claims: Claims) -> Self {
        Self { claims: Some(claims) }
    }

    /// Claims of the caller, if the transport authenticated one.
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }
}

/// Tool definition as advertised by `tools/list`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

#[derive(Clone)]
pub struct ToolDescriptor {
    pub definition: ToolDefinition,
    pub handler: ToolHandler,
}

impl ToolDescriptor {
    pub fn new<F>(name: &str, description: &str, input_schema: Value, handler: F) -> Self
    where
        F: Fn(&ToolContext, Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            definition: ToolDefinition {
                name: name.to_string(),
                description: description.to_string(),
                input_schema,
                output_schema: None,
            },
            handler: Arc::new(handler),
        }
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.definition.output_schema = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        (self.handler)(ctx, arguments)
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Registry of available MCP tools.
///
/// Keeps registration order for `tools/list` and a name index for `tools/call`.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails without modifying the registry if the name is taken.
    pub fn register(&mut self, tool: ToolDescriptor) -> ServerResult<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ServerError::Registration(name));
        }
        tracing::debug!(tool = %name, "registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        self.tools.iter().map(|t| &t.definition).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Object schema helper for tool inputs and outputs.
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}
