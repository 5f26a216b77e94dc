//! Tool registration and invocation contracts.
//!
//! Two traits replace arity-introspection dispatch: `Tool` for ordinary
//! tools and `CancellableTool` for tools that want to observe the abort
//! signal mid-execution (e.g. to stream partial output or exit early).
//! A registry entry is exactly one or the other, decided at registration
//! time — never guessed from a call signature.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::abort::AbortToken;
use crate::error::Result;
use crate::types::{JsonObject, ToolDescriptor, ToolResult};

/// How a tool may be scheduled relative to others within one turn's wave
/// plan. The default (`Parallel`, meaning "no declared group") never
/// changes `TurnRunner::execute`'s strictly sequential default path;
/// `Serialized(group)` only affects `ToolRegistry::execution_order`, used
/// by callers that explicitly opt into wave-based scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    Parallel,
    Serialized(String),
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Parallel
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Parallel
    }

    async fn invoke(&self, arguments: JsonObject) -> Result<ToolResult>;
}

#[async_trait]
pub trait CancellableTool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Parallel
    }

    async fn invoke(&self, arguments: JsonObject, abort: AbortToken) -> Result<ToolResult>;
}

enum RegisteredTool {
    Plain(Box<dyn Tool>),
    Cancellable(Box<dyn CancellableTool>),
}

/// A closure-backed [`Tool`] built with [`tool`] or [`ToolBuilder`].
struct FnTool<F> {
    descriptor: ToolDescriptor,
    execution_mode: ExecutionMode,
    handler: F,
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(JsonObject) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<ToolResult>> + Send,
{
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode.clone()
    }

    async fn invoke(&self, arguments: JsonObject) -> Result<ToolResult> {
        (self.handler)(arguments).await
    }
}

/// Construct a simple tool from a name, description, JSON schema, and an
/// async closure. For tools that need to observe cancellation, use
/// [`ToolBuilder`] with `cancellable`.
pub fn tool<F, Fut>(name: impl Into<String>, description: impl Into<String>, parameters_schema: JsonObject, handler: F) -> Box<dyn Tool>
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ToolResult>> + Send + 'static,
{
    Box::new(FnTool {
        descriptor: ToolDescriptor {
            name: name.into(),
            description: description.into(),
            parameters_schema,
        },
        execution_mode: ExecutionMode::Parallel,
        handler,
    })
}

/// Builder for a tool, with JSON-schema assembly helpers.
pub struct ToolBuilder {
    name: String,
    description: String,
    parameters_schema: JsonObject,
    execution_mode: ExecutionMode,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ToolBuilder {
            name: name.into(),
            description: String::new(),
            parameters_schema: schema_object(),
            execution_mode: ExecutionMode::Parallel,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a required string/number/boolean/object/array parameter. `kind`
    /// is a JSON Schema primitive type name (`"string"`, `"number"`, ...).
    pub fn param(mut self, name: impl Into<String>, kind: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let name = name.into();
        let mut prop = Map::new();
        prop.insert("type".to_string(), Value::String(kind.into()));
        prop.insert("description".to_string(), Value::String(description.into()));

        if let Some(Value::Object(props)) = self.parameters_schema.get_mut("properties") {
            props.insert(name.clone(), Value::Object(prop));
        }
        if required {
            if let Some(Value::Array(req)) = self.parameters_schema.get_mut("required") {
                req.push(Value::String(name));
            }
        }
        self
    }

    pub fn serialized(mut self, group: impl Into<String>) -> Self {
        self.execution_mode = ExecutionMode::Serialized(group.into());
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> Box<dyn Tool>
    where
        F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Box::new(FnTool {
            descriptor: ToolDescriptor {
                name: self.name,
                description: self.description,
                parameters_schema: self.parameters_schema,
            },
            execution_mode: self.execution_mode,
            handler,
        })
    }
}

fn schema_object() -> JsonObject {
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(Map::new()));
    schema.insert("required".to_string(), Value::Array(Vec::new()));
    schema
}

/// Holds registered tools, keyed by name, and exposes their descriptors
/// and scheduling groups to the rest of the core.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.descriptor().name, RegisteredTool::Plain(tool));
    }

    pub fn register_cancellable(&mut self, tool: Box<dyn CancellableTool>) {
        self.tools.insert(tool.descriptor().name, RegisteredTool::Cancellable(tool));
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|t| match t {
                RegisteredTool::Plain(t) => t.descriptor(),
                RegisteredTool::Cancellable(t) => t.descriptor(),
            })
            .collect()
    }

    /// Stable execution order for a set of call names: unserialized tools
    /// keep the order they appear in `names`; tools sharing a declared
    /// `Serialized(group)` are grouped together at the position of their
    /// first occurrence. This never reorders when no tool declares a group
    /// (the default), which is the only ordering `TurnRunner::execute`'s
    /// sequential path actually uses.
    pub fn execution_order(&self, names: &[String]) -> Vec<Vec<String>> {
        let mut waves: Vec<Vec<String>> = Vec::new();
        let mut group_wave_index: HashMap<String, usize> = HashMap::new();

        for name in names {
            let mode = self.tools.get(name).map(|t| match t {
                RegisteredTool::Plain(t) => t.execution_mode(),
                RegisteredTool::Cancellable(t) => t.execution_mode(),
            });

            match mode {
                Some(ExecutionMode::Serialized(group)) => {
                    if let Some(&idx) = group_wave_index.get(&group) {
                        waves[idx].push(name.clone());
                    } else {
                        let idx = waves.len();
                        waves.push(vec![name.clone()]);
                        group_wave_index.insert(group, idx);
                    }
                }
                _ => waves.push(vec![name.clone()]),
            }
        }
        waves
    }
}

impl RegisteredTool {
    pub fn descriptor(&self) -> ToolDescriptor {
        match self {
            RegisteredTool::Plain(t) => t.descriptor(),
            RegisteredTool::Cancellable(t) => t.descriptor(),
        }
    }

    pub async fn invoke(&self, arguments: JsonObject, abort: AbortToken) -> Result<ToolResult> {
        match self {
            RegisteredTool::Plain(t) => t.invoke(arguments).await,
            RegisteredTool::Cancellable(t) => t.invoke(arguments, abort).await,
        }
    }
}
