//! Tool system for the agent.
//!
//! Tools come from two places: the Coral server (messaging primitives,
//! discovered at connect time) and this process (`open_deepresearch`).
//! The registry concatenates both lists in that order without deduplication.

mod coral;
mod research;
mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use coral::{discover_tools, CoralTool};
pub use research::{DeepResearchTool, DEEP_RESEARCH_TOOL};
pub use schema::{describe_tools, escape_braces, ResponseFormat, ToolDescriptor, ToolError, ToolOrigin};

/// What a tool hands back to the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Text fed back to the model.
    pub content: String,
    /// Side data kept in the invocation log, never sent to the model.
    pub artifact: Option<Value>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(content: impl Into<String>, artifact: Value) -> Self {
        Self {
            content: content.into(),
            artifact: Some(artifact),
        }
    }
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    fn name(&self) -> &str;

    /// Get the tool description.
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    fn origin(&self) -> ToolOrigin {
        ToolOrigin::Local
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::Content
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutput>;
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    tool: Arc<dyn Tool>,
}

/// Ordered collection of validated tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote tools first, then local ones.
    pub fn combine(
        remote: Vec<Arc<dyn Tool>>,
        local: Vec<Arc<dyn Tool>>,
    ) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for tool in remote.into_iter().chain(local) {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Validate and append a tool. Name clashes are kept; dispatch picks the first.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let descriptor = ToolDescriptor::new(
            tool.name(),
            tool.description(),
            tool.parameters_schema(),
            tool.origin(),
            tool.response_format(),
        )?;
        if self.get(&descriptor.name).is_some() {
            tracing::warn!(
                "Tool '{}' registered more than once, calls go to the first registration",
                descriptor.name
            );
        }
        self.tools.push(RegisteredTool { descriptor, tool });
        Ok(())
    }

    /// List all registered tools.
    pub fn list_tools(&self) -> Vec<&ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor).collect()
    }

    pub fn tools_from(&self, origin: ToolOrigin) -> Vec<&ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| &t.descriptor)
            .filter(|d| d.origin == origin)
            .collect()
    }

    /// Get tool schemas in OpenAI function calling format.
    pub fn get_tool_schemas(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| t.descriptor.to_function_schema())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools
            .iter()
            .find(|t| t.descriptor.name == name)
            .map(|t| &t.descriptor)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<ToolOutput> {
        let entry = self
            .tools
            .iter()
            .find(|t| t.descriptor.name == name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        entry.tool.execute(args).await
    }
}
