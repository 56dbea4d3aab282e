//! Tools discovered on the Coral server.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolOrigin, ToolOutput};
use crate::coral::{CoralError, CoralSession, McpTool};

/// A Coral tool; calls are forwarded over the session.
pub struct CoralTool {
    session: Arc<CoralSession>,
    name: String,
    description: String,
    schema: Value,
}

impl CoralTool {
    pub fn new(session: Arc<CoralSession>, tool: McpTool) -> Self {
        Self {
            session,
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            schema: tool.input_schema,
        }
    }
}

/// Fetch the server's tool list and wrap each entry.
pub async fn discover_tools(session: &Arc<CoralSession>) -> Result<Vec<Arc<dyn Tool>>, CoralError> {
    let tools = session.list_tools().await?;
    Ok(tools
        .into_iter()
        .map(|tool| Arc::new(CoralTool::new(session.clone(), tool)) as Arc<dyn Tool>)
        .collect())
}

#[async_trait]
impl Tool for CoralTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn origin(&self) -> ToolOrigin {
        ToolOrigin::Coral
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutput> {
        let args = match args {
            Value::Null => json!({}),
            other => other,
        };

        let result = self.session.call_tool(&self.name, args).await?;
        let text = result.text();
        if result.is_error {
            return Err(anyhow::anyhow!("{} returned an error: {}", self.name, text));
        }
        Ok(ToolOutput::text(text))
    }
}
