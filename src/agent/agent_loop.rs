//! One agent invocation: tools in a loop until the model stops calling tools.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::prompt::{build_system_prompt, KICKOFF_MESSAGE};
use super::stage::ProtocolStage;
use super::template::TemplateError;
use crate::coral::is_connection_lost;
use crate::llm::{ChatMessage, LlmClient, ToolCall};
use crate::tools::{ToolOutput, ToolRegistry};

/// A tool call made during an invocation.
#[derive(Debug, Clone)]
pub struct ToolLogEntry {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub stage: ProtocolStage,
    pub arguments: String,
    pub result: String,
    pub is_error: bool,
    pub artifact: Option<Value>,
}

/// Result of one invocation.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    /// Final model text, if it finished before the iteration limit.
    pub response: Option<String>,
    pub iterations: usize,
    pub tool_log: Vec<ToolLogEntry>,
}

impl InvocationOutcome {
    /// Number of `send_message` calls that went through.
    pub fn replies_sent(&self) -> usize {
        self.tool_log
            .iter()
            .filter(|entry| entry.stage == ProtocolStage::Replying && !entry.is_error)
            .count()
    }
}

/// Something the invocation loop can call repeatedly.
#[async_trait]
pub trait Invoke: Send + Sync {
    async fn invoke(&self) -> anyhow::Result<InvocationOutcome>;
}

/// The research agent: a tool-calling model bound to the combined tool list.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    model: String,
    system_prompt: String,
    max_iterations: usize,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
        wait_timeout_ms: u64,
        max_iterations: usize,
    ) -> Result<Self, TemplateError> {
        let system_prompt = build_system_prompt(&tools, wait_timeout_ms)?;
        Ok(Self {
            llm,
            tools,
            model: model.into(),
            system_prompt,
            max_iterations,
        })
    }

    /// Run one invocation.
    pub async fn run(&self) -> anyhow::Result<InvocationOutcome> {
        let mut tool_log = Vec::new();
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(KICKOFF_MESSAGE),
        ];
        let tool_schemas = self.tools.get_tool_schemas();

        for iteration in 0..self.max_iterations {
            tracing::debug!("Agent iteration {}", iteration + 1);

            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await?;

            if let Some(tool_calls) = response.tool_calls.filter(|calls| !calls.is_empty()) {
                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    tool_calls.clone(),
                ));

                for tool_call in &tool_calls {
                    let stage = ProtocolStage::for_tool(&tool_call.function.name);
                    tracing::info!(
                        stage = %stage,
                        "Calling tool: {} with args: {}",
                        tool_call.function.name,
                        truncate_for_log(&tool_call.function.arguments, 500)
                    );

                    let (content, artifact, is_error) = match self.execute_tool_call(tool_call).await {
                        Ok(ToolOutput { content, artifact }) => (content, artifact, false),
                        Err(e) if is_connection_lost(&e) => return Err(e),
                        Err(e) => {
                            tracing::warn!("Tool {} failed: {:#}", tool_call.function.name, e);
                            (format!("Error: {:#}", e), None, true)
                        }
                    };

                    tool_log.push(ToolLogEntry {
                        timestamp: Utc::now(),
                        tool: tool_call.function.name.clone(),
                        stage,
                        arguments: tool_call.function.arguments.clone(),
                        result: truncate_for_log(&content, 1000),
                        is_error,
                        artifact,
                    });

                    messages.push(ChatMessage::tool_result(tool_call.id.clone(), content));
                }

                continue;
            }

            // No tool calls - this is the final response
            if let Some(content) = response.content {
                return Ok(InvocationOutcome {
                    response: Some(content),
                    iterations: iteration + 1,
                    tool_log,
                });
            }

            return Err(anyhow::anyhow!("LLM returned empty response"));
        }

        tracing::warn!(
            "Agent stopped after reaching max iterations ({})",
            self.max_iterations
        );
        Ok(InvocationOutcome {
            response: None,
            iterations: self.max_iterations,
            tool_log,
        })
    }

    /// Execute a single tool call.
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> anyhow::Result<ToolOutput> {
        let arguments = tool_call.function.arguments.trim();
        let args: Value = if arguments.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments).map_err(|e| {
                anyhow::anyhow!("Invalid arguments for {}: {}", tool_call.function.name, e)
            })?
        };

        self.tools.execute(&tool_call.function.name, args).await
    }
}

#[async_trait]
impl Invoke for Agent {
    async fn invoke(&self) -> anyhow::Result<InvocationOutcome> {
        self.run().await
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
