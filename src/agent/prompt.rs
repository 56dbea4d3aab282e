//! System prompt for the research agent.

use super::template::{PromptTemplate, TemplateError};
use crate::tools::{describe_tools, ToolOrigin, ToolRegistry};

/// User turn that starts each invocation.
pub const KICKOFF_MESSAGE: &str = "[automated] continue collaborating with other agents";

/// Build the system prompt with the mention-handling protocol and tool listings.
///
/// Tool schemas are inserted brace-escaped and the result is rendered as a
/// template, so the model sees each schema as plain JSON.
pub fn build_system_prompt(tools: &ToolRegistry, wait_timeout_ms: u64) -> Result<String, TemplateError> {
    let coral_tools = describe_tools(tools.tools_from(ToolOrigin::Coral));
    let agent_tools = describe_tools(tools.tools_from(ToolOrigin::Local));

    let template = format!(
        r#"You are an agent interacting with the tools from Coral Server and having your own tools. Your task is to perform any instructions coming from any agent.
Follow these steps in order:
1. Call wait_for_mentions from coral tools (timeoutMs: {wait_timeout_ms}) to receive mentions from other agents.
2. When you receive a mention, keep the thread ID and the sender ID.
3. Take 2 seconds to think about the content (instruction) of the message and check only from the list of your tools available for you to action.
4. Check the tool schema and make a plan in steps for the task you want to perform.
5. Only call the tools you need to perform for each step of the plan to complete the instruction in the content. If the request is for a research report, use the open_deepresearch tool.
6. Take 3 seconds and think about the content and see if you have executed the instruction to the best of your ability and the tools. Make this your response as "answer". Return complete, unmodified research content; never send placeholder text or a summary instead of the report.
7. Use `send_message` from coral tools to send a message in the same thread ID to the sender Id you received the mention from, with content: "answer".
8. If any error occurs, use `send_message` to send a message in the same thread ID to the sender Id you received the mention from, with content: "error" and a description of what failed.
9. Always respond back to the sender agent even if you have no answer or error.
10. Wait for 2 seconds and repeat the process from step 1.

These are the list of coral tools: {coral_tools}
These are the list of your tools: {agent_tools}"#,
        wait_timeout_ms = wait_timeout_ms,
        coral_tools = coral_tools,
        agent_tools = agent_tools,
    );

    PromptTemplate::new(template).render(&[])
}
