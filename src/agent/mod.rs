//! Agent module - the research agent's prompt and invocation logic.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with the system prompt and the kickoff message
//! 2. Call the LLM with the Coral tools and `open_deepresearch`
//! 3. If the LLM requests a tool call, execute it and feed the result back
//! 4. Repeat until the LLM produces a final response or max iterations are reached
//!
//! [`InvocationLoop`] runs that invocation forever, and [`run_agent`] wraps
//! it with Coral connection management.

mod agent_loop;
mod prompt;
mod runner;
mod stage;
mod template;

pub use agent_loop::{Agent, InvocationOutcome, Invoke, ToolLogEntry};
pub use prompt::{build_system_prompt, KICKOFF_MESSAGE};
pub use runner::{run_agent, InvocationLoop, LoopExit};
pub use stage::ProtocolStage;
pub use template::{PromptTemplate, TemplateError};
