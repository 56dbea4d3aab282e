//! Where the agent is in its mention-handling protocol.
//!
//! The model drives the protocol; these stages are inferred from the tools it
//! calls and only feed logging and invocation summaries.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStage {
    WaitingForMention,
    ExtractingContext,
    SelectingTool,
    InvokingTool,
    Replying,
}

impl ProtocolStage {
    /// Stage entered by calling `tool`.
    pub fn for_tool(tool: &str) -> Self {
        match tool {
            "wait_for_mentions" => Self::WaitingForMention,
            "send_message" => Self::Replying,
            _ => Self::InvokingTool,
        }
    }
}

impl fmt::Display for ProtocolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForMention => write!(f, "waiting_for_mention"),
            Self::ExtractingContext => write!(f, "extracting_context"),
            Self::SelectingTool => write!(f, "selecting_tool"),
            Self::InvokingTool => write!(f, "invoking_tool"),
            Self::Replying => write!(f, "replying"),
        }
    }
}
