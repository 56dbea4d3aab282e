//! Research report generation.
//!
//! The heavy lifting (planning, searching, section writing) happens in an
//! external research graph reached through [`ResearchWorkflow`]. This module
//! drives it in two phases and persists the compiled report.

mod langgraph;
mod report;
mod workflow;

pub use langgraph::LangGraphWorkflow;
pub use report::{report_file_name, ReportError, ReportGenerator, ResearchReport, FINAL_REPORT_KEY};
pub use workflow::{ResearchWorkflow, ThreadConfig, UpdateStream, WorkflowCommand, WorkflowState};
