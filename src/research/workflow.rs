//! Seam between the report adapter and the research graph that does the work.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::ResearchConfig;

/// Updates emitted by one workflow phase.
pub type UpdateStream = BoxStream<'static, anyhow::Result<Value>>;

/// Per-thread settings, sent as the workflow's `configurable` record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadConfig {
    pub thread_id: Uuid,
    pub search_api: String,
    pub planner_provider: String,
    pub planner_model: String,
    pub writer_provider: String,
    pub writer_model: String,
    pub max_search_depth: u32,
    pub report_structure: String,
}

impl ThreadConfig {
    pub fn new(thread_id: Uuid, config: &ResearchConfig) -> Self {
        Self {
            thread_id,
            search_api: config.search_api.clone(),
            planner_provider: config.planner_provider.clone(),
            planner_model: config.planner_model.clone(),
            writer_provider: config.writer_provider.clone(),
            writer_model: config.writer_model.clone(),
            max_search_depth: config.max_search_depth,
            report_structure: config.report_structure.clone(),
        }
    }
}

/// Input for one workflow phase.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowCommand {
    /// First phase: plan the report for `topic`.
    Start { topic: String },
    /// Continue past the human-feedback interrupt with this value.
    Resume(Value),
}

impl WorkflowCommand {
    /// Resume value that accepts the generated report plan as-is.
    pub fn approve_plan() -> Self {
        Self::Resume(Value::Bool(true))
    }
}

/// Accumulated state of a workflow thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowState {
    pub values: Map<String, Value>,
}

impl WorkflowState {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// An external report-generation workflow driven in phases.
#[async_trait]
pub trait ResearchWorkflow: Send + Sync {
    /// Run one phase on `thread`, returning its update stream.
    async fn stream(&self, thread: &ThreadConfig, command: WorkflowCommand) -> anyhow::Result<UpdateStream>;

    /// Read the thread's persisted state.
    async fn state(&self, thread: &ThreadConfig) -> anyhow::Result<WorkflowState>;
}
