//! The `open_deepresearch` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ResponseFormat, Tool, ToolOutput};
use crate::research::ReportGenerator;

pub const DEEP_RESEARCH_TOOL: &str = "open_deepresearch";

/// Generates a research report for a topic.
pub struct DeepResearchTool {
    generator: Arc<ReportGenerator>,
}

impl DeepResearchTool {
    pub fn new(generator: Arc<ReportGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for DeepResearchTool {
    fn name(&self) -> &str {
        DEEP_RESEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Generates a comprehensive research report on a given topic using OpenDeepResearch. Returns the complete research report content with introduction, main body sections with research findings, and conclusions with structured elements."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The topic for the research report"
                }
            },
            "required": ["topic"],
            "type": "object"
        })
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::ContentAndArtifact
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutput> {
        let topic = args["topic"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing 'topic' argument"))?;

        let report = self.generator.generate(topic).await?;

        Ok(ToolOutput::with_artifact(
            report.content,
            json!({
                "report_id": report.id,
                "path": report.path.display().to_string(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::research::{ResearchWorkflow, ThreadConfig, UpdateStream, WorkflowCommand, WorkflowState};

    struct FixedReport;

    #[async_trait]
    impl ResearchWorkflow for FixedReport {
        async fn stream(&self, _thread: &ThreadConfig, _command: WorkflowCommand) -> anyhow::Result<UpdateStream> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn state(&self, _thread: &ThreadConfig) -> anyhow::Result<WorkflowState> {
            let mut values = serde_json::Map::new();
            values.insert("final_report".to_string(), json!("## Findings"));
            Ok(WorkflowState { values })
        }
    }

    fn tool(dir: &std::path::Path) -> DeepResearchTool {
        DeepResearchTool::new(Arc::new(ReportGenerator::new(
            Arc::new(FixedReport),
            ResearchConfig {
                output_dir: dir.to_path_buf(),
                ..ResearchConfig::default()
            },
        )))
    }

    #[tokio::test]
    async fn returns_report_text_and_file_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = tool(dir.path())
            .execute(json!({"topic": "What is Model Context Protocol?"}))
            .await
            .unwrap();

        assert_eq!(output.content, "## Findings");
        let artifact = output.artifact.expect("artifact");
        let path = artifact["path"].as_str().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "## Findings");
        assert!(artifact["report_id"].is_string());
    }

    #[tokio::test]
    async fn rejects_missing_topic() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        assert!(tool.execute(json!({})).await.is_err());
        assert!(tool.execute(json!({"topic": "  "})).await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn declares_content_and_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(dir.path());
        assert_eq!(tool.name(), "open_deepresearch");
        assert_eq!(tool.response_format(), ResponseFormat::ContentAndArtifact);
        assert_eq!(tool.parameters_schema()["required"], json!(["topic"]));
    }
}
