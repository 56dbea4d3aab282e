//! Report generation: run the workflow, approve its plan, persist the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::workflow::{ResearchWorkflow, ThreadConfig, WorkflowCommand, WorkflowState};
use crate::config::ResearchConfig;

/// State key holding the compiled report.
pub const FINAL_REPORT_KEY: &str = "final_report";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Research workflow failed: {0:#}")]
    Workflow(anyhow::Error),

    #[error("Workflow thread {thread_id} finished without a final report")]
    MissingReport { thread_id: Uuid },

    #[error("Failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A generated report and where it was saved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchReport {
    /// Identifier used in the file name.
    pub id: Uuid,
    /// Workflow thread that produced the report.
    pub thread_id: Uuid,
    pub topic: String,
    pub content: String,
    pub path: PathBuf,
}

/// Drives a [`ResearchWorkflow`] and writes its output to disk.
pub struct ReportGenerator {
    workflow: Arc<dyn ResearchWorkflow>,
    config: ResearchConfig,
}

impl ReportGenerator {
    pub fn new(workflow: Arc<dyn ResearchWorkflow>, config: ResearchConfig) -> Self {
        Self { workflow, config }
    }

    /// Generate a report on `topic`.
    ///
    /// The workflow runs twice on one thread: once with the topic, then
    /// resumed with plan approval so no human feedback is awaited.
    pub async fn generate(&self, topic: &str) -> Result<ResearchReport, ReportError> {
        let thread = ThreadConfig::new(Uuid::new_v4(), &self.config);
        tracing::info!(thread_id = %thread.thread_id, "Generating research report on: {}", topic);

        let planned = self
            .drain(
                &thread,
                WorkflowCommand::Start {
                    topic: topic.to_string(),
                },
            )
            .await?;
        tracing::debug!(thread_id = %thread.thread_id, "Planning phase produced {} updates", planned);

        let written = self.drain(&thread, WorkflowCommand::approve_plan()).await?;
        tracing::debug!(thread_id = %thread.thread_id, "Writing phase produced {} updates", written);

        let state = self
            .workflow
            .state(&thread)
            .await
            .map_err(ReportError::Workflow)?;
        let content = final_report(&state, thread.thread_id)?;

        let id = Uuid::new_v4();
        let path = write_report(&self.config.output_dir, id, &content).await?;
        tracing::info!("Research report saved to {}", path.display());

        Ok(ResearchReport {
            id,
            thread_id: thread.thread_id,
            topic: topic.to_string(),
            content,
            path,
        })
    }

    async fn drain(&self, thread: &ThreadConfig, command: WorkflowCommand) -> Result<usize, ReportError> {
        let mut updates = self
            .workflow
            .stream(thread, command)
            .await
            .map_err(ReportError::Workflow)?;

        let mut count = 0;
        while let Some(update) = updates.next().await {
            let update = update.map_err(ReportError::Workflow)?;
            count += 1;
            tracing::trace!(thread_id = %thread.thread_id, "Workflow update: {}", update);
        }
        Ok(count)
    }
}

/// The report text, if the state holds a non-blank string under `final_report`.
fn final_report(state: &WorkflowState, thread_id: Uuid) -> Result<String, ReportError> {
    match state.get(FINAL_REPORT_KEY) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        _ => Err(ReportError::MissingReport { thread_id }),
    }
}

/// File name for report `id`.
pub fn report_file_name(id: Uuid) -> String {
    format!("research_report_{}.txt", id)
}

async fn write_report(dir: &Path, id: Uuid, content: &str) -> Result<PathBuf, ReportError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(report_file_name(id));
    let io_err = |source| ReportError::Io {
        path: path.clone(),
        source,
    };

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
        .map_err(io_err)?;
    file.write_all(content.as_bytes()).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::research::workflow::UpdateStream;

    /// Workflow double that records commands and returns a canned state.
    struct ScriptedWorkflow {
        final_state: WorkflowState,
        commands: Mutex<Vec<(Uuid, WorkflowCommand)>>,
        fail_resume: bool,
    }

    impl ScriptedWorkflow {
        fn with_report(report: Value) -> Self {
            let mut values = serde_json::Map::new();
            values.insert("topic".to_string(), json!("t"));
            values.insert(FINAL_REPORT_KEY.to_string(), report);
            Self {
                final_state: WorkflowState { values },
                commands: Mutex::new(Vec::new()),
                fail_resume: false,
            }
        }

        fn without_report() -> Self {
            Self {
                final_state: WorkflowState::default(),
                commands: Mutex::new(Vec::new()),
                fail_resume: false,
            }
        }
    }

    #[async_trait]
    impl ResearchWorkflow for ScriptedWorkflow {
        async fn stream(&self, thread: &ThreadConfig, command: WorkflowCommand) -> anyhow::Result<UpdateStream> {
            self.commands.lock().unwrap().push((thread.thread_id, command.clone()));
            let updates: Vec<anyhow::Result<Value>> = match command {
                WorkflowCommand::Start { .. } => vec![
                    Ok(json!({"generate_report_plan": {"sections": []}})),
                    Ok(json!({"__interrupt__": []})),
                ],
                WorkflowCommand::Resume(_) if self.fail_resume => {
                    vec![Err(anyhow::anyhow!("search provider unavailable"))]
                }
                WorkflowCommand::Resume(_) => vec![Ok(json!({"compile_final_report": {}}))],
            };
            Ok(Box::pin(futures::stream::iter(updates)))
        }

        async fn state(&self, _thread: &ThreadConfig) -> anyhow::Result<WorkflowState> {
            Ok(self.final_state.clone())
        }
    }

    fn generator(workflow: Arc<ScriptedWorkflow>, dir: &Path) -> ReportGenerator {
        ReportGenerator::new(
            workflow,
            ResearchConfig {
                output_dir: dir.join("temp"),
                ..ResearchConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn writes_report_named_after_a_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = Arc::new(ScriptedWorkflow::with_report(json!("# MCP\n\nA protocol.")));
        let report = generator(workflow.clone(), dir.path())
            .generate("What is Model Context Protocol?")
            .await
            .expect("report");

        assert_eq!(report.path.parent(), Some(dir.path().join("temp").as_path()));
        let file_name = report.path.file_name().unwrap().to_str().unwrap();
        let id = file_name
            .strip_prefix("research_report_")
            .and_then(|rest| rest.strip_suffix(".txt"))
            .expect("file name pattern");
        assert_eq!(Uuid::parse_str(id).unwrap(), report.id);

        let written = std::fs::read_to_string(&report.path).unwrap();
        assert_eq!(written, report.content);
        assert_eq!(written, "# MCP\n\nA protocol.");
    }

    #[tokio::test]
    async fn runs_then_resumes_on_the_same_thread() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = Arc::new(ScriptedWorkflow::with_report(json!("report")));
        let report = generator(workflow.clone(), dir.path())
            .generate("rust async runtimes")
            .await
            .unwrap();

        let commands = workflow.commands.lock().unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            (
                report.thread_id,
                WorkflowCommand::Start {
                    topic: "rust async runtimes".to_string()
                }
            )
        );
        assert_eq!(commands[1], (report.thread_id, WorkflowCommand::Resume(json!(true))));
        assert_ne!(report.thread_id, report.id);
    }

    #[tokio::test]
    async fn missing_or_blank_reports_write_nothing() {
        for workflow in [
            ScriptedWorkflow::without_report(),
            ScriptedWorkflow::with_report(Value::Null),
            ScriptedWorkflow::with_report(json!({"sections": ["intro"]})),
            ScriptedWorkflow::with_report(json!("   \n")),
        ] {
            let dir = tempfile::tempdir().unwrap();
            let err = generator(Arc::new(workflow), dir.path())
                .generate("topic")
                .await
                .unwrap_err();

            assert!(matches!(err, ReportError::MissingReport { .. }), "got {:?}", err);
            assert!(!dir.path().join("temp").exists());
        }
    }

    #[tokio::test]
    async fn sequential_reports_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(Arc::new(ScriptedWorkflow::with_report(json!("same text"))), dir.path());

        let first = generator.generate("same topic").await.unwrap();
        let second = generator.generate("same topic").await.unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(std::fs::read_dir(dir.path().join("temp")).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn existing_output_directory_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("temp")).unwrap();
        let generator = generator(Arc::new(ScriptedWorkflow::with_report(json!("text"))), dir.path());
        assert!(generator.generate("topic").await.is_ok());
    }

    #[tokio::test]
    async fn workflow_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = ScriptedWorkflow::with_report(json!("text"));
        workflow.fail_resume = true;
        let err = generator(Arc::new(workflow), dir.path())
            .generate("topic")
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Workflow(_)));
        assert!(err.to_string().contains("search provider unavailable"));
    }
}
