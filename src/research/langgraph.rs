//! HTTP client for a LangGraph API server hosting the research graph.
//!
//! Endpoints used:
//! - `POST /threads` - create the thread (idempotent with `if_exists: do_nothing`)
//! - `POST /threads/{id}/runs/stream` - run or resume, streamed as SSE
//! - `GET /threads/{id}/state` - accumulated state values

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde_json::{json, Map, Value};
use url::Url;

use super::workflow::{ResearchWorkflow, ThreadConfig, UpdateStream, WorkflowCommand, WorkflowState};

/// Limit for the non-streaming calls. Runs stream for as long as the graph works.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct LangGraphWorkflow {
    client: reqwest::Client,
    base_url: Url,
    assistant_id: String,
    request_timeout: Duration,
}

impl LangGraphWorkflow {
    pub fn new(base_url: &str, assistant_id: impl Into<String>) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url).with_context(|| format!("Invalid workflow URL: {}", base_url))?;
        // Relative joins must append to the path, not replace its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            assistant_id: assistant_id.into(),
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    /// Override the timeout of thread creation and state reads.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn thread_path(thread: &ThreadConfig, suffix: &str) -> String {
        format!(
            "threads/{}/{}",
            urlencoding::encode(&thread.thread_id.to_string()),
            suffix
        )
    }

    async fn ensure_thread(&self, thread: &ThreadConfig) -> anyhow::Result<()> {
        self.client
            .post(self.endpoint("threads")?)
            .timeout(self.request_timeout)
            .json(&json!({
                "thread_id": thread.thread_id,
                "if_exists": "do_nothing",
            }))
            .send()
            .await?
            .error_for_status()
            .context("Failed to create workflow thread")?;
        Ok(())
    }

    /// Request body for one run of the graph.
    pub fn run_body(&self, thread: &ThreadConfig, command: &WorkflowCommand) -> Value {
        let mut body = json!({
            "assistant_id": self.assistant_id,
            "config": { "configurable": thread },
            "stream_mode": ["updates"],
        });
        match command {
            WorkflowCommand::Start { topic } => {
                body["input"] = json!({ "topic": topic });
            }
            WorkflowCommand::Resume(value) => {
                body["command"] = json!({ "resume": value });
            }
        }
        body
    }
}

#[async_trait]
impl ResearchWorkflow for LangGraphWorkflow {
    async fn stream(&self, thread: &ThreadConfig, command: WorkflowCommand) -> anyhow::Result<UpdateStream> {
        if matches!(command, WorkflowCommand::Start { .. }) {
            self.ensure_thread(thread).await?;
        }

        let url = self.endpoint(&Self::thread_path(thread, "runs/stream"))?;
        let request = self.client.post(url).json(&self.run_body(thread, &command));
        let mut events = EventSource::new(request).map_err(|e| anyhow!("Cannot stream workflow run: {}", e))?;
        events.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        let updates = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(message)) => match message.event.as_str() {
                        "metadata" => {}
                        "end" => break,
                        "error" => {
                            yield Err(anyhow!("Workflow run failed: {}", message.data));
                            break;
                        }
                        _ => {
                            let update: Value = serde_json::from_str(&message.data)
                                .unwrap_or(Value::String(message.data));
                            yield Ok(update);
                        }
                    },
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        yield Err(anyhow!("Workflow stream failed: {}", e));
                        break;
                    }
                }
            }
            events.close();
        };

        Ok(Box::pin(updates))
    }

    async fn state(&self, thread: &ThreadConfig) -> anyhow::Result<WorkflowState> {
        let url = self.endpoint(&Self::thread_path(thread, "state"))?;
        let body: Value = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()
            .context("Failed to read workflow state")?
            .json()
            .await?;

        let values = match body.get("values") {
            Some(Value::Object(values)) => values.clone(),
            _ => Map::new(),
        };
        Ok(WorkflowState { values })
    }
}
