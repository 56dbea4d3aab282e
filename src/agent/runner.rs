//! Repeated invocation of the agent and the reconnecting outer loop.

use std::sync::Arc;
use std::time::Duration;

use super::agent_loop::{Agent, Invoke};
use crate::config::{AgentConfig, Config};
use crate::coral::{connect_with_retry, is_connection_lost, CoralError, CoralSession};
use crate::llm::OpenAiClient;
use crate::research::{LangGraphWorkflow, ReportGenerator};
use crate::retry::RetryPolicy;
use crate::tools::{discover_tools, DeepResearchTool, Tool, ToolRegistry};

/// Why [`InvocationLoop::run`] returned without an error.
#[derive(Debug)]
pub enum LoopExit {
    /// The configured invocation bound was reached.
    InvocationLimit { invocations: u64 },
    /// The Coral session went away; the caller should reconnect.
    SessionLost(anyhow::Error),
}

/// Calls the agent over and over with fixed pauses.
#[derive(Debug, Clone)]
pub struct InvocationLoop {
    failure_retry: RetryPolicy,
    success_delay: Duration,
    max_invocations: Option<u64>,
    invocations: u64,
    consecutive_failures: u32,
}

impl InvocationLoop {
    pub fn new(failure_retry: RetryPolicy, success_delay: Duration, max_invocations: Option<u64>) -> Self {
        Self {
            failure_retry,
            success_delay,
            max_invocations,
            invocations: 0,
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.failure_retry, config.success_delay, config.max_invocations)
    }

    /// Invocations made so far, across calls to [`run`](Self::run).
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    pub async fn run<I: Invoke + ?Sized>(&mut self, agent: &I) -> anyhow::Result<LoopExit> {
        loop {
            if self.max_invocations.is_some_and(|max| self.invocations >= max) {
                return Ok(LoopExit::InvocationLimit {
                    invocations: self.invocations,
                });
            }
            self.invocations += 1;

            match agent.invoke().await {
                Ok(outcome) => {
                    self.consecutive_failures = 0;
                    tracing::info!(
                        invocation = self.invocations,
                        iterations = outcome.iterations,
                        tool_calls = outcome.tool_log.len(),
                        replies = outcome.replies_sent(),
                        "Agent invocation finished"
                    );
                    tokio::time::sleep(self.success_delay).await;
                }
                Err(e) if is_connection_lost(&e) => {
                    tracing::warn!("Coral session lost: {:#}", e);
                    return Ok(LoopExit::SessionLost(e));
                }
                Err(e) => {
                    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                    tracing::error!("Error in agent loop: {:#}", e);
                    tracing::error!("Error details: {:?}", e);

                    if self.failure_retry.is_exhausted(self.consecutive_failures) {
                        tracing::error!(
                            "Giving up after {} consecutive failed invocations",
                            self.consecutive_failures
                        );
                        return Err(e);
                    }
                    tokio::time::sleep(self.failure_retry.delay()).await;
                }
            }
        }
    }
}

/// Connect to Coral, assemble the agent and keep it running.
///
/// Returns when the invocation bound is reached, or with an error once the
/// connection or failure policy gives up.
pub async fn run_agent(config: &Config) -> anyhow::Result<()> {
    let llm = Arc::new(OpenAiClient::from_config(&config.model)?);
    let workflow = Arc::new(LangGraphWorkflow::new(
        &config.research.graph_url,
        config.research.assistant_id.clone(),
    )?);
    let generator = Arc::new(ReportGenerator::new(workflow, config.research.clone()));
    let mut invocations = InvocationLoop::from_config(&config.agent);

    loop {
        let (session, coral_tools) = connect_and_discover(config).await?;
        tracing::info!("Coral tools count: {}", coral_tools.len());

        let local: Vec<Arc<dyn Tool>> = vec![Arc::new(DeepResearchTool::new(generator.clone()))];
        let registry = ToolRegistry::combine(coral_tools, local)?;
        tracing::info!("Total tools available: {}", registry.len());

        let agent = Agent::new(
            llm.clone(),
            Arc::new(registry),
            config.model.name.clone(),
            config.coral.wait_for_mentions_timeout_ms,
            config.agent.max_iterations,
        )?;

        let exit = invocations.run(&agent).await;
        session.close().await;

        match exit? {
            LoopExit::InvocationLimit { invocations } => {
                tracing::info!("Stopping after {} invocations", invocations);
                return Ok(());
            }
            LoopExit::SessionLost(_) => {
                tokio::time::sleep(config.coral.connect_retry.delay()).await;
                tracing::info!("Reconnecting to Coral server");
            }
        }
    }
}

/// Open a session and list its tools.
///
/// Opening the session follows the connection retry policy. A failed listing
/// closes the session and starts over under the same policy.
async fn connect_and_discover(
    config: &Config,
) -> Result<(Arc<CoralSession>, Vec<Arc<dyn Tool>>), CoralError> {
    let policy = config.coral.connect_retry;
    let mut attempts = 0u32;
    loop {
        let session = Arc::new(connect_with_retry(&config.coral).await?);
        match discover_tools(&session).await {
            Ok(tools) => return Ok((session, tools)),
            Err(e) => {
                session.close().await;
                attempts = attempts.saturating_add(1);
                if !e.is_transient() || policy.is_exhausted(attempts) {
                    return Err(e);
                }
                tracing::warn!("Listing Coral tools failed: {}. Reconnecting...", e);
                tokio::time::sleep(policy.delay()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::InvocationOutcome;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Step {
        Ok,
        Fail,
        Disconnect,
    }

    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Invoke for Scripted {
        async fn invoke(&self) -> anyhow::Result<InvocationOutcome> {
            *self.calls.lock().unwrap() += 1;
            match self.steps.lock().unwrap().pop_front().unwrap_or(Step::Ok) {
                Step::Ok => Ok(InvocationOutcome {
                    response: Some("done".to_string()),
                    iterations: 1,
                    tool_log: Vec::new(),
                }),
                Step::Fail => Err(anyhow::anyhow!("model timed out")),
                Step::Disconnect => Err(CoralError::Closed.into()),
            }
        }
    }

    #[tokio::test]
    async fn stops_at_the_invocation_bound() {
        let agent = Scripted::new(vec![]);
        let mut runner = InvocationLoop::new(RetryPolicy::unbounded(Duration::ZERO), Duration::ZERO, Some(3));

        let exit = runner.run(&agent).await.unwrap();
        assert!(matches!(exit, LoopExit::InvocationLimit { invocations: 3 }));
        assert_eq!(agent.calls(), 3);
    }

    #[tokio::test]
    async fn unbounded_loop_survives_recoverable_errors() {
        let agent = Scripted::new(vec![Step::Fail, Step::Fail, Step::Ok, Step::Fail, Step::Ok]);
        let mut runner = InvocationLoop::new(RetryPolicy::unbounded(Duration::ZERO), Duration::ZERO, Some(6));

        let exit = runner.run(&agent).await.unwrap();
        assert!(matches!(exit, LoopExit::InvocationLimit { invocations: 6 }));
        assert_eq!(agent.calls(), 6);
    }

    #[tokio::test]
    async fn failure_bound_counts_consecutive_failures() {
        let agent = Scripted::new(vec![Step::Fail, Step::Ok, Step::Fail, Step::Fail, Step::Ok]);
        let mut runner = InvocationLoop::new(RetryPolicy::fixed(2, Duration::ZERO), Duration::ZERO, None);

        let err = runner.run(&agent).await.unwrap_err();
        assert!(err.to_string().contains("model timed out"));
        assert_eq!(agent.calls(), 4);
    }

    #[tokio::test]
    async fn lost_session_hands_control_back() {
        let agent = Scripted::new(vec![Step::Ok, Step::Disconnect]);
        let mut runner = InvocationLoop::new(RetryPolicy::fixed(1, Duration::ZERO), Duration::ZERO, Some(10));

        let exit = runner.run(&agent).await.unwrap();
        assert!(matches!(exit, LoopExit::SessionLost(_)));
        assert_eq!(runner.invocations(), 2);

        // The count carries over once the session is back.
        let exit = runner.run(&agent).await.unwrap();
        assert!(matches!(exit, LoopExit::InvocationLimit { invocations: 10 }));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failure_details_are_logged_at_info_level() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let agent = Scripted::new(vec![Step::Fail]);
        let mut runner = InvocationLoop::new(RetryPolicy::fixed(1, Duration::ZERO), Duration::ZERO, None);
        assert!(runner.run(&agent).await.is_err());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Error in agent loop: model timed out"));
        assert!(output.contains("Error details:"));
    }
}
