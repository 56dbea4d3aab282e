//! Configuration management for the research agent.
//!
//! Configuration is read once at startup from environment variables (a `.env`
//! file in the working directory is loaded first when present):
//! - `CORAL_SSE_URL` - Required. SSE endpoint of the Coral coordination server.
//! - `CORAL_AGENT_ID` - Optional. Agent identifier. Defaults to `open_deepresearch_agent`.
//! - `CORAL_AGENT_DESCRIPTION` - Optional. Capability text advertised to other agents.
//! - `CORAL_WAIT_FOR_AGENTS` - Optional. Number of agents the server waits for.
//! - `CORAL_TIMEOUT_SECS` / `CORAL_SSE_READ_TIMEOUT_SECS` - Optional. Defaults to `600`.
//! - `CORAL_CONNECT_ATTEMPTS` / `CORAL_RETRY_DELAY_SECS` - Optional. Defaults to `3` / `5`.
//! - `WAIT_FOR_MENTIONS_TIMEOUT_MS` - Optional. Defaults to `30000`.
//! - `API_KEY` (or `OPENAI_API_KEY`) - Required. LLM provider key.
//! - `MODEL_NAME`, `MODEL_PROVIDER`, `MODEL_BASE_URL`, `MODEL_TEMPERATURE`, `MODEL_TOKEN` - Optional.
//! - `AGENT_MAX_ITERATIONS`, `AGENT_MAX_INVOCATIONS`, `AGENT_MAX_FAILURES` - Optional.
//! - `AGENT_SUCCESS_DELAY_SECS` / `AGENT_FAILURE_DELAY_SECS` - Optional. Defaults to `1` / `5`.
//! - `ODR_GRAPH_URL`, `ODR_ASSISTANT_ID` - Optional. Research workflow server.
//! - `ODR_SEARCH_API`, `ODR_PLANNER_PROVIDER`, `ODR_PLANNER_MODEL`, `ODR_WRITER_PROVIDER`,
//!   `ODR_WRITER_MODEL`, `ODR_MAX_SEARCH_DEPTH` - Optional. Research thread settings.
//! - `REPORT_OUTPUT_DIR` - Optional. Defaults to `temp`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

pub const DEFAULT_AGENT_ID: &str = "open_deepresearch_agent";

pub const DEFAULT_AGENT_DESCRIPTION: &str = "Open Deep Research agent can perform in-depth web searches, generate structured reports, support human-in-the-loop feedback, and integrate with APIs like Tavily, Linkup, DuckDuckGo, and Azure AI Search, using customizable LLMs for tailored, high-quality research outputs.";

pub const DEFAULT_REPORT_STRUCTURE: &str = "Use this structure to create a report on the user-provided topic:

1. Introduction (no research needed)
- Brief overview of the topic area

2. Main Body Sections:
- Each section should focus on a sub-topic of the user-provided topic

3. Conclusion
- Aim for 1 structural element (either a list or table) that distills the main body sections
- Provide a concise summary of the report";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Coral coordination server connection settings.
#[derive(Debug, Clone)]
pub struct CoralConfig {
    /// SSE endpoint, without the identity query parameters
    pub sse_url: String,

    /// Identifier this agent registers under
    pub agent_id: String,

    /// Free-text capability description shown to other agents
    pub agent_description: String,

    /// Ask the server to hold the session until this many agents joined
    pub wait_for_agents: Option<u32>,

    /// HTTP connect timeout
    pub connect_timeout: Duration,

    /// Maximum silence on the event stream, also used as the request timeout
    pub sse_read_timeout: Duration,

    /// Policy for (re)opening the session
    pub connect_retry: RetryPolicy,

    /// `timeoutMs` the agent is told to pass to `wait_for_mentions`
    pub wait_for_mentions_timeout_ms: u64,
}

impl CoralConfig {
    pub fn new(sse_url: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            sse_url: sse_url.into(),
            agent_id: agent_id.into(),
            agent_description: DEFAULT_AGENT_DESCRIPTION.to_string(),
            wait_for_agents: None,
            connect_timeout: Duration::from_secs(600),
            sse_read_timeout: Duration::from_secs(600),
            connect_retry: RetryPolicy::fixed(3, Duration::from_secs(5)),
            wait_for_mentions_timeout_ms: 30_000,
        }
    }
}

/// LLM provider family, used to pick a default base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAi,
    OpenRouter,
    Other(String),
}

impl ModelProvider {
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Self::Other(_) => None,
        }
    }
}

impl FromStr for ModelProvider {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "openai" => Self::OpenAi,
            "openrouter" => Self::OpenRouter,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Chat model settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub provider: ModelProvider,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Agent executor and invocation loop settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM/tool turns allowed inside one invocation
    pub max_iterations: usize,

    /// Stop the loop after this many invocations (unbounded when `None`)
    pub max_invocations: Option<u64>,

    /// Failure handling between invocations
    pub failure_retry: RetryPolicy,

    /// Pause after a completed invocation
    pub success_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_invocations: None,
            failure_retry: RetryPolicy::unbounded(Duration::from_secs(5)),
            success_delay: Duration::from_secs(1),
        }
    }
}

/// Settings forwarded to the research workflow for every report.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Base URL of the workflow server hosting the research graph
    pub graph_url: String,

    /// Graph (assistant) to run
    pub assistant_id: String,

    pub search_api: String,
    pub planner_provider: String,
    pub planner_model: String,
    pub writer_provider: String,
    pub writer_model: String,
    pub max_search_depth: u32,
    pub report_structure: String,

    /// Directory receiving `research_report_<uuid>.txt` files
    pub output_dir: PathBuf,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            graph_url: "http://127.0.0.1:2024".to_string(),
            assistant_id: "open_deep_research".to_string(),
            search_api: "linkup".to_string(),
            planner_provider: "openai".to_string(),
            planner_model: "gpt-4o-mini".to_string(),
            writer_provider: "openai".to_string(),
            writer_model: "gpt-4o-mini".to_string(),
            max_search_depth: 1,
            report_structure: DEFAULT_REPORT_STRUCTURE.to_string(),
            output_dir: PathBuf::from("temp"),
        }
    }
}

impl ResearchConfig {
    /// Load only the research settings; used by the standalone report binary.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            graph_url: env_or("ODR_GRAPH_URL", defaults.graph_url),
            assistant_id: env_or("ODR_ASSISTANT_ID", defaults.assistant_id),
            search_api: env_or("ODR_SEARCH_API", defaults.search_api),
            planner_provider: env_or("ODR_PLANNER_PROVIDER", defaults.planner_provider),
            planner_model: env_or("ODR_PLANNER_MODEL", defaults.planner_model),
            writer_provider: env_or("ODR_WRITER_PROVIDER", defaults.writer_provider),
            writer_model: env_or("ODR_WRITER_MODEL", defaults.writer_model),
            max_search_depth: env_parse("ODR_MAX_SEARCH_DEPTH")?.unwrap_or(defaults.max_search_depth),
            report_structure: defaults.report_structure,
            output_dir: std::env::var("REPORT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        })
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub coral: CoralConfig,
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub research: ResearchConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `CORAL_SSE_URL` or the API key is not set,
    /// and `ConfigError::InvalidValue` for values that do not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is the normal case in deployments.
        let _ = dotenvy::dotenv();

        let sse_url = std::env::var("CORAL_SSE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("CORAL_SSE_URL".to_string()))?;
        url::Url::parse(&sse_url)
            .map_err(|e| ConfigError::InvalidValue("CORAL_SSE_URL".to_string(), e.to_string()))?;

        let mut coral = CoralConfig::new(sse_url, env_or("CORAL_AGENT_ID", DEFAULT_AGENT_ID.to_string()));
        coral.agent_description = env_or("CORAL_AGENT_DESCRIPTION", coral.agent_description);
        coral.wait_for_agents = env_parse("CORAL_WAIT_FOR_AGENTS")?;
        if let Some(secs) = env_parse("CORAL_TIMEOUT_SECS")? {
            coral.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("CORAL_SSE_READ_TIMEOUT_SECS")? {
            coral.sse_read_timeout = Duration::from_secs(secs);
        }
        let attempts: u32 = env_parse("CORAL_CONNECT_ATTEMPTS")?.unwrap_or(3);
        if attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "CORAL_CONNECT_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let retry_delay = Duration::from_secs(env_parse("CORAL_RETRY_DELAY_SECS")?.unwrap_or(5));
        coral.connect_retry = RetryPolicy::fixed(attempts, retry_delay);
        if let Some(ms) = env_parse("WAIT_FOR_MENTIONS_TIMEOUT_MS")? {
            coral.wait_for_mentions_timeout_ms = ms;
        }

        let api_key = std::env::var("API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| ConfigError::MissingEnvVar("API_KEY".to_string()))?;
        let provider: ModelProvider = env_or("MODEL_PROVIDER", "openai".to_string())
            .parse()
            .unwrap_or(ModelProvider::OpenAi);
        let base_url = match std::env::var("MODEL_BASE_URL") {
            Ok(url) => url,
            Err(_) => provider
                .default_base_url()
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingEnvVar("MODEL_BASE_URL".to_string()))?,
        };
        let model = ModelConfig {
            name: env_or("MODEL_NAME", "gpt-4.1".to_string()),
            provider,
            base_url,
            api_key,
            temperature: env_parse("MODEL_TEMPERATURE")?.unwrap_or(0.1),
            max_tokens: env_parse("MODEL_TOKEN")?.unwrap_or(8000),
        };

        let defaults = AgentConfig::default();
        let failure_delay = Duration::from_secs(env_parse("AGENT_FAILURE_DELAY_SECS")?.unwrap_or(5));
        let failure_retry = match env_parse::<u32>("AGENT_MAX_FAILURES")? {
            Some(0) => {
                return Err(ConfigError::InvalidValue(
                    "AGENT_MAX_FAILURES".to_string(),
                    "must be at least 1".to_string(),
                ))
            }
            Some(max) => RetryPolicy::fixed(max, failure_delay),
            None => RetryPolicy::unbounded(failure_delay),
        };
        let agent = AgentConfig {
            max_iterations: env_parse("AGENT_MAX_ITERATIONS")?.unwrap_or(defaults.max_iterations),
            max_invocations: env_parse("AGENT_MAX_INVOCATIONS")?,
            failure_retry,
            success_delay: env_parse("AGENT_SUCCESS_DELAY_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.success_delay),
        };

        Ok(Self {
            coral,
            model,
            agent,
            research: ResearchConfig::from_env()?,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(sse_url: String, model_base_url: String, output_dir: PathBuf) -> Self {
        Self {
            coral: CoralConfig::new(sse_url, DEFAULT_AGENT_ID),
            model: ModelConfig {
                name: "gpt-4.1".to_string(),
                provider: ModelProvider::OpenAi,
                base_url: model_base_url,
                api_key: "test-key".to_string(),
                temperature: 0.1,
                max_tokens: 8000,
            },
            agent: AgentConfig::default(),
            research: ResearchConfig {
                output_dir,
                ..ResearchConfig::default()
            },
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e)))
        })
        .transpose()
}
