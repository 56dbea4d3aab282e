use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ChatMessage, ChatResponse, LlmClient, TokenUsage, ToolCall};
use crate::config::ModelConfig;

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            temperature: None,
            max_tokens: None,
        })
    }

    pub fn from_config(config: &ModelConfig) -> anyhow::Result<Self> {
        let mut client = Self::new(config.base_url.clone(), config.api_key.clone())?;
        client.temperature = Some(config.temperature);
        client.max_tokens = Some(config.max_tokens);
        Ok(client)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[Value]>,
    ) -> anyhow::Result<ChatResponse> {
        let mut payload = json!({
            "model": model,
            "messages": messages,
        });
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            payload["tools"] = json!(tools);
        }
        if let Some(temperature) = self.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM request failed with {}: {}", status, body));
        }

        let body: CompletionBody = response.json().await.context("Invalid LLM response")?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("LLM response contained no choices"))?;

        if let Some(usage) = &body.usage {
            tracing::debug!(
                "LLM usage: prompt={} completion={}",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            finish_reason: choice.finish_reason,
            usage: body.usage,
        })
    }
}
