//! Coral endpoint URL construction.

use url::Url;

use crate::config::CoralConfig;

/// Connection-time identity of this agent on the coordination server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub description: String,
    pub wait_for_agents: Option<u32>,
}

impl AgentIdentity {
    pub fn from_config(config: &CoralConfig) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            description: config.agent_description.clone(),
            wait_for_agents: config.wait_for_agents,
        }
    }

    /// Query parameters in the order the server expects them.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(3);
        if let Some(count) = self.wait_for_agents {
            params.push(("waitForAgents", count.to_string()));
        }
        params.push(("agentId", self.agent_id.clone()));
        params.push(("agentDescription", self.description.clone()));
        params
    }
}

/// Append `params` to `base` using form encoding, keeping insertion order.
///
/// Query parameters already present on `base` are preserved ahead of the new ones.
pub fn build_endpoint_url<K, V>(base: &str, params: &[(K, V)]) -> Result<Url, url::ParseError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = Url::parse(base)?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key.as_ref(), value.as_ref());
        }
    }
    Ok(url)
}

/// Fully qualified SSE URL for `config`.
pub fn endpoint_url(config: &CoralConfig) -> Result<Url, url::ParseError> {
    build_endpoint_url(
        &config.sse_url,
        &AgentIdentity::from_config(config).query_params(),
    )
}
