//! ODR Agent - Coral entry point
//!
//! Connects to the Coral server and serves research reports until stopped.

use odr_agent::{agent::run_agent, config::Config, logging::init_logging};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: agent={} model={} graph={}",
        config.coral.agent_id, config.model.name, config.research.graph_url
    );

    run_agent(&config).await?;

    Ok(())
}
