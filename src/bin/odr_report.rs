//! One-shot report generation.
//!
//! Usage: `odr-report [topic...]`. Writes the report under the configured
//! output directory and prints its path.

use std::sync::Arc;

use odr_agent::config::ResearchConfig;
use odr_agent::logging::init_logging;
use odr_agent::research::{LangGraphWorkflow, ReportGenerator};
use tracing::info;

const DEFAULT_TOPIC: &str = "What is Model Context Protocol?";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let topic = if args.is_empty() {
        DEFAULT_TOPIC.to_string()
    } else {
        args.join(" ")
    };

    let config = ResearchConfig::from_env()?;
    let workflow = Arc::new(LangGraphWorkflow::new(&config.graph_url, config.assistant_id.clone())?);
    let generator = ReportGenerator::new(workflow, config);

    info!("Generating report on: {}", topic);
    let report = generator.generate(&topic).await?;
    info!("Report {} written ({} bytes)", report.id, report.content.len());
    println!("{}", report.path.display());

    Ok(())
}
