//! # ODR Agent
//!
//! A Coral agent that writes research reports for other agents.
//!
//! This library provides:
//! - An MCP-over-SSE client for the Coral coordination server
//! - A tool-based agent loop driven by an OpenAI-compatible LLM
//! - The `open_deepresearch` tool, backed by an `open_deep_research` graph
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Wait for a mention from another agent (`wait_for_mentions`)
//! 2. Pick a tool for the instruction and call it
//! 3. Reply in the same thread (`send_message`)
//! 4. Repeat, reconnecting to Coral when the session drops
//!
//! ## Example
//!
//! ```rust,ignore
//! use odr_agent::{agent::run_agent, config::Config};
//!
//! let config = Config::from_env()?;
//! run_agent(&config).await?;
//! ```

pub mod agent;
pub mod config;
pub mod coral;
pub mod llm;
pub mod logging;
pub mod research;
pub mod retry;
pub mod tools;

pub use config::Config;
