//! scenario-runner - data-driven end-to-end scenario runner
//!
//! Scenario documents from a remote catalog describe user flows as lists of
//! steps. The runner interprets each step against an isolated browser
//! session, stops a scenario at its first failing step, and runs many
//! scenarios in parallel on separate browsers.

pub mod browser;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod common;
pub mod driver;
pub mod executor;
pub mod interpreter;
pub mod orchestrator;
pub mod report;
pub mod scenario;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use executor::ScenarioExecutor;
pub use orchestrator::{Orchestrator, RunRequest};
