//! CLI command definitions
//!
//! Defines the clap commands for the scenario runner.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run every scenario of a feature
    All {
        /// Base URL of the application under test
        base_url: String,

        /// Saved authenticated session (read by requiresAuth scenarios, written by saveState)
        auth_state_path: PathBuf,

        /// Index path prefix selecting the feature, e.g. counsel/
        feature_path: String,

        /// Variable override, can be repeated: --var carNumber=12가3456
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Label filter, can be repeated (AND); commas inside one value mean OR
        #[arg(long = "label", value_name = "LABELS")]
        labels: Vec<String>,
    },

    /// Run a single scenario document
    Single {
        /// Base URL of the application under test
        base_url: String,

        /// Saved authenticated session
        auth_state_path: PathBuf,

        /// Scenario document path in the catalog, e.g. counsel/book-call.json
        scenario_path: String,

        /// Variable override, can be repeated
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },
}

/// Flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (default: the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog base URL, overrides [catalog].base_url
    #[arg(long, global = true)]
    pub catalog: Option<String>,

    /// Maximum parallel browsers, overrides [run].max_workers
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Where to write the JSON report
    #[arg(long, global = true, default_value = "scenario-results.json")]
    pub output: PathBuf,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Show browser windows
    #[arg(long, global = true)]
    pub headed: bool,
}
