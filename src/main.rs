//! scenario-runner - replays catalog scenarios against a live web application
//!
//! Scenarios are fetched from a remote catalog and executed step by step in
//! isolated browser sessions driven through a bridge process.

use clap::Parser;
use scenario_runner::commands::{Commands, GlobalArgs};
use scenario_runner::{cli, common};

#[derive(Parser)]
#[command(name = "scenario-runner", about = "Data-driven end-to-end scenario runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_guard = common::logging::init_cli(cli.globals.log_file.as_deref());

    let code = match cli::dispatch(cli.command, &cli.globals).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    // Flush the log file before exiting
    drop(log_guard);
    std::process::exit(code);
}
