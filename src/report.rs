//! Run report
//!
//! The JSON report is the hand-off to whatever renders results for humans;
//! the console summary is printed at the end of every run.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::common::Result;
use crate::scenario::ScenarioResult;

/// Everything a run produced
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport<'a> {
    pub base_url: &'a str,
    pub results: &'a [ScenarioResult],
}

impl<'a> RunReport<'a> {
    pub fn new(base_url: &'a str, results: &'a [ScenarioResult]) -> Self {
        Self { base_url, results }
    }

    /// Write the report as pretty-printed JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), results = self.results.len(), "Wrote report");
        Ok(())
    }
}

/// Pass/fail counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
}

impl Tally {
    pub fn of(results: &[ScenarioResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            passed,
            failed: results.len() - passed,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// One summary line for a scenario
pub fn summary_line(result: &ScenarioResult) -> String {
    let mut line = format!(
        "{} ({}/{} steps)",
        result.name,
        result.steps_passed(),
        result.steps.len()
    );
    if !result.passed() {
        if let Some(step) = result.first_failure() {
            line.push_str(&format!(" - {}", step.description));
            if let Some(error) = &step.error {
                line.push_str(&format!(": {}", error));
            }
        }
    }
    line
}

/// Print the end-of-run summary
pub fn print_summary(base_url: &str, results: &[ScenarioResult]) {
    let rule = "=".repeat(50);
    println!("\n{}", rule);
    println!("{}", "Scenario results".bold());
    println!("Target: {}", base_url);
    println!("{}", rule);

    for result in results {
        let icon = if result.passed() {
            "PASS".green()
        } else {
            "FAIL".red()
        };
        println!("  {} {}", icon, summary_line(result));
    }

    let tally = Tally::of(results);
    println!(
        "\n{} scenarios: {} passed, {} failed",
        tally.total(),
        tally.passed,
        tally.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{ScenarioDefinition, StepResult};
    use serde_json::json;

    fn scenario() -> ScenarioDefinition {
        serde_json::from_value(json!({"id": "s1", "name": "Book a call"})).unwrap()
    }

    #[test]
    fn test_summary_line_names_failure() {
        let result = ScenarioResult::new(
            &scenario(),
            vec![
                StepResult::pass("Open page"),
                StepResult::fail("Click next", Some("timeout".to_string())),
            ],
        );
        assert_eq!(
            summary_line(&result),
            "Book a call (1/2 steps) - Click next: timeout"
        );
    }

    #[test]
    fn test_tally_and_json_shape() {
        let ok = ScenarioResult::new(&scenario(), vec![StepResult::pass("Open page")]);
        let bad = ScenarioResult::new(&scenario(), vec![StepResult::fail("x", None)]);
        let results = vec![ok, bad];
        assert_eq!(Tally::of(&results), Tally { passed: 1, failed: 1 });

        let value = serde_json::to_value(RunReport::new("https://x", &results)).unwrap();
        assert_eq!(value["baseUrl"], "https://x");
        assert_eq!(value["results"][0]["status"], "pass");
        assert_eq!(value["results"][1]["steps"][0]["desc"], "x");
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        RunReport::new("https://x", &[]).write(&path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["results"], json!([]));
    }
}
