//! Scenario execution
//!
//! Runs one scenario start to finish inside its own browser session:
//! substitute, interpret, stop at the first failing step, close the session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::browser::{Browser, Session, SessionOptions};
use crate::common::{paths, Result};
use crate::interpreter::{ExecutionContext, Interpreter};
use crate::scenario::{ScenarioDefinition, ScenarioResult, StepResult, Variables};

/// Executes scenarios against browsers handed to it
///
/// Read-only once built; one executor is shared by every worker.
#[derive(Debug, Clone)]
pub struct ScenarioExecutor {
    interpreter: Arc<Interpreter>,
    auth_state_path: PathBuf,
    screenshot_dir: Option<PathBuf>,
    default_timeout: Option<Duration>,
}

impl ScenarioExecutor {
    pub fn new(interpreter: Arc<Interpreter>, auth_state_path: PathBuf) -> Self {
        Self {
            interpreter,
            auth_state_path,
            screenshot_dir: None,
            default_timeout: None,
        }
    }

    /// Write step and error screenshots into `dir`
    pub fn with_screenshot_dir(mut self, dir: PathBuf) -> Self {
        self.screenshot_dir = Some(dir);
        self
    }

    /// Default timeout for page operations in each session
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn auth_state_path(&self) -> &Path {
        &self.auth_state_path
    }

    /// Options for a session, optionally seeded with the saved auth state
    pub fn session_options(&self, with_auth: bool) -> SessionOptions {
        SessionOptions {
            storage_state: with_auth.then(|| self.auth_state_path.clone()),
            default_timeout: self.default_timeout,
        }
    }

    /// Run a scenario; never fails, problems end up in the result
    pub async fn run(
        &self,
        browser: &mut dyn Browser,
        scenario: &ScenarioDefinition,
        variables: &Variables,
    ) -> ScenarioResult {
        let prefix = self
            .screenshot_dir
            .as_deref()
            .map(|dir| paths::screenshot_prefix(dir, &scenario.id));
        if let Some(prefix) = &prefix {
            match paths::remove_stale_screenshots(prefix) {
                Ok(0) => {}
                Ok(n) => tracing::debug!(removed = n, "Removed stale screenshots"),
                Err(e) => tracing::warn!(error = %e, "Could not remove stale screenshots"),
            }
        }

        print_header(&scenario.name);
        tracing::info!(id = %scenario.id, steps = scenario.steps.len(), "Running scenario");

        let mut session = match self.open_session(browser, scenario).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(id = %scenario.id, error = %e, "Could not open a session");
                let result = ScenarioResult::not_started(
                    scenario,
                    format!("Could not open a browser session: {}", e),
                );
                for (i, step) in result.steps.iter().enumerate() {
                    print_step(i + 1, step);
                }
                return result;
            }
        };

        let steps = self
            .run_steps(session.as_mut(), scenario, variables, prefix.as_deref())
            .await;

        if let Err(e) = session.close().await {
            tracing::warn!(id = %scenario.id, error = %e, "Failed to close session");
        }

        let result = ScenarioResult::new(scenario, steps);
        tracing::info!(id = %scenario.id, status = ?result.status, "Scenario finished");
        result
    }

    async fn open_session(
        &self,
        browser: &mut dyn Browser,
        scenario: &ScenarioDefinition,
    ) -> Result<Box<dyn Session>> {
        if scenario.requires_auth {
            match browser.new_session(self.session_options(true)).await {
                Ok(session) => return Ok(session),
                Err(e) if e.is_fatal_to_browser() => return Err(e),
                Err(e) => tracing::warn!(
                    path = %self.auth_state_path.display(),
                    error = %e,
                    "Saved auth state unusable, starting a fresh session"
                ),
            }
        }
        browser.new_session(self.session_options(false)).await
    }

    async fn run_steps(
        &self,
        session: &mut dyn Session,
        scenario: &ScenarioDefinition,
        variables: &Variables,
        prefix: Option<&Path>,
    ) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(scenario.steps.len());

        for (i, raw) in scenario.steps.iter().enumerate() {
            let step_num = i + 1;
            let step = raw.substituted(variables);

            let executed = {
                let mut ctx = ExecutionContext {
                    session: &mut *session,
                    variables,
                    step_num,
                    screenshot_prefix: prefix,
                    auth_state_path: &self.auth_state_path,
                };
                self.interpreter.execute(&step, &mut ctx).await
            };

            let result = match executed {
                Ok(result) => result,
                Err(e) => {
                    tracing::debug!(step = step_num, error = %e, "Step threw");
                    let mut failed = StepResult::fail(step.label(), Some(e.to_string()));
                    if let Some(prefix) = prefix {
                        let path = paths::error_screenshot(prefix, step_num);
                        match session.screenshot(&path, true).await {
                            Ok(()) => failed.screenshot = Some(path),
                            Err(e) => tracing::debug!(error = %e, "Error screenshot failed"),
                        }
                    }
                    failed
                }
            };

            print_step(step_num, &result);
            let passed = result.passed();
            results.push(result);
            if !passed {
                break;
            }
        }

        results
    }
}

fn print_header(name: &str) {
    let rule = "=".repeat(50);
    println!("\n{}\n{}\n{}", rule, name.bold(), rule);
}

fn print_step(step_num: usize, result: &StepResult) {
    let icon = if result.passed() {
        "OK".green()
    } else {
        "FAIL".red()
    };
    println!("  [{}] Step {}: {}", icon, step_num, result.description);
    if let Some(error) = &result.error {
        println!("         Error: {}", error);
    }
}
