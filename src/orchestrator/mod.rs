//! Run orchestration
//!
//! Turns a feature selection into scenario results: fetch the catalog,
//! select and guard, build per-scenario variables, then schedule.
//!
//! Scheduling depends on the feature's namespace. In a conflict-sensitive
//! namespace the backend keeps one open consultation per account, so every
//! scenario that may create one runs sequentially on a single browser.
//! Edge cases only inspect the UI; they run in parallel after one cleanup
//! pass has cleared leftover state. Everything else runs on the pool.

pub mod filter;
pub mod pool;

use std::sync::Arc;

use colored::Colorize;

use crate::browser::BrowserLauncher;
use crate::catalog::ScenarioSource;
use crate::common::{normalize_base_url, Result};
use crate::executor::ScenarioExecutor;
use crate::interpreter::cancel_all;
use crate::scenario::{ScenarioDefinition, ScenarioResult, Variables};

pub use filter::{check_conflict, matches_labels, select, EDGE_CASE, HAPPY_PATH};
pub use pool::run_pool;

/// A scenario ready to run
#[derive(Debug, Clone)]
pub struct Task {
    pub scenario: ScenarioDefinition,
    pub variables: Variables,
    /// Labels from the index entry
    pub labels: Vec<String>,
}

impl Task {
    pub fn is_edge_case(&self) -> bool {
        self.labels.iter().any(|l| l == EDGE_CASE)
    }
}

/// Variables for one scenario
///
/// The scenario's defaults fill in names not set yet; `baseUrl` is never
/// taken from defaults. Command-line overrides win over both.
pub fn build_variables(base_url: &str, defaults: &Variables, overrides: &Variables) -> Variables {
    let mut variables = defaults.clone();
    variables.insert("baseUrl".to_string(), base_url.to_string());
    variables.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    variables
}

/// What `run_all` should run
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub base_url: String,
    /// Index path prefix, e.g. `counsel/`
    pub feature_path: String,
    /// Label filter terms
    pub labels: Vec<String>,
    /// `--var` assignments
    pub overrides: Variables,
}

/// Ties the catalog, the browsers and the executor together
pub struct Orchestrator {
    source: Arc<dyn ScenarioSource>,
    launcher: Arc<dyn BrowserLauncher>,
    executor: Arc<ScenarioExecutor>,
    max_workers: usize,
    conflict_namespaces: Vec<String>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ScenarioSource>,
        launcher: Arc<dyn BrowserLauncher>,
        executor: Arc<ScenarioExecutor>,
    ) -> Self {
        Self {
            source,
            launcher,
            executor,
            max_workers: 4,
            conflict_namespaces: vec!["counsel".to_string()],
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_conflict_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.conflict_namespaces = namespaces;
        self
    }

    fn is_conflict_sensitive(&self, feature_path: &str) -> bool {
        self.conflict_namespaces
            .iter()
            .any(|ns| !ns.is_empty() && feature_path.starts_with(ns.as_str()))
    }

    /// Run every selected scenario of a feature
    pub async fn run_all(&self, request: &RunRequest) -> Result<Vec<ScenarioResult>> {
        let index = self.source.fetch_index().await?;
        let selected = select(&index, &request.feature_path, &request.labels);
        check_conflict(&selected)?;

        if selected.is_empty() {
            tracing::warn!(
                feature = %request.feature_path,
                labels = ?request.labels,
                "No scenarios to run"
            );
            println!("No scenarios to run.");
            return Ok(Vec::new());
        }

        let base_url = self.base_url(&request.base_url);

        let mut tasks = Vec::with_capacity(selected.len());
        for meta in &selected {
            let scenario = self.source.fetch_scenario(&meta.path).await?;
            let variables = build_variables(&base_url, &scenario.defaults, &request.overrides);
            tasks.push(Task {
                scenario,
                variables,
                labels: meta.labels.clone(),
            });
        }

        if !self.is_conflict_sensitive(&request.feature_path) {
            println!(
                "\nRunning {} scenarios on up to {} browsers",
                tasks.len(),
                self.max_workers.min(tasks.len())
            );
            return Ok(self.run_tasks(tasks, self.max_workers).await);
        }

        let (edge, sequential): (Vec<Task>, Vec<Task>) =
            tasks.into_iter().partition(Task::is_edge_case);
        let mut results = Vec::new();

        if !sequential.is_empty() {
            println!(
                "\n[sequential] {} scenarios on one browser",
                sequential.len()
            );
            results.extend(self.run_tasks(sequential, 1).await);
        }

        if !edge.is_empty() {
            println!(
                "\n[parallel] {} edge cases on up to {} browsers",
                edge.len(),
                self.max_workers.min(edge.len())
            );
            self.pre_cleanup(&base_url).await;
            results.extend(self.run_tasks(edge, self.max_workers).await);
        }

        Ok(results)
    }

    /// Run one scenario document
    pub async fn run_single(
        &self,
        base_url: &str,
        scenario_path: &str,
        overrides: &Variables,
    ) -> Result<ScenarioResult> {
        let scenario = self.source.fetch_scenario(scenario_path).await?;
        let base_url = self.base_url(base_url);
        let variables = build_variables(&base_url, &scenario.defaults, overrides);
        let task = Task {
            scenario: scenario.clone(),
            variables,
            labels: scenario.labels.clone(),
        };
        let result = self
            .run_tasks(vec![task], 1)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                ScenarioResult::not_started(&scenario, "Scenario was not run".to_string())
            });
        Ok(result)
    }

    fn base_url(&self, base_url: &str) -> String {
        let normalized = normalize_base_url(base_url);
        if normalized.trim_end_matches('/') != base_url.trim_end_matches('/') {
            tracing::info!(from = %base_url, to = %normalized, "Upgraded base URL to HTTPS");
        }
        normalized
    }

    async fn run_tasks(&self, tasks: Vec<Task>, workers: usize) -> Vec<ScenarioResult> {
        run_pool(
            self.launcher.clone(),
            self.executor.clone(),
            tasks,
            workers,
        )
        .await
    }

    /// Cancel leftover consultations once before the edge cases
    ///
    /// Failures are reported and otherwise ignored.
    async fn pre_cleanup(&self, base_url: &str) {
        let rule = "=".repeat(50);
        println!("\n{}\n{}\n{}", rule, "[setup] Cancel existing consultations".bold(), rule);

        match self.cleanup_once(base_url).await {
            Ok(0) => println!("  [{}] nothing to cancel", "OK".green()),
            Ok(n) => println!("  [{}] {} cancelled", "OK".green(), n),
            Err(e) => {
                tracing::warn!(error = %e, "Pre-run cleanup failed");
                println!("  [{}] cleanup failed: {}", "FAIL".red(), e);
            }
        }
    }

    async fn cleanup_once(&self, base_url: &str) -> Result<u32> {
        let mut browser = self.launcher.launch().await?;
        let cleaned = async {
            let mut session = browser
                .new_session(self.executor.session_options(true))
                .await?;
            let cancelled = cancel_all(self.executor.interpreter(), session.as_mut(), base_url).await;
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "Failed to close cleanup session");
            }
            cancelled
        }
        .await;
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "Failed to close cleanup browser");
        }
        cleaned
    }
}
