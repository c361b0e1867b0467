//! CLI command handling
//!
//! Builds the runner from configuration and flags, runs the command, and
//! writes the report.

use std::path::Path;
use std::sync::Arc;

use crate::catalog::CatalogClient;
use crate::commands::{Commands, GlobalArgs};
use crate::common::config::ms;
use crate::common::{normalize_base_url, Config, Error, Result};
use crate::driver::DriverLauncher;
use crate::executor::ScenarioExecutor;
use crate::interpreter::Interpreter;
use crate::orchestrator::{Orchestrator, RunRequest};
use crate::report::{print_summary, RunReport};
use crate::scenario::variables::parse_assignment;
use crate::scenario::{ScenarioResult, Variables};

/// Dispatch a CLI command
///
/// Returns whether every scenario passed.
pub async fn dispatch(command: Commands, globals: &GlobalArgs) -> Result<bool> {
    let config = load_config(globals)?;

    match command {
        Commands::All {
            base_url,
            auth_state_path,
            feature_path,
            vars,
            labels,
        } => {
            let overrides = parse_vars(&vars)?;
            let orchestrator = build_orchestrator(&config, &auth_state_path)?;
            let request = RunRequest {
                base_url: base_url.clone(),
                feature_path,
                labels,
                overrides,
            };
            let results = orchestrator.run_all(&request).await?;
            finish(&normalize_base_url(&base_url), &results, &globals.output)
        }

        Commands::Single {
            base_url,
            auth_state_path,
            scenario_path,
            vars,
        } => {
            let overrides = parse_vars(&vars)?;
            let orchestrator = build_orchestrator(&config, &auth_state_path)?;
            let result = orchestrator
                .run_single(&base_url, &scenario_path, &overrides)
                .await?;
            finish(&normalize_base_url(&base_url), &[result], &globals.output)
        }
    }
}

/// Config file plus flag overrides
fn load_config(globals: &GlobalArgs) -> Result<Config> {
    let mut config = match &globals.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(catalog) = &globals.catalog {
        config.catalog.base_url = catalog.clone();
    }
    if let Some(workers) = globals.workers {
        if workers == 0 {
            return Err(Error::Config("--workers must be at least 1".to_string()));
        }
        config.run.max_workers = workers;
    }
    if globals.headed {
        config.driver.headless = false;
    }
    Ok(config)
}

fn parse_vars(vars: &[String]) -> Result<Variables> {
    vars.iter()
        .map(|raw| parse_assignment(raw).map_err(|e| Error::Config(format!("--var: {}", e))))
        .collect()
}

fn build_orchestrator(config: &Config, auth_state_path: &Path) -> Result<Orchestrator> {
    let interpreter = Arc::new(Interpreter::from_config(config)?);
    let executor = ScenarioExecutor::new(interpreter, auth_state_path.to_path_buf())
        .with_screenshot_dir(config.run.screenshot_dir.clone())
        .with_default_timeout(ms(config.run.default_timeout_ms));
    let launcher = DriverLauncher::from_config(&config.driver)?;
    let source = CatalogClient::from_config(&config.catalog);

    Ok(
        Orchestrator::new(Arc::new(source), Arc::new(launcher), Arc::new(executor))
            .with_max_workers(config.run.max_workers)
            .with_conflict_namespaces(config.run.conflict_namespaces.clone()),
    )
}

fn finish(base_url: &str, results: &[ScenarioResult], output: &Path) -> Result<bool> {
    print_summary(base_url, results);
    RunReport::new(base_url, results).write(output)?;
    println!("Report: {}", output.display());
    Ok(results.iter().all(ScenarioResult::passed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&["a=1".to_string(), "b=x=y".to_string()]).unwrap();
        assert_eq!(vars["a"], "1");
        assert_eq!(vars["b"], "x=y");
        assert!(matches!(
            parse_vars(&["novalue".to_string()]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[run]\nmax_workers = 2\n").unwrap();

        let globals = GlobalArgs {
            config: Some(path),
            workers: Some(6),
            headed: true,
            catalog: Some("https://mirror.example.com".to_string()),
            ..GlobalArgs::default()
        };
        let config = load_config(&globals).unwrap();
        assert_eq!(config.run.max_workers, 6);
        assert!(!config.driver.headless);
        assert_eq!(config.catalog.base_url, "https://mirror.example.com");

        let zero = GlobalArgs {
            workers: Some(0),
            ..globals
        };
        assert!(load_config(&zero).is_err());
    }
}
