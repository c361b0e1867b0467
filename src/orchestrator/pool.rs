//! Browser worker pool
//!
//! Tasks are dealt round-robin to `min(max_workers, tasks)` workers. Each
//! worker launches its own browser, runs its batch strictly in order, and
//! closes the browser. Results land in the slot of the task's submission
//! index, so the output order never depends on timing.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::browser::BrowserLauncher;
use crate::executor::ScenarioExecutor;
use crate::scenario::ScenarioResult;

use super::Task;

/// Indices of the tasks each worker runs
pub fn partition(task_count: usize, max_workers: usize) -> Vec<Vec<usize>> {
    let workers = max_workers.min(task_count);
    let mut batches = vec![Vec::new(); workers];
    for i in 0..task_count {
        batches[i % workers].push(i);
    }
    batches
}

/// Run tasks on a pool of browsers; one result per task, in task order
pub async fn run_pool(
    launcher: Arc<dyn BrowserLauncher>,
    executor: Arc<ScenarioExecutor>,
    tasks: Vec<Task>,
    max_workers: usize,
) -> Vec<ScenarioResult> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let tasks = Arc::new(tasks);
    let batches = partition(tasks.len(), max_workers.max(1));
    tracing::info!(tasks = tasks.len(), workers = batches.len(), "Starting workers");

    let handles = batches.into_iter().enumerate().map(|(worker, batch)| {
        let launcher = launcher.clone();
        let executor = executor.clone();
        let tasks = tasks.clone();
        tokio::spawn(run_worker(worker, launcher, executor, tasks, batch))
    });

    let mut slots: Vec<Option<ScenarioResult>> = vec![None; tasks.len()];
    for joined in join_all(handles).await {
        match joined {
            Ok(results) => {
                for (index, result) in results {
                    slots[index] = Some(result);
                }
            }
            Err(e) => tracing::error!(error = %e, "Worker task failed"),
        }
    }

    slots
        .into_iter()
        .zip(tasks.iter())
        .map(|(slot, task)| {
            slot.unwrap_or_else(|| {
                ScenarioResult::not_started(&task.scenario, "Worker stopped unexpectedly".to_string())
            })
        })
        .collect()
}

async fn run_worker(
    worker: usize,
    launcher: Arc<dyn BrowserLauncher>,
    executor: Arc<ScenarioExecutor>,
    tasks: Arc<Vec<Task>>,
    batch: Vec<usize>,
) -> Vec<(usize, ScenarioResult)> {
    let mut browser = match launcher.launch().await {
        Ok(browser) => browser,
        Err(e) => {
            tracing::error!(worker, error = %e, "Browser launch failed");
            let error = format!("Browser launch failed: {}", e);
            return batch
                .into_iter()
                .map(|i| (i, ScenarioResult::not_started(&tasks[i].scenario, error.clone())))
                .collect();
        }
    };

    let mut results = Vec::with_capacity(batch.len());
    for i in batch {
        let task = &tasks[i];
        let result = executor
            .run(browser.as_mut(), &task.scenario, &task.variables)
            .await;
        results.push((i, result));
    }

    if let Err(e) = browser.close().await {
        tracing::warn!(worker, error = %e, "Failed to close browser");
    }
    results
}
