//! Step action interpreter
//!
//! Every action kind is its own type implementing [`StepAction`]; the
//! [`Action`] enum ties them together so dispatch is an exhaustive match.
//!
//! An action returns `Ok(Outcome)` for anything it can judge itself,
//! including failed assertions and bad parameters. `Err` is reserved for the
//! browser throwing underneath it; the scenario executor turns those into
//! failing steps.

mod actions;
mod cleanup;
mod expect;
mod input;
mod manual;
mod navigation;
mod retry;
mod storage;
mod store;
pub mod stores;
mod terms;
mod wait;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::browser::Session;
use crate::common::config::{ms, AppConfig, Timing};
use crate::common::{Config, Result};
use crate::scenario::{Status, StepDefinition, StepResult, Variables};

pub use actions::{Action, ParsedStep};
pub use cleanup::{cancel_all, CancelExistingCounsel};
pub use expect::Expect;
pub use input::{Blur, Clear, Click, Fill};
pub use manual::{ManualAction, Marker};
pub use navigation::{Navigate, Screenshot};
pub use retry::RetryUntilGa;
pub use storage::{SaveState, SetSessionStorage};
pub use store::{FetchAndInjectUserInfo, InjectStoreData, InjectUserInfo};
pub use stores::StoreRegistry;
pub use terms::{HandleTermsAgreement, TermsOutcome};
pub use wait::{UrlMatcher, WaitFor, WaitForNavigation, WaitForResponse, WaitForTimeout, WaitForUrl};

/// Mutable state of one scenario run, handed to each step
pub struct ExecutionContext<'a> {
    /// The scenario's isolated browser session
    pub session: &'a mut dyn Session,
    /// Resolved variables
    pub variables: &'a Variables,
    /// 1-based number of the step being executed
    pub step_num: usize,
    /// Screenshot path prefix; `None` disables step screenshots
    pub screenshot_prefix: Option<&'a Path>,
    /// Where `saveState` writes and authenticated sessions read
    pub auth_state_path: &'a Path,
}

/// What an action observed
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: Status,
    /// Appended to the step description
    pub detail: Option<String>,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
}

impl Outcome {
    pub fn pass() -> Self {
        Self {
            status: Status::Pass,
            detail: None,
            error: None,
            screenshot: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            error: Some(error.into()),
            ..Self::pass()
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_screenshot(mut self, path: PathBuf) -> Self {
        self.screenshot = Some(path);
        self
    }

    /// Turn into a step result labelled with the step description
    pub fn into_result(self, description: &str) -> StepResult {
        let description = match self.detail {
            Some(detail) => format!("{} ({})", description, detail),
            None => description.to_string(),
        };
        StepResult {
            status: self.status,
            description,
            error: self.error,
            screenshot: self.screenshot,
        }
    }
}

/// A single executable action kind
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome>;
}

/// Executes steps against a session
///
/// Holds only read-only settings; one interpreter is shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    pub timing: Timing,
    pub app: AppConfig,
    pub stores: StoreRegistry,
}

impl Interpreter {
    pub fn new(timing: Timing, app: AppConfig, stores: StoreRegistry) -> Self {
        Self {
            timing,
            app,
            stores,
        }
    }

    /// Interpreter configured from the config file
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.timing.clone(),
            config.app.clone(),
            StoreRegistry::with_entries(&config.stores)?,
        ))
    }

    /// Execute one (already substituted) step
    pub async fn execute(
        &self,
        step: &StepDefinition,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<StepResult> {
        let outcome = match Action::parse(step) {
            ParsedStep::Known(action) => {
                tracing::debug!(step = ctx.step_num, kind = action.kind(), "Executing step");
                action.execute(self, ctx).await?
            }
            ParsedStep::Unknown(kind) => Outcome::fail(format!("Unknown action: '{}'", kind)),
            ParsedStep::Invalid { kind, message } => {
                Outcome::fail(format!("Invalid parameters for '{}': {}", kind, message))
            }
        };
        Ok(outcome.into_result(step.label()))
    }

    /// Sleep for a configured number of milliseconds
    pub(crate) async fn pause(&self, millis: u64) {
        if millis > 0 {
            tokio::time::sleep(ms(millis)).await;
        }
    }

    /// Pause after a UI mutation so reactive state can commit
    pub(crate) async fn settle(&self) {
        self.pause(self.timing.settle_ms).await;
    }
}
