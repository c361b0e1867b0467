//! Browser capability interface
//!
//! The runner never talks to a browser directly. It works against three
//! traits:
//!
//! - [`BrowserLauncher`] starts independent browser instances (one per worker)
//! - [`Browser`] opens isolated sessions (a fresh context with one page)
//! - [`Session`] performs page operations for one scenario
//!
//! Ownership follows the scheduling model: a worker owns its browser by
//! value, and a scenario owns its session exclusively until it closes it.

mod locator;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::Result;

pub use locator::{split_alternatives, Locator};

/// URL of a page that has not navigated anywhere yet
pub const BLANK_URL: &str = "about:blank";

/// Page load milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Element states that can be waited for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    Attached,
    Detached,
    Visible,
    Hidden,
}

/// Boolean element properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementProperty {
    Visible,
    Checked,
    Enabled,
    Disabled,
}

/// Options for a new isolated session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Saved storage state to start from
    pub storage_state: Option<PathBuf>,
    /// Default timeout for page operations
    pub default_timeout: Option<Duration>,
}

/// A network call held by an active route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRoute {
    /// Driver-assigned id used to resolve the call
    pub id: String,
    /// Request URL
    pub url: String,
    /// Status of the upstream response
    pub status: u16,
    /// Body of the upstream response
    pub body: String,
}

/// What to do with an intercepted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Deliver the upstream response to the page
    Fulfill,
    /// Fail the request in the page
    Abort,
}

/// Starts browser instances
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a new, independent browser instance
    async fn launch(&self) -> Result<Box<dyn Browser>>;
}

/// One running browser instance
#[async_trait]
pub trait Browser: Send {
    /// Open an isolated session (new context + page)
    async fn new_session(&mut self, options: SessionOptions) -> Result<Box<dyn Session>>;

    /// Shut the browser down
    async fn close(&mut self) -> Result<()>;
}

/// An isolated browser context with a single page
#[async_trait]
pub trait Session: Send {
    /// Navigate the page
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Wait until the page reaches a load state
    async fn wait_for_load_state(&mut self, state: LoadState) -> Result<()>;

    /// Current page URL
    async fn url(&mut self) -> Result<String>;

    /// Fill an input
    async fn fill(&mut self, locator: &Locator, value: &str) -> Result<()>;

    /// Remove focus from an element
    async fn blur(&mut self, locator: &Locator) -> Result<()>;

    /// Click an element; `force` skips actionability checks
    async fn click(&mut self, locator: &Locator, force: bool) -> Result<()>;

    /// Number of matching elements
    async fn count(&mut self, locator: &Locator) -> Result<usize>;

    /// Read a boolean property of the first match
    async fn query(&mut self, locator: &Locator, property: ElementProperty) -> Result<bool>;

    /// Wait for the first match to reach a state
    async fn wait_for(
        &mut self,
        locator: &Locator,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()>;

    /// Evaluate a function expression in the page with one JSON argument
    async fn evaluate(&mut self, function: &str, arg: Value) -> Result<Value>;

    /// Register a script that runs before any page script on every navigation
    async fn add_init_script(&mut self, script: &str) -> Result<()>;

    /// Write the context's cookies and storage to a file
    async fn save_storage_state(&mut self, path: &Path) -> Result<()>;

    /// Capture a screenshot
    async fn screenshot(&mut self, path: &Path, full_page: bool) -> Result<()>;

    /// Start intercepting calls whose URL matches a glob pattern
    async fn route(&mut self, pattern: &str) -> Result<()>;

    /// Stop intercepting calls for a pattern
    async fn unroute(&mut self, pattern: &str) -> Result<()>;

    /// Next intercepted call, if one arrives within `timeout`
    async fn next_route(&mut self, timeout: Duration) -> Result<Option<InterceptedRoute>>;

    /// Let an intercepted call through or fail it
    async fn resolve_route(&mut self, id: &str, decision: RouteDecision) -> Result<()>;

    /// Close the context and its page
    async fn close(&mut self) -> Result<()>;
}
