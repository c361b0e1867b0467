//! Configuration file handling

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{config_path, default_screenshot_dir};
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Remote scenario catalog
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Browser driver bridge
    #[serde(default)]
    pub driver: DriverConfig,

    /// Scheduling settings
    #[serde(default)]
    pub run: RunConfig,

    /// Settle and wait intervals used by step actions
    #[serde(default)]
    pub timing: Timing,

    /// Extra client-side store handles, tag -> global name; an empty name
    /// means `__{TAG}_STORE__`
    #[serde(default)]
    pub stores: BTreeMap<String, String>,

    /// Conventions of the application under test
    #[serde(default)]
    pub app: AppConfig,
}

/// Remote scenario catalog settings
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Base URL that serves `index.json` and the scenario documents
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// User-Agent header sent with every catalog request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://hj8902.github.io/instech_scenarios/scenarios".to_string()
}

fn default_user_agent() -> String {
    "scenario-runner".to_string()
}

/// Browser driver bridge settings
///
/// No bridge ships with this crate. `command` names an external program
/// that wraps a browser automation library; the protocol it must speak is
/// described under "Bridge contract" in [`crate::driver`].
#[derive(Debug, Deserialize, Clone)]
pub struct DriverConfig {
    /// Executable speaking the driver protocol on stdio
    #[serde(default = "default_driver_command")]
    pub command: String,

    /// Additional arguments to pass to the driver
    #[serde(default)]
    pub args: Vec<String>,

    /// Launch browsers without a window
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Timeout for a single driver request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: default_driver_command(),
            args: Vec::new(),
            headless: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_driver_command() -> String {
    "playwright-bridge".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    120
}

impl DriverConfig {
    /// Resolve the driver executable
    ///
    /// Absolute or relative paths are taken as-is, bare names are searched on PATH
    pub fn resolve_command(&self) -> Result<PathBuf> {
        let path = Path::new(&self.command);
        if path.components().count() > 1 {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(Error::DriverNotFound {
                command: self.command.clone(),
            });
        }
        which::which(&self.command).map_err(|_| Error::DriverNotFound {
            command: self.command.clone(),
        })
    }
}

/// Scheduling settings
#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Maximum number of browsers running at once
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Feature path prefixes whose scenarios mutate shared backend state
    #[serde(default = "default_conflict_namespaces")]
    pub conflict_namespaces: Vec<String>,

    /// Where step screenshots are written
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    /// Default timeout for page operations, in milliseconds
    #[serde(default = "default_page_timeout")]
    pub default_timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            conflict_namespaces: default_conflict_namespaces(),
            screenshot_dir: default_screenshot_dir(),
            default_timeout_ms: default_page_timeout(),
        }
    }
}

fn default_max_workers() -> usize {
    4
}

fn default_conflict_namespaces() -> Vec<String> {
    vec!["counsel".to_string()]
}

fn default_page_timeout() -> u64 {
    10_000
}

/// Settle and wait intervals in milliseconds
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timing {
    /// Pause after fill/clear/blur/click so reactive state can commit
    pub settle_ms: u64,
    /// Per-alternative wait in `expect visible`
    pub visible_timeout_ms: u64,
    /// Re-check delay in `expect hidden`
    pub hidden_recheck_ms: u64,
    /// Attach wait in `expect enabled/disabled`
    pub attach_timeout_ms: u64,
    /// Selector wait in `waitFor`
    pub wait_for_timeout_ms: u64,
    /// Default timeout of `waitForUrl`
    pub wait_for_url_timeout_ms: u64,
    /// URL polling interval of `waitForUrl`
    pub url_poll_ms: u64,
    /// Fixed wait of `waitForResponse`
    pub response_wait_ms: u64,
    /// Pause before looking for the consent dialog
    pub terms_open_ms: u64,
    /// Pause after ticking each consent checkbox
    pub terms_checkbox_ms: u64,
    /// Pause before pressing the agree button
    pub terms_before_agree_ms: u64,
    /// Pause after pressing the agree button
    pub terms_after_agree_ms: u64,
    /// How long one retry attempt waits for the intercepted call
    pub retry_response_ms: u64,
    /// Pause between retry attempts
    pub retry_backoff_ms: u64,
    /// Pause after the history view loads
    pub cleanup_settle_ms: u64,
    /// Wait for a cancel or confirm control to appear
    pub cleanup_control_timeout_ms: u64,
    /// Pause after pressing a cancel control
    pub cleanup_click_ms: u64,
    /// Pause after confirming a cancellation
    pub cleanup_confirm_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_ms: 200,
            visible_timeout_ms: 5_000,
            hidden_recheck_ms: 1_000,
            attach_timeout_ms: 5_000,
            wait_for_timeout_ms: 10_000,
            wait_for_url_timeout_ms: 30_000,
            url_poll_ms: 100,
            response_wait_ms: 3_000,
            terms_open_ms: 1_000,
            terms_checkbox_ms: 300,
            terms_before_agree_ms: 500,
            terms_after_agree_ms: 1_000,
            retry_response_ms: 1_500,
            retry_backoff_ms: 500,
            cleanup_settle_ms: 1_000,
            cleanup_control_timeout_ms: 3_000,
            cleanup_click_ms: 500,
            cleanup_confirm_ms: 1_500,
        }
    }
}

/// Milliseconds to a Duration
pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Conventions of the application under test
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// URL fragment that means the session expired and we were sent to login
    pub login_marker: String,
    /// History view listing cancelable items
    pub history_path: String,
    /// Control that starts cancelling one history item
    pub cancel_selector: String,
    /// Modal dialog shown while cancelling
    pub cancel_modal_selector: String,
    /// Confirm control inside the cancel modal
    pub cancel_confirm_selector: String,
    /// Upper bound on cancellations in one cleanup pass
    pub cancel_max_attempts: u32,
    /// Modal consent dialog
    pub terms_dialog_selector: String,
    /// Control clicked by `retryUntilGa` when the step does not name one
    pub retry_click_selector: String,
    /// Network call intercepted by `retryUntilGa` when the step does not name one
    pub retry_route_pattern: String,
    /// Attempt cap of `retryUntilGa` when the step does not set one
    pub retry_max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            login_marker: "/web-login".to_string(),
            history_path: "/car-insurance/history".to_string(),
            cancel_selector: "button:has-text('상담 취소하기')".to_string(),
            cancel_modal_selector: "[role='dialog'], [aria-modal='true']".to_string(),
            cancel_confirm_selector: "button:has-text('상담 취소')".to_string(),
            cancel_max_attempts: 10,
            terms_dialog_selector: "[role='dialog'][aria-modal='true']".to_string(),
            retry_click_selector: "button:has-text('확인했어요')".to_string(),
            retry_route_pattern: "**/available-ga**".to_string(),
            retry_max_attempts: 20,
        }
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        if config.run.max_workers == 0 {
            return Err(Error::ConfigParse(
                "run.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
