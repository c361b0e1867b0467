//! Waiting steps
//!
//! These always pass unless the wait itself times out, which surfaces as an
//! error like any other browser failure.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::time::Instant;

use crate::browser::{ElementState, LoadState, Locator};
use crate::common::config::ms;
use crate::common::{Error, Result};

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

/// Wait until the network is idle
#[derive(Debug, Clone, Deserialize)]
pub struct WaitForNavigation {}

#[async_trait]
impl StepAction for WaitForNavigation {
    async fn execute(
        &self,
        _interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        ctx.session
            .wait_for_load_state(LoadState::NetworkIdle)
            .await?;
        Ok(Outcome::pass())
    }
}

fn default_state() -> ElementState {
    ElementState::Visible
}

/// Wait for an element to reach a state
#[derive(Debug, Clone, Deserialize)]
pub struct WaitFor {
    pub selector: String,
    #[serde(default = "default_state")]
    pub state: ElementState,
}

#[async_trait]
impl StepAction for WaitFor {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let target = Locator::new(self.selector.as_str()).first();
        ctx.session
            .wait_for(&target, self.state, ms(interpreter.timing.wait_for_timeout_ms))
            .await?;
        Ok(Outcome::pass())
    }
}

fn default_timeout() -> u64 {
    1_000
}

/// Fixed pause
#[derive(Debug, Clone, Deserialize)]
pub struct WaitForTimeout {
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

#[async_trait]
impl StepAction for WaitForTimeout {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        _ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        interpreter.pause(self.timeout).await;
        Ok(Outcome::pass())
    }
}

/// Give an expected API response time to arrive
///
/// The pattern is informational; the wait is a fixed interval.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForResponse {
    #[serde(default)]
    pub url_pattern: String,
}

#[async_trait]
impl StepAction for WaitForResponse {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        _ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        tracing::debug!(pattern = %self.url_pattern, "Waiting for response");
        interpreter.pause(interpreter.timing.response_wait_ms).await;
        Ok(Outcome::pass())
    }
}

/// Wait until the URL matches a glob-style pattern
#[derive(Debug, Clone, Deserialize)]
pub struct WaitForUrl {
    pub pattern: String,
    /// Substring that must not appear in the URL
    #[serde(default)]
    pub exclude: Option<String>,
    /// Milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[async_trait]
impl StepAction for WaitForUrl {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let matcher = match UrlMatcher::new(&self.pattern, self.exclude.as_deref()) {
            Ok(m) => m,
            Err(e) => return Ok(Outcome::fail(e)),
        };
        let timeout_ms = self
            .timeout
            .unwrap_or(interpreter.timing.wait_for_url_timeout_ms);
        let deadline = Instant::now() + ms(timeout_ms);

        loop {
            let url = ctx.session.url().await?;
            if matcher.matches(&url) {
                return Ok(Outcome::pass());
            }
            if Instant::now() >= deadline {
                return Err(Error::UrlTimeout {
                    pattern: self.pattern.clone(),
                    last_url: url,
                    timeout_ms,
                });
            }
            interpreter.pause(interpreter.timing.url_poll_ms.max(1)).await;
        }
    }
}

/// URL test used by `waitForUrl`
///
/// `**` in the pattern matches anything; the rest is a regular expression
/// searched anywhere in the URL.
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    pattern: Regex,
    exclude: Option<String>,
}

impl UrlMatcher {
    pub fn new(pattern: &str, exclude: Option<&str>) -> std::result::Result<Self, String> {
        let translated = pattern.replace("**", ".*");
        let pattern = Regex::new(&translated)
            .map_err(|e| format!("Invalid URL pattern '{}': {}", pattern, e))?;
        Ok(Self {
            pattern,
            exclude: exclude.filter(|e| !e.is_empty()).map(str::to_string),
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if url.contains(exclude.as_str()) {
                return false;
            }
        }
        self.pattern.is_match(url)
    }
}
