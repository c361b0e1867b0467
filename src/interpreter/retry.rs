//! Intercept-and-retry until the backend assigns the wanted company
//!
//! Each attempt routes the assignment API, clicks the trigger, and inspects
//! the intercepted response. A matching response is let through to the page;
//! any other response is aborted so the page stays on the confirm sheet and
//! the click can be repeated.
//!
//! Every intercepted call is resolved exactly once. A call that shows up
//! after its attempt gave up waiting is aborted by the next attempt before
//! it clicks, so an attempt only ever judges the call its own click caused.

use async_trait::async_trait;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::browser::{InterceptedRoute, Locator, RouteDecision, Session};
use crate::common::config::ms;
use crate::common::Result;

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryUntilGa {
    /// Wanted company id; a number, or a string holding one after substitution
    #[serde(default)]
    pub target_ga_company_id: Option<Value>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub click_selector: Option<String>,
    #[serde(default)]
    pub route_pattern: Option<String>,
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq)]
enum Attempt {
    Matched { id: i64, name: String },
    Mismatch { id: Option<i64>, name: String },
    NoResponse,
    ClickFailed(String),
}

impl RetryUntilGa {
    /// Target id as an integer
    fn target(&self) -> std::result::Result<i64, String> {
        match &self.target_ga_company_id {
            None | Some(Value::Null) => Err("targetGaCompanyId is not set".to_string()),
            Some(Value::String(s)) if s.trim().is_empty() => {
                Err("targetGaCompanyId is not set".to_string())
            }
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| format!("targetGaCompanyId is not a number: {}", s)),
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| format!("targetGaCompanyId is not an integer: {}", n)),
            Some(other) => Err(format!("targetGaCompanyId is not a number: {}", other)),
        }
    }

    async fn attempt_once(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
        click_selector: &str,
        target: i64,
    ) -> Result<Attempt> {
        let stale = abort_queued(ctx.session).await?;
        if stale > 0 {
            tracing::debug!(stale, "Aborted calls left over from an earlier attempt");
        }

        let trigger = Locator::new(click_selector).first();
        if let Err(e) = ctx.session.click(&trigger, false).await {
            return Ok(Attempt::ClickFailed(e.to_string()));
        }

        let wait = ms(interpreter.timing.retry_response_ms);
        let attempt = match ctx.session.next_route(wait).await? {
            None => Attempt::NoResponse,
            Some(route) => {
                let (id, name) = read_assignment(&route);
                let decision = if id == Some(target) {
                    RouteDecision::Fulfill
                } else {
                    RouteDecision::Abort
                };
                ctx.session.resolve_route(&route.id, decision).await?;
                match id {
                    Some(id) if id == target => Attempt::Matched { id, name },
                    id => Attempt::Mismatch { id, name },
                }
            }
        };

        // Anything queued behind this attempt's call is not judged.
        abort_queued(ctx.session).await?;
        Ok(attempt)
    }
}

/// Abort every intercepted call already waiting; returns how many
async fn abort_queued(session: &mut dyn Session) -> Result<usize> {
    let mut aborted = 0;
    while let Some(route) = session.next_route(Duration::ZERO).await? {
        session.resolve_route(&route.id, RouteDecision::Abort).await?;
        aborted += 1;
    }
    Ok(aborted)
}

/// `data.gaCompanyId` and `data.gaCompanyName` from a response body
fn read_assignment(route: &InterceptedRoute) -> (Option<i64>, String) {
    let Ok(body) = serde_json::from_str::<Value>(&route.body) else {
        return (None, String::new());
    };
    let data = &body["data"];
    let id = match &data["gaCompanyId"] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    let name = data["gaCompanyName"].as_str().unwrap_or_default().to_string();
    (id, name)
}

#[async_trait]
impl StepAction for RetryUntilGa {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let target = match self.target() {
            Ok(t) => t,
            Err(e) => return Ok(Outcome::fail(e)),
        };
        let app = &interpreter.app;
        let max_retries = self.max_retries.unwrap_or(app.retry_max_attempts);
        let click_selector = self
            .click_selector
            .as_deref()
            .unwrap_or(&app.retry_click_selector);
        let pattern = self
            .route_pattern
            .as_deref()
            .unwrap_or(&app.retry_route_pattern);

        for attempt in 1..=max_retries {
            ctx.session.route(pattern).await?;
            let result = self
                .attempt_once(interpreter, ctx, click_selector, target)
                .await;
            // Deregister before looking at how the attempt went.
            let unrouted = ctx.session.unroute(pattern).await;
            let result = result?;
            unrouted?;

            match result {
                Attempt::Matched { id, name } => {
                    return Ok(Outcome::pass().with_detail(format!(
                        "matched on attempt {} (id={}, {})",
                        attempt, id, name
                    )));
                }
                Attempt::ClickFailed(e) => {
                    return Ok(Outcome::fail(format!("click failed: {}", e)));
                }
                Attempt::Mismatch { id, name } => {
                    let id = id.map_or_else(|| "?".to_string(), |id| id.to_string());
                    tracing::info!(attempt, max_retries, id = %id, name = %name, "Assignment mismatch");
                }
                Attempt::NoResponse => {
                    tracing::info!(attempt, max_retries, "No assignment response");
                }
            }
            interpreter.pause(interpreter.timing.retry_backoff_ms).await;
        }

        Ok(Outcome::fail(format!(
            "Target company (id={}) not assigned after {} attempts",
            target, max_retries
        )))
    }
}
