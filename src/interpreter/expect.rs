//! Assertions
//!
//! A failed expectation is a failing outcome, never an error. Messages carry
//! what was expected next to what was seen.

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::{split_alternatives, ElementProperty, ElementState, Locator, Session};
use crate::common::config::ms;
use crate::common::Result;

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

/// `expect` step, discriminated by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Expect {
    /// Current URL contains `value`
    Url {
        #[serde(default)]
        value: String,
    },
    /// Any of the comma-separated selectors becomes visible
    Visible { selector: String },
    /// The selector is absent or invisible
    Hidden { selector: String },
    /// The first match is disabled
    Disabled { selector: String },
    /// The first match is enabled
    Enabled { selector: String },
}

#[async_trait]
impl StepAction for Expect {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let timing = &interpreter.timing;
        match self {
            Expect::Url { value } => {
                let current = ctx.session.url().await?;
                if current.contains(value.as_str()) {
                    Ok(Outcome::pass())
                } else {
                    Ok(Outcome::fail(format!(
                        "URL mismatch: expected '{}', got '{}'",
                        value, current
                    )))
                }
            }

            Expect::Visible { selector } => {
                let timeout = ms(timing.visible_timeout_ms);
                for alternative in split_alternatives(selector) {
                    let target = Locator::new(alternative).first();
                    if ctx
                        .session
                        .wait_for(&target, ElementState::Visible, timeout)
                        .await
                        .is_ok()
                    {
                        return Ok(Outcome::pass());
                    }
                }
                Ok(Outcome::fail(format!(
                    "None visible within {} ms: {}",
                    timing.visible_timeout_ms, selector
                )))
            }

            Expect::Hidden { selector } => {
                let target = Locator::new(selector.as_str());
                // Locate errors count as hidden.
                if is_hidden(ctx.session, &target).await.unwrap_or(true) {
                    return Ok(Outcome::pass());
                }
                interpreter.pause(timing.hidden_recheck_ms).await;
                if is_hidden(ctx.session, &target).await.unwrap_or(true) {
                    return Ok(Outcome::pass());
                }
                Ok(Outcome::fail(format!(
                    "Expected hidden, still visible: {}",
                    selector
                )))
            }

            Expect::Disabled { selector } => {
                check_property(interpreter, ctx, selector, ElementProperty::Disabled).await
            }

            Expect::Enabled { selector } => {
                check_property(interpreter, ctx, selector, ElementProperty::Enabled).await
            }
        }
    }
}

async fn is_hidden(session: &mut dyn Session, target: &Locator) -> Result<bool> {
    if session.count(target).await? == 0 {
        return Ok(true);
    }
    let visible = session
        .query(&target.first(), ElementProperty::Visible)
        .await?;
    Ok(!visible)
}

/// Wait for the first match to attach, then check a property
///
/// Wait and query errors are reported as failing outcomes.
async fn check_property(
    interpreter: &Interpreter,
    ctx: &mut ExecutionContext<'_>,
    selector: &str,
    expected: ElementProperty,
) -> Result<Outcome> {
    let (wanted, opposite) = match expected {
        ElementProperty::Disabled => ("disabled", "enabled"),
        _ => ("enabled", "disabled"),
    };
    let target = Locator::new(selector).first();
    let attach = ms(interpreter.timing.attach_timeout_ms);

    if let Err(e) = ctx
        .session
        .wait_for(&target, ElementState::Attached, attach)
        .await
    {
        return Ok(Outcome::fail(format!("{}: {}", selector, e)));
    }

    match ctx.session.query(&target, expected).await {
        Ok(true) => Ok(Outcome::pass()),
        Ok(false) => Ok(Outcome::fail(format!(
            "Expected {}, got {}: {}",
            wanted, opposite, selector
        ))),
        Err(e) => Ok(Outcome::fail(format!("{}: {}", selector, e))),
    }
}
