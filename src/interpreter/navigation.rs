//! Page navigation and screenshots

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::LoadState;
use crate::common::paths;
use crate::common::Result;

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

/// Go to a URL and wait for the network to settle
#[derive(Debug, Clone, Deserialize)]
pub struct Navigate {
    pub url: String,
}

#[async_trait]
impl StepAction for Navigate {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        ctx.session.goto(&self.url).await?;
        ctx.session
            .wait_for_load_state(LoadState::NetworkIdle)
            .await?;

        let current = ctx.session.url().await?;
        if current.contains(&interpreter.app.login_marker) {
            return Ok(Outcome::fail(format!(
                "Session expired: redirected to {}",
                current
            )));
        }
        Ok(Outcome::pass())
    }
}

/// Full-page screenshot named after the step number
#[derive(Debug, Clone, Deserialize)]
pub struct Screenshot {}

#[async_trait]
impl StepAction for Screenshot {
    async fn execute(
        &self,
        _interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let Some(prefix) = ctx.screenshot_prefix else {
            return Ok(Outcome::pass());
        };
        let path = paths::step_screenshot(prefix, ctx.step_num);
        ctx.session.screenshot(&path, true).await?;
        Ok(Outcome::pass().with_screenshot(path))
    }
}
