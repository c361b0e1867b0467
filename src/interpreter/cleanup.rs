//! Cancel leftover consultations
//!
//! The backend allows only one open consultation per account, so flows that
//! create one start by cancelling whatever an earlier run left behind. An
//! empty history redirects away from the history page.

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::{ElementState, LoadState, Locator, Session};
use crate::common::config::ms;
use crate::common::Result;

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelExistingCounsel {
    /// Falls back to the `baseUrl` variable
    #[serde(default)]
    pub base_url: Option<String>,
}

#[async_trait]
impl StepAction for CancelExistingCounsel {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let variables = ctx.variables;
        let base_url = self
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| variables.get("baseUrl").map(String::as_str))
            .unwrap_or_default()
            .trim_end_matches('/');
        match cancel_all(interpreter, ctx.session, base_url).await? {
            0 if !on_history(interpreter, ctx.session).await? => {
                Ok(Outcome::pass().with_detail("nothing to cancel"))
            }
            cancelled => Ok(Outcome::pass().with_detail(format!("{} cancelled", cancelled))),
        }
    }
}

async fn on_history(interpreter: &Interpreter, session: &mut dyn Session) -> Result<bool> {
    let url = session.url().await?;
    Ok(url.contains(&interpreter.app.history_path))
}

/// Cancel every open consultation; returns how many were cancelled
pub async fn cancel_all(
    interpreter: &Interpreter,
    session: &mut dyn Session,
    base_url: &str,
) -> Result<u32> {
    let app = &interpreter.app;
    let timing = &interpreter.timing;

    session
        .goto(&format!("{}{}", base_url, app.history_path))
        .await?;
    session.wait_for_load_state(LoadState::NetworkIdle).await?;
    interpreter.pause(timing.cleanup_settle_ms).await;

    if !on_history(interpreter, session).await? {
        return Ok(0);
    }

    let control_timeout = ms(timing.cleanup_control_timeout_ms);
    let cancel = Locator::new(app.cancel_selector.as_str()).first();
    let modal = Locator::new(app.cancel_modal_selector.as_str());
    let confirm = modal.locator(app.cancel_confirm_selector.as_str()).first();

    let mut cancelled = 0;
    for _ in 0..app.cancel_max_attempts {
        if session
            .wait_for(&cancel, ElementState::Visible, control_timeout)
            .await
            .is_err()
        {
            break;
        }
        session.click(&cancel, false).await?;
        interpreter.pause(timing.cleanup_click_ms).await;

        if session.count(&modal).await? > 0 {
            if session
                .wait_for(&confirm, ElementState::Visible, control_timeout)
                .await
                .is_err()
            {
                break;
            }
            session.click(&confirm, false).await?;
            interpreter.pause(timing.cleanup_confirm_ms).await;
            cancelled += 1;
        }

        if !on_history(interpreter, session).await? {
            break;
        }
    }

    tracing::info!(cancelled, "Cancelled existing consultations");
    Ok(cancelled)
}
