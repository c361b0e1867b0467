//! Consent dialog handling

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::{ElementProperty, Locator};
use crate::common::Result;

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

/// How a consent dialog was dealt with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermsOutcome {
    /// All boxes ticked and the agree button pressed
    Agreed,
    /// The dialog is up but its agree button cannot be pressed
    ButtonDisabled,
    /// No dialog, terms were accepted earlier
    Absent,
}

/// Tick every box in the consent dialog and agree
#[derive(Debug, Clone, Deserialize)]
pub struct HandleTermsAgreement {
    /// Fail when the dialog does not show up
    #[serde(default)]
    pub required: bool,
}

#[async_trait]
impl StepAction for HandleTermsAgreement {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        match agree_to_terms(interpreter, ctx).await? {
            TermsOutcome::Agreed => Ok(Outcome::pass().with_detail("terms agreed")),
            TermsOutcome::ButtonDisabled => Ok(Outcome::fail(
                "Consent dialog shown but its agree button is disabled",
            )),
            TermsOutcome::Absent if self.required => Ok(Outcome::fail(
                "Consent dialog expected but not shown (required=true)",
            )),
            TermsOutcome::Absent => {
                Ok(Outcome::pass().with_detail("consent dialog not shown, already agreed"))
            }
        }
    }
}

/// Run the consent flow on the current page
pub async fn agree_to_terms(
    interpreter: &Interpreter,
    ctx: &mut ExecutionContext<'_>,
) -> Result<TermsOutcome> {
    let timing = &interpreter.timing;
    interpreter.pause(timing.terms_open_ms).await;

    let dialog = Locator::new(interpreter.app.terms_dialog_selector.as_str());
    if ctx.session.count(&dialog).await? == 0
        || !ctx
            .session
            .query(&dialog.first(), ElementProperty::Visible)
            .await?
    {
        return Ok(TermsOutcome::Absent);
    }

    let checkboxes = dialog.locator("input[type='checkbox']");
    let total = ctx.session.count(&checkboxes).await?;
    for i in 0..total {
        let checkbox = checkboxes.nth(i);
        let visible = ctx
            .session
            .query(&checkbox, ElementProperty::Visible)
            .await?;
        let checked = ctx
            .session
            .query(&checkbox, ElementProperty::Checked)
            .await?;
        if visible && !checked {
            ctx.session.click(&checkbox, true).await?;
            interpreter.pause(timing.terms_checkbox_ms).await;
        }
    }

    interpreter.pause(timing.terms_before_agree_ms).await;
    let agree = dialog.locator("button").last();
    let visible = ctx.session.query(&agree, ElementProperty::Visible).await?;
    if visible && ctx.session.query(&agree, ElementProperty::Enabled).await? {
        ctx.session.click(&agree, false).await?;
        interpreter.pause(timing.terms_after_agree_ms).await;
        return Ok(TermsOutcome::Agreed);
    }
    Ok(TermsOutcome::ButtonDisabled)
}
