//! The action table
//!
//! Step documents carry the kind in their `action` field. Known kinds are
//! deserialized into the matching action type; anything else is reported as
//! unknown and never passes.

use serde::Deserialize;

use crate::common::Result;
use crate::scenario::StepDefinition;

use super::{
    Blur, CancelExistingCounsel, Clear, Click, ExecutionContext, Expect, FetchAndInjectUserInfo,
    Fill, HandleTermsAgreement, InjectStoreData, InjectUserInfo, Interpreter, ManualAction,
    Marker, Navigate, Outcome, RetryUntilGa, SaveState, Screenshot, SetSessionStorage,
    StepAction, WaitFor, WaitForNavigation, WaitForResponse, WaitForTimeout, WaitForUrl,
};

/// Every supported action kind
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    // Navigation and evidence
    Navigate(Navigate),
    Screenshot(Screenshot),

    // Input
    Fill(Fill),
    Clear(Clear),
    Blur(Blur),
    Click(Click),

    // Assertions
    Expect(Expect),

    // Waiting
    WaitForNavigation(WaitForNavigation),
    WaitFor(WaitFor),
    WaitForTimeout(WaitForTimeout),
    WaitForResponse(WaitForResponse),
    WaitForUrl(WaitForUrl),

    // Consent
    HandleTermsAgreement(HandleTermsAgreement),

    // Client state
    InjectStoreData(InjectStoreData),
    InjectUserInfo(InjectUserInfo),
    FetchAndInjectUserInfo(FetchAndInjectUserInfo),
    SetSessionStorage(SetSessionStorage),
    SaveState(SaveState),

    // Backend coordination
    RetryUntilGa(RetryUntilGa),
    CancelExistingCounsel(CancelExistingCounsel),

    // Markers
    ManualAction(ManualAction),
    LoadState(Marker),
    LaunchBrowser(Marker),
}

/// Result of reading a step's action
#[derive(Debug, Clone)]
pub enum ParsedStep {
    Known(Action),
    /// The kind is not in the action table
    Unknown(String),
    /// The kind is known but its parameters do not fit
    Invalid { kind: String, message: String },
}

impl Action {
    /// Wire names of all action kinds
    pub const KINDS: &'static [&'static str] = &[
        "navigate",
        "screenshot",
        "fill",
        "clear",
        "blur",
        "click",
        "expect",
        "waitForNavigation",
        "waitFor",
        "waitForTimeout",
        "waitForResponse",
        "waitForUrl",
        "handleTermsAgreement",
        "injectStoreData",
        "injectUserInfo",
        "fetchAndInjectUserInfo",
        "setSessionStorage",
        "saveState",
        "retryUntilGa",
        "cancelExistingCounsel",
        "manualAction",
        "loadState",
        "launchBrowser",
    ];

    /// Read the action of a step
    pub fn parse(step: &StepDefinition) -> ParsedStep {
        if !Self::KINDS.contains(&step.action.as_str()) {
            return ParsedStep::Unknown(step.action.clone());
        }
        match serde_json::from_value::<Action>(step.to_value()) {
            Ok(action) => ParsedStep::Known(action),
            Err(e) => ParsedStep::Invalid {
                kind: step.action.clone(),
                message: e.to_string(),
            },
        }
    }

    /// Wire name of this action
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Navigate(_) => "navigate",
            Action::Screenshot(_) => "screenshot",
            Action::Fill(_) => "fill",
            Action::Clear(_) => "clear",
            Action::Blur(_) => "blur",
            Action::Click(_) => "click",
            Action::Expect(_) => "expect",
            Action::WaitForNavigation(_) => "waitForNavigation",
            Action::WaitFor(_) => "waitFor",
            Action::WaitForTimeout(_) => "waitForTimeout",
            Action::WaitForResponse(_) => "waitForResponse",
            Action::WaitForUrl(_) => "waitForUrl",
            Action::HandleTermsAgreement(_) => "handleTermsAgreement",
            Action::InjectStoreData(_) => "injectStoreData",
            Action::InjectUserInfo(_) => "injectUserInfo",
            Action::FetchAndInjectUserInfo(_) => "fetchAndInjectUserInfo",
            Action::SetSessionStorage(_) => "setSessionStorage",
            Action::SaveState(_) => "saveState",
            Action::RetryUntilGa(_) => "retryUntilGa",
            Action::CancelExistingCounsel(_) => "cancelExistingCounsel",
            Action::ManualAction(_) => "manualAction",
            Action::LoadState(_) => "loadState",
            Action::LaunchBrowser(_) => "launchBrowser",
        }
    }

    fn as_step_action(&self) -> &dyn StepAction {
        match self {
            Action::Navigate(a) => a,
            Action::Screenshot(a) => a,
            Action::Fill(a) => a,
            Action::Clear(a) => a,
            Action::Blur(a) => a,
            Action::Click(a) => a,
            Action::Expect(a) => a,
            Action::WaitForNavigation(a) => a,
            Action::WaitFor(a) => a,
            Action::WaitForTimeout(a) => a,
            Action::WaitForResponse(a) => a,
            Action::WaitForUrl(a) => a,
            Action::HandleTermsAgreement(a) => a,
            Action::InjectStoreData(a) => a,
            Action::InjectUserInfo(a) => a,
            Action::FetchAndInjectUserInfo(a) => a,
            Action::SetSessionStorage(a) => a,
            Action::SaveState(a) => a,
            Action::RetryUntilGa(a) => a,
            Action::CancelExistingCounsel(a) => a,
            Action::ManualAction(a) => a,
            Action::LoadState(a) | Action::LaunchBrowser(a) => a,
        }
    }

    /// Run the action
    pub async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        self.as_step_action().execute(interpreter, ctx).await
    }
}
