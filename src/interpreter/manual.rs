//! Marker steps
//!
//! These document the flow without touching the page.

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::Result;

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

/// A step a human has to perform or check
#[derive(Debug, Clone, Deserialize)]
pub struct ManualAction {
    #[serde(default)]
    pub instruction: String,
}

#[async_trait]
impl StepAction for ManualAction {
    async fn execute(
        &self,
        _interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        tracing::info!(step = ctx.step_num, instruction = %self.instruction, "Manual step");
        println!("  [MANUAL] {}", self.instruction);
        Ok(Outcome::pass().with_detail("manual"))
    }
}

/// `loadState` and `launchBrowser`: handled by the runner itself
#[derive(Debug, Clone, Deserialize)]
pub struct Marker {}

#[async_trait]
impl StepAction for Marker {
    async fn execute(
        &self,
        _interpreter: &Interpreter,
        _ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        Ok(Outcome::pass())
    }
}
