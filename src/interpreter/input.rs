//! Input manipulation
//!
//! Each action works on the first element matching its selector and then
//! waits the settle interval.

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::Locator;
use crate::common::Result;

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

fn default_selector() -> String {
    "input".to_string()
}

/// Type a value into an input
#[derive(Debug, Clone, Deserialize)]
pub struct Fill {
    #[serde(default = "default_selector")]
    pub selector: String,
    #[serde(default)]
    pub value: String,
}

#[async_trait]
impl StepAction for Fill {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let target = Locator::new(self.selector.as_str()).first();
        ctx.session.fill(&target, &self.value).await?;
        interpreter.settle().await;
        Ok(Outcome::pass())
    }
}

/// Empty an input
#[derive(Debug, Clone, Deserialize)]
pub struct Clear {
    #[serde(default = "default_selector")]
    pub selector: String,
}

#[async_trait]
impl StepAction for Clear {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let target = Locator::new(self.selector.as_str()).first();
        ctx.session.fill(&target, "").await?;
        interpreter.settle().await;
        Ok(Outcome::pass())
    }
}

/// Move focus away from an input, triggering its validation
#[derive(Debug, Clone, Deserialize)]
pub struct Blur {
    #[serde(default = "default_selector")]
    pub selector: String,
}

#[async_trait]
impl StepAction for Blur {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let target = Locator::new(self.selector.as_str()).first();
        ctx.session.blur(&target).await?;
        interpreter.settle().await;
        Ok(Outcome::pass())
    }
}

/// Click an element
#[derive(Debug, Clone, Deserialize)]
pub struct Click {
    pub selector: String,
}

#[async_trait]
impl StepAction for Click {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let target = Locator::new(self.selector.as_str()).first();
        ctx.session.click(&target, false).await?;
        interpreter.settle().await;
        Ok(Outcome::pass())
    }
}
