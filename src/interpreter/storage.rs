//! Browser storage steps

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::browser::BLANK_URL;
use crate::common::Result;

use super::{ExecutionContext, Interpreter, Outcome, StepAction};

const SET_ITEM_JS: &str = "([key, value]) => window.sessionStorage.setItem(key, value)";

/// Put a value into `sessionStorage`
///
/// Before the first navigation there is no origin to write to, so the write
/// is registered as an init script and replayed on every page load instead.
#[derive(Debug, Clone, Deserialize)]
pub struct SetSessionStorage {
    pub key: String,
    pub value: Value,
}

impl SetSessionStorage {
    /// Stored values are strings; other JSON values are stored serialized
    fn stored_value(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Init script performing the write
    pub fn init_script(&self) -> String {
        format!(
            "window.sessionStorage.setItem({}, {});",
            Value::String(self.key.clone()),
            Value::String(self.stored_value())
        )
    }
}

#[async_trait]
impl StepAction for SetSessionStorage {
    async fn execute(
        &self,
        _interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let url = ctx.session.url().await?;
        if url == BLANK_URL {
            ctx.session.add_init_script(&self.init_script()).await?;
            return Ok(Outcome::pass().with_detail("init script"));
        }
        ctx.session
            .evaluate(SET_ITEM_JS, json!([self.key, self.stored_value()]))
            .await?;
        Ok(Outcome::pass())
    }
}

/// Save cookies and storage to the auth-state file
#[derive(Debug, Clone, Deserialize)]
pub struct SaveState {}

#[async_trait]
impl StepAction for SaveState {
    async fn execute(
        &self,
        _interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        if let Some(parent) = ctx.auth_state_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        ctx.session.save_storage_state(ctx.auth_state_path).await?;
        tracing::info!(path = %ctx.auth_state_path.display(), "Saved auth state");
        Ok(Outcome::pass())
    }
}
