//! Client-side state injection
//!
//! Pushes data straight into the application's state containers so a
//! scenario can start mid-flow without clicking through earlier screens.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::browser::Session;
use crate::common::Result;

use super::stores::format_phone;
use super::{ExecutionContext, Interpreter, Outcome, StepAction};

/// Calls `setState` on a window global; returns `{ok}` or `{error}`
const SET_STATE_JS: &str = r#"(args) => {
  const store = window[args.global];
  if (!store) return { error: `window.${args.global} not found` };
  try {
    store.setState(args.state);
    return { ok: true };
  } catch (e) {
    return { error: String(e) };
  }
}"#;

/// Authenticated fetch from inside the page; returns `{data}` or `{error}`
const FETCH_JSON_JS: &str = r#"async (args) => {
  try {
    const headers = { Accept: 'application/json' };
    if (args.tokenKey) {
      const token = window.localStorage.getItem(args.tokenKey)
        || window.sessionStorage.getItem(args.tokenKey);
      if (token) headers.Authorization = `Bearer ${token}`;
    }
    const res = await fetch(args.endpoint, { credentials: 'include', headers });
    if (!res.ok) return { error: `HTTP ${res.status} from ${args.endpoint}` };
    const body = await res.json();
    const data = body && typeof body.data === 'object' && body.data !== null ? body.data : body;
    return { data };
  } catch (e) {
    return { error: String(e) };
  }
}"#;

/// Phone fields normalized before injection
const PHONE_FIELDS: &[&str] = &["phone", "phoneNumber"];

/// Merge arbitrary data into a store
#[derive(Debug, Clone, Deserialize)]
pub struct InjectStoreData {
    pub store: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[async_trait]
impl StepAction for InjectStoreData {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let global = match interpreter.stores.resolve(&self.store) {
            Ok(g) => g,
            Err(e) => return Ok(Outcome::fail(e)),
        };
        match set_state(ctx.session, global, Value::Object(self.data.clone())).await? {
            None => Ok(Outcome::pass()),
            Some(error) => Ok(Outcome::fail(error)),
        }
    }
}

/// Inject user info given in the step itself
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectUserInfo {
    pub store: String,
    #[serde(default)]
    pub user_data: Option<Value>,
}

#[async_trait]
impl StepAction for InjectUserInfo {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let global = match interpreter.stores.resolve(&self.store) {
            Ok(g) => g,
            Err(e) => return Ok(Outcome::fail(e)),
        };
        let user = match &self.user_data {
            Some(Value::Object(user)) => user.clone(),
            Some(_) => return Ok(Outcome::fail("userData must be an object")),
            None => {
                return Ok(Outcome::fail(
                    "userData is missing; add a userData object to the step",
                ))
            }
        };
        inject_user(ctx.session, global, user).await
    }
}

/// Fetch the signed-in user's profile from the application and inject it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAndInjectUserInfo {
    pub store: String,
    /// Profile endpoint, relative to the page origin
    pub endpoint: String,
    /// Storage key of a bearer token, when cookies are not enough
    #[serde(default)]
    pub token_storage_key: Option<String>,
}

#[async_trait]
impl StepAction for FetchAndInjectUserInfo {
    async fn execute(
        &self,
        interpreter: &Interpreter,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome> {
        let global = match interpreter.stores.resolve(&self.store) {
            Ok(g) => g,
            Err(e) => return Ok(Outcome::fail(e)),
        };

        let fetched = ctx
            .session
            .evaluate(
                FETCH_JSON_JS,
                json!({ "endpoint": self.endpoint, "tokenKey": self.token_storage_key }),
            )
            .await?;
        if let Some(error) = fetched.get("error").and_then(Value::as_str) {
            return Ok(Outcome::fail(format!("User info fetch failed: {}", error)));
        }
        let user = match fetched.get("data") {
            Some(Value::Object(user)) => user.clone(),
            _ => {
                return Ok(Outcome::fail(format!(
                    "User info from {} is not an object",
                    self.endpoint
                )))
            }
        };
        inject_user(ctx.session, global, user).await
    }
}

async fn inject_user(
    session: &mut dyn Session,
    global: &str,
    user: Map<String, Value>,
) -> Result<Outcome> {
    let user = normalize_user_info(user);
    let label = user_label(&user);
    match set_state(session, global, json!({ "userInfo": user })).await? {
        None => Ok(Outcome::pass().with_detail(label)),
        Some(error) => Ok(Outcome::fail(error).with_detail(label)),
    }
}

/// Call `setState` in the page; `Some(message)` when the page reported a problem
async fn set_state(session: &mut dyn Session, global: &str, state: Value) -> Result<Option<String>> {
    let result = session
        .evaluate(SET_STATE_JS, json!({ "global": global, "state": state }))
        .await?;
    Ok(result
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Format phone fields the way the application displays them
pub fn normalize_user_info(mut user: Map<String, Value>) -> Map<String, Value> {
    for field in PHONE_FIELDS {
        if let Some(Value::String(raw)) = user.get(*field) {
            let formatted = format_phone(raw);
            user.insert(field.to_string(), Value::String(formatted));
        }
    }
    user
}

/// `name=…, gender=…` for the step description
pub fn user_label(user: &Map<String, Value>) -> String {
    let field = |key: &str, fallback: &str| match user.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(Value::String(_)) => fallback.to_string(),
        Some(other) => other.to_string(),
    };
    format!("name={}, gender={}", field("name", "?"), field("gender", "(none)"))
}
