//! Browser driver bridge
//!
//! Implements the browser traits by talking to an external bridge process
//! over stdio. The bridge wraps a browser automation library and exposes it
//! as a small request/response protocol; see [`client`] for the transport.
//!
//! Every `launch` spawns its own bridge, so workers never share a process.
//!
//! # Bridge contract
//!
//! Any executable that speaks this protocol on stdin/stdout can serve as the
//! `[driver] command`. Messages are JSON bodies framed by a
//! `Content-Length` header (see [`codec`]).
//!
//! ```text
//! -> {"seq": 7, "type": "request", "command": "click", "arguments": {...}}
//! <- {"type": "response", "request_seq": 7, "success": true, "body": {...}}
//! <- {"type": "response", "request_seq": 7, "success": false, "message": "..."}
//! <- {"type": "event", "event": "route", "body": {...}}
//! ```
//!
//! Responses may arrive in any order. Bridge-level commands:
//!
//! | command        | arguments                          | response body            |
//! |----------------|------------------------------------|--------------------------|
//! | `launch`       | `headless`                         |                          |
//! | `newContext`   | `storageState`, `defaultTimeout`   | `contextId`, `pageId`    |
//! | `close`        | none                               |                          |
//!
//! Context commands carry `contextId`: `addInitScript {script}`,
//! `storageState {path}` and `closeContext`.
//!
//! Page commands carry `pageId`:
//!
//! | command            | arguments                      | response body |
//! |--------------------|--------------------------------|---------------|
//! | `goto`             | `url`                          |               |
//! | `waitForLoadState` | `state`                        |               |
//! | `url`              |                                | `url`         |
//! | `fill`             | `selector`, `value`            |               |
//! | `blur`             | `selector`                     |               |
//! | `click`            | `selector`, `force`            |               |
//! | `count`            | `selector`                     | `count`       |
//! | `query`            | `selector`, `property`         | `value`       |
//! | `waitForSelector`  | `selector`, `state`, `timeout` |               |
//! | `evaluate`         | `expression`, `arg`            | `result`      |
//! | `screenshot`       | `path`, `fullPage`             |               |
//! | `route`            | `pattern`                      |               |
//! | `unroute`          | `pattern`                      |               |
//! | `fulfillRoute`     | `routeId`                      |               |
//! | `abortRoute`       | `routeId`                      |               |
//!
//! Selectors use the `a >> b >> nth=N` chain syntax. Enum arguments are
//! lowercase (`networkidle`, `visible`, `disabled`); timeouts are
//! milliseconds.
//!
//! While a page has a route registered, every matching call is held and
//! reported as a `route` event with body `{routeId, pageId, url, status,
//! body}`, where `body` is the response text. The call stays held until
//! `fulfillRoute` lets the response through or `abortRoute` fails it. A
//! `closed` event with `{pageId}` reports a page closed from the bridge side.

pub mod client;
pub mod codec;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::browser::{
    Browser, BrowserLauncher, ElementProperty, ElementState, InterceptedRoute, LoadState, Locator,
    RouteDecision, Session, SessionOptions,
};
use crate::common::config::DriverConfig;
use crate::common::{Error, Result};

pub use client::DriverClient;
use types::{NewContextResponse, RouteEvent};

/// Launches browsers through the bridge
#[derive(Debug, Clone)]
pub struct DriverLauncher {
    command: PathBuf,
    args: Vec<String>,
    headless: bool,
    request_timeout: Duration,
}

impl DriverLauncher {
    pub fn new(command: PathBuf, args: Vec<String>, headless: bool, request_timeout: Duration) -> Self {
        Self {
            command,
            args,
            headless,
            request_timeout,
        }
    }

    /// Launcher for the configured bridge
    pub fn from_config(config: &DriverConfig) -> Result<Self> {
        Ok(Self::new(
            config.resolve_command()?,
            config.args.clone(),
            config.headless,
            Duration::from_secs(config.request_timeout_secs),
        ))
    }
}

#[async_trait]
impl BrowserLauncher for DriverLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>> {
        let client = DriverClient::spawn(&self.command, &self.args, self.request_timeout)?;
        client
            .request("launch", json!({ "headless": self.headless }))
            .await
            .map_err(|e| match e {
                Error::DriverCrashed => {
                    Error::DriverStartFailed("driver exited during launch".to_string())
                }
                other => other,
            })?;
        tracing::info!(headless = self.headless, "Browser launched");
        Ok(Box::new(DriverBrowser {
            client: Arc::new(client),
            closed: false,
        }))
    }
}

/// One browser running inside a bridge process
pub struct DriverBrowser {
    client: Arc<DriverClient>,
    closed: bool,
}

#[async_trait]
impl Browser for DriverBrowser {
    async fn new_session(&mut self, options: SessionOptions) -> Result<Box<dyn Session>> {
        let args = json!({
            "storageState": options.storage_state.as_deref().map(path_arg),
            "defaultTimeout": options.default_timeout.map(|t| t.as_millis() as u64),
        });
        let created: NewContextResponse = self.client.request_as("newContext", args).await?;
        let routes = self.client.subscribe_routes(&created.page_id);
        tracing::debug!(context = %created.context_id, page = %created.page_id, "Session opened");

        Ok(Box::new(DriverSession {
            client: self.client.clone(),
            context_id: created.context_id,
            page_id: created.page_id,
            routes,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = if self.client.is_running() {
            self.client.request("close", Value::Null).await.map(drop)
        } else {
            Ok(())
        };
        self.client.terminate().await;
        result
    }
}

/// A browser context with its single page
pub struct DriverSession {
    client: Arc<DriverClient>,
    context_id: String,
    page_id: String,
    routes: mpsc::UnboundedReceiver<RouteEvent>,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl DriverSession {
    async fn page_request(&self, command: &str, mut args: Value) -> Result<Value> {
        if let Value::Object(map) = &mut args {
            map.insert("pageId".to_string(), Value::String(self.page_id.clone()));
        }
        self.client.request(command, args).await
    }

    async fn context_request(&self, command: &str, mut args: Value) -> Result<Value> {
        if let Value::Object(map) = &mut args {
            map.insert("contextId".to_string(), Value::String(self.context_id.clone()));
        }
        self.client.request(command, args).await
    }
}

fn field<'v>(body: &'v Value, command: &str, name: &str) -> Result<&'v Value> {
    body.get(name).ok_or_else(|| {
        Error::DriverProtocol(format!("{} response is missing '{}'", command, name))
    })
}

#[async_trait]
impl Session for DriverSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page_request("goto", json!({ "url": url })).await?;
        Ok(())
    }

    async fn wait_for_load_state(&mut self, state: LoadState) -> Result<()> {
        self.page_request("waitForLoadState", json!({ "state": state }))
            .await?;
        Ok(())
    }

    async fn url(&mut self) -> Result<String> {
        let body = self.page_request("url", json!({})).await?;
        field(&body, "url", "url")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::DriverProtocol("url is not a string".to_string()))
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> Result<()> {
        self.page_request(
            "fill",
            json!({ "selector": locator.selector(), "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn blur(&mut self, locator: &Locator) -> Result<()> {
        self.page_request("blur", json!({ "selector": locator.selector() }))
            .await?;
        Ok(())
    }

    async fn click(&mut self, locator: &Locator, force: bool) -> Result<()> {
        self.page_request(
            "click",
            json!({ "selector": locator.selector(), "force": force }),
        )
        .await?;
        Ok(())
    }

    async fn count(&mut self, locator: &Locator) -> Result<usize> {
        let body = self
            .page_request("count", json!({ "selector": locator.selector() }))
            .await?;
        field(&body, "count", "count")?
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| Error::DriverProtocol("count is not a number".to_string()))
    }

    async fn query(&mut self, locator: &Locator, property: ElementProperty) -> Result<bool> {
        let body = self
            .page_request(
                "query",
                json!({ "selector": locator.selector(), "property": property }),
            )
            .await?;
        field(&body, "query", "value")?
            .as_bool()
            .ok_or_else(|| Error::DriverProtocol("query value is not a boolean".to_string()))
    }

    async fn wait_for(
        &mut self,
        locator: &Locator,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        self.page_request(
            "waitForSelector",
            json!({
                "selector": locator.selector(),
                "state": state,
                "timeout": timeout.as_millis() as u64,
            }),
        )
        .await?;
        Ok(())
    }

    async fn evaluate(&mut self, function: &str, arg: Value) -> Result<Value> {
        let body = self
            .page_request("evaluate", json!({ "expression": function, "arg": arg }))
            .await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn add_init_script(&mut self, script: &str) -> Result<()> {
        self.context_request("addInitScript", json!({ "script": script }))
            .await?;
        Ok(())
    }

    async fn save_storage_state(&mut self, path: &Path) -> Result<()> {
        self.context_request("storageState", json!({ "path": path_arg(path) }))
            .await?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> Result<()> {
        self.page_request(
            "screenshot",
            json!({ "path": path_arg(path), "fullPage": full_page }),
        )
        .await?;
        Ok(())
    }

    async fn route(&mut self, pattern: &str) -> Result<()> {
        self.page_request("route", json!({ "pattern": pattern }))
            .await?;
        Ok(())
    }

    async fn unroute(&mut self, pattern: &str) -> Result<()> {
        self.page_request("unroute", json!({ "pattern": pattern }))
            .await?;
        Ok(())
    }

    async fn next_route(&mut self, timeout: Duration) -> Result<Option<InterceptedRoute>> {
        match tokio::time::timeout(timeout, self.routes.recv()).await {
            Ok(Some(event)) => Ok(Some(event.into())),
            Ok(None) => Err(Error::DriverCrashed),
            Err(_) => Ok(None),
        }
    }

    async fn resolve_route(&mut self, id: &str, decision: RouteDecision) -> Result<()> {
        let command = match decision {
            RouteDecision::Fulfill => "fulfillRoute",
            RouteDecision::Abort => "abortRoute",
        };
        self.page_request(command, json!({ "routeId": id })).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.client.unsubscribe_routes(&self.page_id);
        self.context_request("closeContext", json!({})).await?;
        Ok(())
    }
}
