//! Scripted in-memory browser and catalog for integration tests
//!
//! The fake records every call in a shared [`Log`] and answers queries from
//! a [`Script`] the test sets up beforehand.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use scenario_runner::browser::{
    Browser, BrowserLauncher, ElementProperty, ElementState, InterceptedRoute, LoadState, Locator,
    RouteDecision, Session, SessionOptions, BLANK_URL,
};
use scenario_runner::catalog::ScenarioSource;
use scenario_runner::scenario::{CatalogIndex, ScenarioDefinition};
use scenario_runner::{Error, Result};

/// How the fake page behaves
#[derive(Debug, Default)]
pub struct Script {
    /// Requested URL -> URL the page ends up on
    pub redirects: HashMap<String, String>,
    /// Extra time a navigation takes, by requested URL
    pub goto_delays: HashMap<String, Duration>,
    /// Navigations that throw
    pub failing_gotos: HashSet<String>,
    /// Element counts by selector
    pub counts: HashMap<String, usize>,
    /// Boolean properties by selector
    pub properties: HashMap<(String, ElementProperty), bool>,
    /// Successive answers for a property; the last one sticks. Checked
    /// before `properties`.
    pub property_answers: HashMap<(String, ElementProperty), VecDeque<bool>>,
    /// Selectors whose count and property queries throw
    pub failing_selectors: HashSet<String>,
    /// Selectors that reach any waited-for state
    pub present: HashSet<String>,
    /// Selectors whose click throws
    pub failing_clicks: HashSet<String>,
    /// Page changes caused by successive clicks on a selector
    pub click_effects: HashMap<String, VecDeque<ClickEffect>>,
    /// Response bodies of the calls triggered by successive clicks made
    /// while a route is active
    pub route_bodies: VecDeque<String>,
    /// How long after its click each intercepted call arrives; zero when
    /// exhausted
    pub route_latencies: VecDeque<Duration>,
    /// Values returned by successive `evaluate` calls; `{"ok": true}` when empty
    pub evaluate_results: VecDeque<Value>,
    /// Sessions with a storage state fail to open
    pub reject_storage_state: bool,
    /// Every launch fails
    pub launch_fails: bool,
    /// Screenshots throw
    pub screenshot_fails: bool,
}

/// What happened
#[derive(Debug, Default)]
pub struct Log {
    pub calls: Vec<String>,
    /// Every URL navigated to, in order
    pub visited: Vec<String>,
    pub evaluations: Vec<Value>,
    pub init_scripts: Vec<String>,
    pub screenshots: Vec<PathBuf>,
    pub launches: usize,
    pub browsers_closed: usize,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub session_options: Vec<Option<PathBuf>>,
    pub routes_registered: usize,
    pub routes_deregistered: usize,
    pub fulfilled: Vec<String>,
    pub aborted: Vec<String>,
}

/// What one click changes on the page
#[derive(Debug, Clone, Default)]
pub struct ClickEffect {
    /// Selectors that stop being present
    pub hide: Vec<String>,
    /// URL the page moves to
    pub goto: Option<String>,
}

impl ClickEffect {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn hide(selector: &str) -> Self {
        Self {
            hide: vec![selector.to_string()],
            goto: None,
        }
    }

    pub fn goto(url: &str) -> Self {
        Self {
            hide: Vec::new(),
            goto: Some(url.to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    script: Script,
    log: Log,
    next_route_id: usize,
    /// Intercepted calls and when they reach the session
    in_flight: VecDeque<(Instant, InterceptedRoute)>,
}

/// Handle to the shared fake state
#[derive(Clone, Default)]
pub struct Fake {
    state: Arc<Mutex<State>>,
}

impl Fake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit the script
    pub fn script(&self, edit: impl FnOnce(&mut Script)) -> &Self {
        edit(&mut self.lock().script);
        self
    }

    /// Read the log
    pub fn log<T>(&self, read: impl FnOnce(&Log) -> T) -> T {
        read(&self.lock().log)
    }

    pub fn launcher(&self) -> Arc<dyn BrowserLauncher> {
        Arc::new(FakeLauncher { fake: self.clone() })
    }

    /// A session without going through a browser
    pub fn session(&self) -> FakeSession {
        self.lock().log.sessions_opened += 1;
        FakeSession::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: String) {
        self.lock().log.calls.push(call);
    }
}

pub struct FakeLauncher {
    fake: Fake,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>> {
        let mut state = self.fake.lock();
        state.log.launches += 1;
        if state.script.launch_fails {
            return Err(Error::DriverStartFailed("no browser here".to_string()));
        }
        Ok(Box::new(FakeBrowser {
            fake: self.fake.clone(),
        }))
    }
}

pub struct FakeBrowser {
    fake: Fake,
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_session(&mut self, options: SessionOptions) -> Result<Box<dyn Session>> {
        let mut state = self.fake.lock();
        state.log.session_options.push(options.storage_state.clone());
        if options.storage_state.is_some() && state.script.reject_storage_state {
            return Err(Error::driver_request_failed(
                "newContext",
                "storage state file is unreadable",
            ));
        }
        state.log.sessions_opened += 1;
        drop(state);
        Ok(Box::new(FakeSession::new(self.fake.clone())))
    }

    async fn close(&mut self) -> Result<()> {
        self.fake.lock().log.browsers_closed += 1;
        Ok(())
    }
}

pub struct FakeSession {
    fake: Fake,
    url: String,
    active_routes: usize,
}

impl FakeSession {
    fn new(fake: Fake) -> Self {
        Self {
            fake,
            url: BLANK_URL.to_string(),
            active_routes: 0,
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let (delay, fails, target) = {
            let mut state = self.fake.lock();
            state.log.calls.push(format!("goto {}", url));
            state.log.visited.push(url.to_string());
            (
                state.script.goto_delays.get(url).copied(),
                state.script.failing_gotos.contains(url),
                state
                    .script
                    .redirects
                    .get(url)
                    .cloned()
                    .unwrap_or_else(|| url.to_string()),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(Error::driver_request_failed(
                "goto",
                &format!("net::ERR_CONNECTION_REFUSED at {}", url),
            ));
        }
        self.url = target;
        Ok(())
    }

    async fn wait_for_load_state(&mut self, _state: LoadState) -> Result<()> {
        Ok(())
    }

    async fn url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> Result<()> {
        self.fake.record(format!("fill {} = {}", locator, value));
        Ok(())
    }

    async fn blur(&mut self, locator: &Locator) -> Result<()> {
        self.fake.record(format!("blur {}", locator));
        Ok(())
    }

    async fn click(&mut self, locator: &Locator, force: bool) -> Result<()> {
        let mut state = self.fake.lock();
        let suffix = if force { " (force)" } else { "" };
        state.log.calls.push(format!("click {}{}", locator, suffix));
        if state.script.failing_clicks.contains(locator.selector()) {
            return Err(Error::driver_request_failed(
                "click",
                "element is not attached to the DOM",
            ));
        }

        let effect = state
            .script
            .click_effects
            .get_mut(locator.selector())
            .and_then(VecDeque::pop_front);
        if let Some(effect) = effect {
            for selector in &effect.hide {
                state.script.present.remove(selector);
            }
            if let Some(url) = effect.goto {
                self.url = url;
            }
        }

        if self.active_routes > 0 {
            if let Some(body) = state.script.route_bodies.pop_front() {
                let latency = state.script.route_latencies.pop_front().unwrap_or_default();
                state.next_route_id += 1;
                let route = InterceptedRoute {
                    id: format!("r{}", state.next_route_id),
                    url: "https://app.example.com/api/available-ga".to_string(),
                    status: 200,
                    body,
                };
                state.in_flight.push_back((Instant::now() + latency, route));
            }
        }
        Ok(())
    }

    async fn count(&mut self, locator: &Locator) -> Result<usize> {
        let state = self.fake.lock();
        if state.script.failing_selectors.contains(locator.selector()) {
            return Err(Error::driver_request_failed("count", "invalid selector"));
        }
        Ok(state
            .script
            .counts
            .get(locator.selector())
            .copied()
            .unwrap_or(0))
    }

    async fn query(&mut self, locator: &Locator, property: ElementProperty) -> Result<bool> {
        let mut state = self.fake.lock();
        if state.script.failing_selectors.contains(locator.selector()) {
            return Err(Error::driver_request_failed("query", "invalid selector"));
        }
        let key = (locator.selector().to_string(), property);
        if let Some(answers) = state.script.property_answers.get_mut(&key) {
            let answer = if answers.len() > 1 {
                answers.pop_front()
            } else {
                answers.front().copied()
            };
            if let Some(answer) = answer {
                return Ok(answer);
            }
        }
        Ok(state.script.properties.get(&key).copied().unwrap_or(false))
    }

    async fn wait_for(
        &mut self,
        locator: &Locator,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        let present = self.fake.lock().script.present.contains(locator.selector());
        let reached = match state {
            ElementState::Attached | ElementState::Visible => present,
            ElementState::Detached | ElementState::Hidden => !present,
        };
        if reached {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(Error::Timeout(timeout.as_millis() as u64))
    }

    async fn evaluate(&mut self, _function: &str, arg: Value) -> Result<Value> {
        let mut state = self.fake.lock();
        state.log.evaluations.push(arg);
        Ok(state
            .script
            .evaluate_results
            .pop_front()
            .unwrap_or_else(|| json!({ "ok": true })))
    }

    async fn add_init_script(&mut self, script: &str) -> Result<()> {
        self.fake.lock().log.init_scripts.push(script.to_string());
        Ok(())
    }

    async fn save_storage_state(&mut self, path: &Path) -> Result<()> {
        std::fs::write(path, "{\"cookies\":[],\"origins\":[]}")?;
        self.fake.record(format!("storageState {}", path.display()));
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> Result<()> {
        let mut state = self.fake.lock();
        if state.script.screenshot_fails {
            return Err(Error::driver_request_failed("screenshot", "page crashed"));
        }
        std::fs::write(path, b"png")?;
        state.log.screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn route(&mut self, pattern: &str) -> Result<()> {
        self.active_routes += 1;
        let mut state = self.fake.lock();
        state.log.routes_registered += 1;
        state.log.calls.push(format!("route {}", pattern));
        Ok(())
    }

    async fn unroute(&mut self, pattern: &str) -> Result<()> {
        self.active_routes = self.active_routes.saturating_sub(1);
        let mut state = self.fake.lock();
        state.log.routes_deregistered += 1;
        state.log.calls.push(format!("unroute {}", pattern));
        Ok(())
    }

    async fn next_route(&mut self, timeout: Duration) -> Result<Option<InterceptedRoute>> {
        let deadline = Instant::now() + timeout;
        let arrival = self.fake.lock().in_flight.front().map(|(at, _)| *at);
        match arrival {
            Some(at) if at <= deadline => {
                tokio::time::sleep_until(at).await;
                Ok(self.fake.lock().in_flight.pop_front().map(|(_, route)| route))
            }
            _ => {
                tokio::time::sleep_until(deadline).await;
                Ok(None)
            }
        }
    }

    async fn resolve_route(&mut self, id: &str, decision: RouteDecision) -> Result<()> {
        let mut state = self.fake.lock();
        match decision {
            RouteDecision::Fulfill => state.log.fulfilled.push(id.to_string()),
            RouteDecision::Abort => state.log.aborted.push(id.to_string()),
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.fake.lock().log.sessions_closed += 1;
        Ok(())
    }
}

/// Catalog served from memory
#[derive(Default)]
pub struct MemoryCatalog {
    pub index: CatalogIndex,
    pub documents: BTreeMap<String, ScenarioDefinition>,
    pub fetches: Mutex<Vec<String>>,
}

impl MemoryCatalog {
    /// Add a scenario under `path` with its index entry
    pub fn add(&mut self, path: &str, kind: &str, labels: &[&str], scenario: Value) {
        let scenario: ScenarioDefinition = serde_json::from_value(scenario).unwrap();
        self.index.scenarios.push(
            serde_json::from_value(json!({
                "id": scenario.id,
                "name": scenario.name,
                "path": path,
                "type": kind,
                "labels": labels,
            }))
            .unwrap(),
        );
        self.documents.insert(path.to_string(), scenario);
    }
}

#[async_trait]
impl ScenarioSource for MemoryCatalog {
    async fn fetch_index(&self) -> Result<CatalogIndex> {
        self.fetches.lock().unwrap().push("index.json".to_string());
        Ok(self.index.clone())
    }

    async fn fetch_scenario(&self, path: &str) -> Result<ScenarioDefinition> {
        self.fetches.lock().unwrap().push(path.to_string());
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| Error::catalog_fetch(path, "HTTP 404 Not Found"))
    }
}

/// A scenario document
pub fn scenario(id: &str, steps: Value) -> Value {
    json!({ "id": id, "name": format!("Scenario {}", id), "steps": steps })
}
