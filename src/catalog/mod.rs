//! Remote scenario catalog
//!
//! The catalog is a static site: `index.json` lists every scenario, and each
//! entry's `path` points at the scenario document relative to the same base.
//! Every request carries a `_=<unix seconds>` query parameter so caches in
//! front of the site never serve a stale copy.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::common::config::CatalogConfig;
use crate::common::{Error, Result};
use crate::scenario::{CatalogIndex, ScenarioDefinition};

/// Where scenario documents come from
#[async_trait]
pub trait ScenarioSource: Send + Sync {
    /// The catalog index
    async fn fetch_index(&self) -> Result<CatalogIndex>;

    /// One scenario document by its index path
    async fn fetch_scenario(&self, path: &str) -> Result<ScenarioDefinition>;
}

/// HTTP catalog client
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl CatalogClient {
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.base_url, &config.user_agent)
    }

    /// Absolute URL of a catalog document
    pub fn document_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.document_url(path);
        tracing::debug!(url = %url, "Fetching catalog document");

        let response = self
            .http
            .get(&url)
            .query(&[("_", cache_buster())])
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| Error::catalog_fetch(&url, e))?;

        if !response.status().is_success() {
            return Err(Error::catalog_fetch(
                &url,
                format!("HTTP {}", response.status()),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::catalog_fetch(&url, e))?;
        serde_json::from_str(&text).map_err(|e| Error::CatalogDocument {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ScenarioSource for CatalogClient {
    async fn fetch_index(&self) -> Result<CatalogIndex> {
        self.fetch_json("index.json").await
    }

    async fn fetch_scenario(&self, path: &str) -> Result<ScenarioDefinition> {
        self.fetch_json(path).await
    }
}

fn cache_buster() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}
