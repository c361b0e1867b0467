//! Error types for the scenario runner
//!
//! These are *environment* errors: a browser operation threw, the catalog
//! could not be reached, the configuration is broken. Business outcomes of a
//! step (an assertion that did not hold, a missing step parameter) are not
//! errors; they are recorded as failing step results.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scenario runner
#[derive(Error, Debug)]
pub enum Error {
    // === Catalog Errors ===
    #[error("Failed to fetch '{url}': {message}")]
    CatalogFetch { url: String, message: String },

    #[error("Invalid catalog document '{path}': {message}")]
    CatalogDocument { path: String, message: String },

    // === Driver Errors ===
    #[error("Browser driver '{command}' not found. Set [driver].command in the config file or put it on PATH")]
    DriverNotFound { command: String },

    #[error("Browser driver failed to start: {0}")]
    DriverStartFailed(String),

    #[error("Browser driver exited unexpectedly")]
    DriverCrashed,

    #[error("Driver protocol error: {0}")]
    DriverProtocol(String),

    #[error("Driver request '{command}' failed: {message}")]
    DriverRequestFailed { command: String, message: String },

    // === Browser Operation Errors ===
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Timed out after {timeout_ms} ms waiting for URL matching '{pattern}' (last URL: {last_url})")]
    UrlTimeout {
        pattern: String,
        last_url: String,
        timeout_ms: u64,
    },

    // === Scheduling Errors ===
    #[error("happy-path and edge-case scenarios cannot run together; add --label happy-path or --label edge-case. Matched: {}", .matched.join(", "))]
    LabelConflict { matched: Vec<String> },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a catalog fetch error
    pub fn catalog_fetch(url: &str, message: impl ToString) -> Self {
        Self::CatalogFetch {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a driver request failed error
    pub fn driver_request_failed(command: &str, message: &str) -> Self {
        Self::DriverRequestFailed {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// True for errors that mean the whole browser instance is gone
    pub fn is_fatal_to_browser(&self) -> bool {
        matches!(self, Error::DriverCrashed | Error::DriverStartFailed(_))
    }
}
