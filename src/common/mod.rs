//! Common utilities shared by the runner components

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use config::Config;
pub use error::{Error, Result};

/// Upgrade a plain-HTTP base URL to HTTPS and drop trailing slashes
pub fn normalize_base_url(base_url: &str) -> String {
    match base_url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => base_url.to_string(),
    }
    .trim_end_matches('/')
    .to_string()
}
