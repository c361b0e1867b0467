//! Client-side store handles
//!
//! The application exposes its state containers as window globals. Scenario
//! steps name a store by tag; this table maps tags to globals. Unknown tags
//! are rejected.

use std::collections::BTreeMap;

use crate::common::{Error, Result};

/// Tag -> window global name
#[derive(Debug, Clone)]
pub struct StoreRegistry {
    handles: BTreeMap<String, String>,
}

impl Default for StoreRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.handles.insert(
            "COUNSEL".to_string(),
            conventional_global("COUNSEL"),
        );
        registry
    }
}

impl StoreRegistry {
    /// Registry without any handles
    pub fn empty() -> Self {
        Self {
            handles: BTreeMap::new(),
        }
    }

    /// Default handles plus configured ones
    ///
    /// An empty global name stands for the tag's conventional global.
    pub fn with_entries(entries: &BTreeMap<String, String>) -> Result<Self> {
        let mut registry = Self::default();
        for (tag, global) in entries {
            if global.is_empty() {
                registry.register_conventional(tag)?;
            } else {
                registry.register(tag, global)?;
            }
        }
        Ok(registry)
    }

    /// Map a tag to a global name
    pub fn register(&mut self, tag: &str, global: &str) -> Result<()> {
        if !is_js_identifier(global) {
            return Err(Error::Config(format!(
                "Store '{}' maps to '{}', which is not a valid JavaScript identifier",
                tag, global
            )));
        }
        self.handles.insert(tag.to_string(), global.to_string());
        Ok(())
    }

    /// Map a tag to its conventional `__{TAG}_STORE__` global
    pub fn register_conventional(&mut self, tag: &str) -> Result<()> {
        self.register(tag, &conventional_global(tag))
    }

    /// Global name for a tag, or a diagnostic naming the known tags
    pub fn resolve(&self, tag: &str) -> std::result::Result<&str, String> {
        self.handles.get(tag).map(String::as_str).ok_or_else(|| {
            let known: Vec<&str> = self.handles.keys().map(String::as_str).collect();
            format!("Unknown store '{}'. Known stores: {:?}", tag, known)
        })
    }
}

/// `COUNSEL` -> `__COUNSEL_STORE__`
pub fn conventional_global(tag: &str) -> String {
    format!("__{}_STORE__", tag)
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Format a Korean phone number for display
///
/// 11 digits are grouped 3-4-4, 10 digits 3-3-4. Anything else, including
/// already formatted numbers, is returned unchanged.
pub fn format_phone(raw: &str) -> String {
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.to_string();
    }
    match raw.len() {
        11 => format!("{}-{}-{}", &raw[..3], &raw[3..7], &raw[7..]),
        10 => format!("{}-{}-{}", &raw[..3], &raw[3..6], &raw[6..]),
        _ => raw.to_string(),
    }
}
