//! Element locators
//!
//! A locator is a selector string in the driver's selector syntax. Scoping
//! and index picks are expressed with the `>>` chaining operator, so a
//! locator can be handed to the driver as a single string.

use std::fmt;

/// Selects elements on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    selector: String,
}

impl Locator {
    /// Locator matching every element for `selector`
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    /// The first match
    pub fn first(&self) -> Self {
        self.nth(0)
    }

    /// The last match
    pub fn last(&self) -> Self {
        self.chain("nth=-1")
    }

    /// The match at `index` (0-based)
    pub fn nth(&self, index: usize) -> Self {
        self.chain(&format!("nth={}", index))
    }

    /// Elements matching `selector` inside this locator's matches
    pub fn locator(&self, selector: &str) -> Self {
        self.chain(selector)
    }

    /// Selector string sent to the driver
    pub fn selector(&self) -> &str {
        &self.selector
    }

    fn chain(&self, next: &str) -> Self {
        Self {
            selector: format!("{} >> {}", self.selector, next),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector)
    }
}

/// Split a comma-separated list of selector alternatives
pub fn split_alternatives(selectors: &str) -> Vec<&str> {
    selectors
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
