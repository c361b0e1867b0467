//! Scenario documents, variables and results

mod types;
pub mod variables;

pub use types::*;
pub use variables::{substitute, Variables};
