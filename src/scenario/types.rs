//! Scenario documents and run results
//!
//! Defines the data structures for deserializing catalog scenarios and for
//! the result records handed to the report renderer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::variables::{substitute_map, substitute_str, Variables};

/// A complete scenario document from the catalog
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDefinition {
    /// Stable identifier, also used for artifact names
    pub id: String,
    /// Display name
    pub name: String,
    /// What the scenario verifies
    #[serde(default)]
    pub description: String,
    /// State the application must be in beforehand
    #[serde(default)]
    pub precondition: String,
    /// Start from the saved authenticated session
    #[serde(default)]
    pub requires_auth: bool,
    /// Variable values used unless overridden
    #[serde(default)]
    pub defaults: Variables,
    /// The sequence of steps to execute
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
    /// Free-form classification labels
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A single step, before interpretation
///
/// Parameters are kept as raw JSON until placeholders have been substituted;
/// the interpreter parses them into a typed action afterwards.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StepDefinition {
    /// Action kind, e.g. "navigate", "expect", "retryUntilGa"
    #[serde(default)]
    pub action: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Action-specific parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl StepDefinition {
    /// Description shown in progress lines and reports
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.action)
    }

    /// Copy of this step with variables substituted everywhere
    pub fn substituted(&self, vars: &Variables) -> Self {
        Self {
            action: substitute_str(&self.action, vars),
            description: self
                .description
                .as_ref()
                .map(|d| substitute_str(d, vars)),
            params: substitute_map(&self.params, vars),
        }
    }

    /// The whole step as one JSON object, `action` included
    pub fn to_value(&self) -> Value {
        let mut map = self.params.clone();
        map.insert("action".to_string(), Value::String(self.action.clone()));
        if let Some(desc) = &self.description {
            map.insert("description".to_string(), Value::String(desc.clone()));
        }
        Value::Object(map)
    }
}

/// Kind of an index entry
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    Test,
    StateSetup,
    #[serde(other)]
    Other,
}

impl ScenarioKind {
    /// Whether scenarios of this kind are executed by a run
    pub fn is_runnable(&self) -> bool {
        matches!(self, ScenarioKind::Test | ScenarioKind::StateSetup)
    }
}

/// One entry of the catalog index
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScenarioMeta {
    pub id: String,
    pub name: String,
    /// Document path relative to the catalog base
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ScenarioKind,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl ScenarioMeta {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// The catalog index document
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CatalogIndex {
    #[serde(default)]
    pub scenarios: Vec<ScenarioMeta>,
}

/// Verdict of a step or scenario
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
}

/// Result of one executed step
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepResult {
    pub status: Status,
    #[serde(rename = "desc")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl StepResult {
    pub fn pass(description: impl Into<String>) -> Self {
        Self {
            status: Status::Pass,
            description: description.into(),
            error: None,
            screenshot: None,
        }
    }

    pub fn fail(description: impl Into<String>, error: Option<String>) -> Self {
        Self {
            status: Status::Fail,
            description: description.into(),
            error,
            screenshot: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

/// Result of one scenario run
///
/// `steps` is shorter than the scenario's step list only when execution
/// stopped at a failing step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    pub id: String,
    pub name: String,
    pub description: String,
    pub precondition: String,
    pub steps: Vec<StepResult>,
    pub status: Status,
}

impl ScenarioResult {
    /// Build a result; the status is derived from the steps
    pub fn new(scenario: &ScenarioDefinition, steps: Vec<StepResult>) -> Self {
        let status = if steps.iter().all(StepResult::passed) {
            Status::Pass
        } else {
            Status::Fail
        };
        Self {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            precondition: scenario.precondition.clone(),
            steps,
            status,
        }
    }

    /// Result for a scenario that could not start at all
    ///
    /// Records the failure against its first step so the result still holds
    /// a failing step.
    pub fn not_started(scenario: &ScenarioDefinition, error: String) -> Self {
        let description = scenario
            .steps
            .first()
            .map(|s| s.label().to_string())
            .unwrap_or_else(|| scenario.name.clone());
        Self::new(scenario, vec![StepResult::fail(description, Some(error))])
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }

    /// Number of passing steps
    pub fn steps_passed(&self) -> usize {
        self.steps.iter().filter(|s| s.passed()).count()
    }

    /// The step that stopped the scenario, if any
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.passed())
    }
}
