//! Scenario selection

use crate::common::{Error, Result};
use crate::scenario::{CatalogIndex, ScenarioMeta};

/// Label of scenarios that create backend state
pub const HAPPY_PATH: &str = "happy-path";
/// Label of scenarios that only check the UI
pub const EDGE_CASE: &str = "edge-case";

/// Whether `labels` satisfy every filter term
///
/// Terms are ANDed; a term may list comma-separated alternatives, which are
/// ORed. `["happy-path", "inperson,phone"]` selects happy-path scenarios
/// labelled inperson or phone. No terms select everything.
pub fn matches_labels<S: AsRef<str>>(labels: &[S], filters: &[S]) -> bool {
    filters.iter().all(|term| {
        term.as_ref()
            .split(',')
            .map(str::trim)
            .any(|alt| labels.iter().any(|l| l.as_ref() == alt))
    })
}

/// Runnable index entries under `feature_path` matching the label filters
pub fn select(index: &CatalogIndex, feature_path: &str, filters: &[String]) -> Vec<ScenarioMeta> {
    index
        .scenarios
        .iter()
        .filter(|meta| meta.kind.is_runnable())
        .filter(|meta| meta.path.starts_with(feature_path))
        .filter(|meta| matches_labels(&meta.labels, filters))
        .cloned()
        .collect()
}

/// Refuse selections mixing happy-path and edge-case scenarios
///
/// Happy paths create the very state edge cases must not see.
pub fn check_conflict(selected: &[ScenarioMeta]) -> Result<()> {
    let has_happy = selected.iter().any(|m| m.has_label(HAPPY_PATH));
    let has_edge = selected.iter().any(|m| m.has_label(EDGE_CASE));
    if has_happy && has_edge {
        return Err(Error::LabelConflict {
            matched: selected.iter().map(|m| m.name.clone()).collect(),
        });
    }
    Ok(())
}
