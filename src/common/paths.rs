//! Configuration, log and artifact paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/scenario-runner/`
//! - macOS: `~/Library/Application Support/scenario-runner/`
//! - Windows: `%APPDATA%\scenario-runner\`

use std::path::{Path, PathBuf};

/// Application name used for directories
const APP_NAME: &str = "scenario-runner";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Default directory for step screenshots
pub fn default_screenshot_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Screenshot path prefix for one scenario
///
/// Step screenshots are `{prefix}_{step}.png`, error captures
/// `{prefix}_{step}_error.png`.
pub fn screenshot_prefix(dir: &Path, scenario_id: &str) -> PathBuf {
    dir.join(format!("scenario_{}", sanitize(scenario_id)))
}

/// Path of the screenshot taken by a `screenshot` step
pub fn step_screenshot(prefix: &Path, step: usize) -> PathBuf {
    with_suffix(prefix, &format!("_{}.png", step))
}

/// Path of the screenshot captured after a step threw
pub fn error_screenshot(prefix: &Path, step: usize) -> PathBuf {
    with_suffix(prefix, &format!("_{}_error.png", step))
}

/// Remove screenshots left by an earlier run of the same scenario
///
/// Only files named exactly `{prefix}_{n}.png` or `{prefix}_{n}_error.png`
/// are touched, so a scenario whose id extends another id keeps its files.
pub fn remove_stale_screenshots(prefix: &Path) -> std::io::Result<usize> {
    let (Some(dir), Some(stem)) = (prefix.parent(), prefix.file_name()) else {
        return Ok(0);
    };
    let stem = stem.to_string_lossy();
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_screenshot_of(&name, &stem) {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn is_screenshot_of(file_name: &str, stem: &str) -> bool {
    let Some(rest) = file_name
        .strip_prefix(stem)
        .and_then(|r| r.strip_prefix('_'))
        .and_then(|r| r.strip_suffix(".png"))
    else {
        return false;
    };
    let number = rest.strip_suffix("_error").unwrap_or(rest);
    !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut os = prefix.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
