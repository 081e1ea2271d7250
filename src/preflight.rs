//! Preflight checks for the style source tree.
//!
//! The style sources import a fixed set of partials; a missing one only
//! surfaces as a confusing compile error deep inside a build, so the
//! `checkScss` task verifies them up front.

use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::error::TaskError;
use std::path::Path;

/// Result of a single preflight check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), passed: true, message: message.into() }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), passed: false, message: message.into() }
    }
}

/// Check that every required partial exists under `root`.
pub fn check_partials(root: &Path, required: &[String]) -> Vec<CheckResult> {
    required
        .iter()
        .map(|name| {
            let path = root.join(name);
            if path.is_file() {
                CheckResult::pass(name.as_str(), format!("{} exists", path.display()))
            } else {
                CheckResult::fail(name.as_str(), format!("{} not found", path.display()))
            }
        })
        .collect()
}

/// The `checkScss` task.
pub fn check_styles(ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
    let root = ctx.style_root();
    let results = check_partials(&root, &ctx.config().styles.required_partials);

    let missing: Vec<String> =
        results.iter().filter(|r| !r.passed).map(|r| r.name.clone()).collect();
    if !missing.is_empty() {
        return Err(TaskError::MissingPartials { root, missing });
    }

    tracing::info!(task, checked = results.len(), "all required partials present");
    Ok(TaskOutput::new())
}
