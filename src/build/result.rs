//! Task result types.
//!
//! Contains types for representing the outcome of task runs.

use crate::pipeline::size::SizeReport;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task succeeded
    Success,
    /// Task not started because an earlier task failed
    Skipped,
    /// Task failed with error
    Failed(String),
}

impl TaskStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// What a pipeline produced.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    /// Files written
    pub files: Vec<PathBuf>,
    /// Size of every written file
    pub sizes: Vec<SizeReport>,
    /// Non-fatal problems
    pub warnings: Vec<String>,
    /// Formatted lint report, if the task is a linter
    pub report: Option<String>,
}

impl TaskOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output consisting only of written files.
    pub fn with_files(files: Vec<PathBuf>) -> Self {
        Self { files, ..Self::default() }
    }

    /// Merge another output into this one.
    pub fn extend(&mut self, other: TaskOutput) {
        self.files.extend(other.files);
        self.sizes.extend(other.sizes);
        self.warnings.extend(other.warnings);
        if let Some(report) = other.report {
            match &mut self.report {
                Some(existing) => existing.push_str(&report),
                None => self.report = Some(report),
            }
        }
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Name of the task
    pub task: String,
    /// Task status
    pub status: TaskStatus,
    /// What the task produced
    pub output: TaskOutput,
    /// Task duration
    pub duration: Duration,
}

impl TaskResult {
    /// Create a successful result.
    pub fn success(task: String, output: TaskOutput, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Success, output, duration }
    }

    /// Create a skipped result.
    pub fn skipped(task: String) -> Self {
        Self {
            task,
            status: TaskStatus::Skipped,
            output: TaskOutput::default(),
            duration: Duration::ZERO,
        }
    }

    /// Create a failed result.
    pub fn failed(task: String, error: String, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Failed(error), output: TaskOutput::default(), duration }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each task, in completion order
    pub tasks: Vec<TaskResult>,
    /// Total duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Append every result of another run.
    pub fn merge(&mut self, other: BuildResult) {
        self.tasks.extend(other.tasks);
        self.total_duration += other.total_duration;
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Get the number of successful tasks.
    pub fn success_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_success()).count()
    }

    /// Get the number of skipped tasks.
    pub fn skipped_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Skipped)).count()
    }

    /// Get the number of failed tasks.
    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the run succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get the result of a task by name.
    pub fn get(&self, task: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task == task)
    }

    /// Get all files written.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| r.output.files.iter()).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.tasks.iter().flat_map(|r| r.output.warnings.iter()).collect()
    }

    /// Get failed task results.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// The first failure, as reported to the user.
    pub fn first_failure(&self) -> Option<(&str, &str)> {
        self.tasks.iter().find_map(|r| match &r.status {
            TaskStatus::Failed(message) => Some((r.task.as_str(), message.as_str())),
            _ => None,
        })
    }

    /// Format a summary of the run.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.tasks.len();

        if failed > 0 {
            lines.push(format!(
                "Failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for task in self.failures() {
                lines.push(format!("  - {}: {}", task.task, task.status));
            }
        } else {
            lines.push(format!(
                "Finished: {} task(s) in {:.2}s",
                success,
                self.total_duration.as_secs_f64()
            ));
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}
