//! Task progress reporting.
//!
//! Reporters receive [`ProgressEvent`]s from the task runner and the watch
//! reactor. The console reporter prints gulp-style task lines with optional
//! colors; the JSON reporter writes one object per line.
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::TaskStarted { task: "sass".to_string() });
//! ```

use crate::build::result::TaskStatus;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Events that can be reported during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A run started
    BuildStarted {
        /// Number of pipeline tasks the run will execute
        total_tasks: usize,
    },
    /// A pipeline task started
    TaskStarted { task: String },
    /// A pipeline task finished
    TaskCompleted { task: String, status: TaskStatus, duration_ms: u64 },
    /// A run finished
    BuildCompleted {
        success: bool,
        duration_ms: u64,
        succeeded: usize,
        skipped: usize,
        failed: usize,
    },
    /// Multi-line task output such as a lint report or output sizes
    Output { task: String, text: String },
    /// A warning was generated
    Warning { task: Option<String>, message: String },
    /// An error occurred
    Error { task: Option<String>, message: String },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    quiet: bool,
    current: AtomicUsize,
    total: AtomicUsize,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a console reporter on stderr, colored when stderr is a terminal.
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
            verbose: false,
            quiet: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            quiet: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Only report warnings, errors and lint output.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn magenta(&self, text: &str) -> String {
        self.color(text, "\x1b[35m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { total_tasks } => {
                self.total.store(total_tasks, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if self.verbose && total_tasks > 0 {
                    self.writeln(&format!(
                        "Running {} task{}",
                        total_tasks,
                        if total_tasks == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::TaskStarted { task } => {
                if !self.quiet {
                    self.writeln(&format!("Starting '{}'...", self.cyan(&task)));
                }
            }
            ProgressEvent::TaskCompleted { task, status, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);
                let counter = if self.verbose && total > 0 {
                    format!(" [{}/{}]", current, total)
                } else {
                    String::new()
                };
                let duration = self.magenta(&format_duration(duration_ms));

                match status {
                    TaskStatus::Success if !self.quiet => {
                        self.writeln(&format!(
                            "Finished '{}' after {}{}",
                            self.cyan(&task),
                            duration,
                            counter
                        ));
                    }
                    TaskStatus::Skipped if !self.quiet => {
                        self.writeln(&format!(
                            "Skipped '{}' {}",
                            self.cyan(&task),
                            self.yellow("(not started)")
                        ));
                    }
                    TaskStatus::Failed(err) => {
                        self.writeln(&format!(
                            "'{}' {} after {}",
                            self.cyan(&task),
                            self.red("errored"),
                            duration
                        ));
                        self.writeln(&format!("        {}", self.red(&err)));
                    }
                    _ => {}
                }
            }
            ProgressEvent::BuildCompleted { success, duration_ms, succeeded, skipped, failed } => {
                let duration = format_duration(duration_ms);
                if !success {
                    self.writeln(&format!(
                        "{} {} succeeded, {} skipped, {} {} in {}",
                        self.red("[error]"),
                        succeeded,
                        skipped,
                        failed,
                        if failed == 1 { "failure" } else { "failures" },
                        duration
                    ));
                } else if self.verbose {
                    self.writeln(&format!(
                        "{} {} task{} in {}",
                        self.green("[done]"),
                        succeeded,
                        if succeeded == 1 { "" } else { "s" },
                        duration
                    ));
                }
            }
            ProgressEvent::Output { task: _, text } => {
                self.writeln(text.trim_end_matches('\n'));
            }
            ProgressEvent::Warning { task, message } => {
                let prefix = task.map(|t| format!("{}: ", t)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { task, message } => {
                let prefix = task.map(|t| format!("{}: ", t)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.red("[error]"), prefix, message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: &Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// The JSON object written for an event.
pub fn event_json(event: &ProgressEvent) -> Value {
    match event {
        ProgressEvent::BuildStarted { total_tasks } => {
            json!({ "event": "build_started", "total_tasks": total_tasks })
        }
        ProgressEvent::TaskStarted { task } => json!({ "event": "task_started", "task": task }),
        ProgressEvent::TaskCompleted { task, status, duration_ms } => {
            let mut value = json!({
                "event": "task_completed",
                "task": task,
                "status": match status {
                    TaskStatus::Success => "success",
                    TaskStatus::Skipped => "skipped",
                    TaskStatus::Failed(_) => "failed",
                },
                "duration_ms": duration_ms,
            });
            if let TaskStatus::Failed(e) = status {
                value["error"] = json!(e);
            }
            value
        }
        ProgressEvent::BuildCompleted { success, duration_ms, succeeded, skipped, failed } => {
            json!({
                "event": "build_completed",
                "success": success,
                "duration_ms": duration_ms,
                "succeeded": succeeded,
                "skipped": skipped,
                "failed": failed,
            })
        }
        ProgressEvent::Output { task, text } => {
            json!({ "event": "output", "task": task, "text": text })
        }
        ProgressEvent::Warning { task, message } => {
            json!({ "event": "warning", "task": task, "message": message })
        }
        ProgressEvent::Error { task, message } => {
            json!({ "event": "error", "task": task, "message": message })
        }
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        self.write_json(&event_json(&event));
    }
}

/// Format a duration in milliseconds to a human-readable string.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{} ms", ms)
    } else if ms < 60_000 {
        format!("{:.2} s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{} min {} s", minutes, seconds)
    }
}
