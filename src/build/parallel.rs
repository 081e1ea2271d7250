//! Task execution.
//!
//! [`TaskRunner`] walks the task graph: dependencies first, then the task's
//! action. Members of a parallel group are handed out to a pool of scoped
//! worker threads through a shared index.
//!
//! # Failure handling
//!
//! The first failing task stops the run. In a parallel group no further
//! member is started once one has failed; members already running finish,
//! and the members never started are reported as skipped. A series stops at
//! its first failing member.
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::{BuildContext, ConsoleProgress, TaskGraph, TaskRunner};
//!
//! let graph = TaskGraph::standard();
//! let reporter = ConsoleProgress::new();
//! let result = TaskRunner::new(&graph, context, &reporter)
//!     .with_jobs(4)
//!     .run(&["build".to_string()])?;
//! ```

use crate::build::context::BuildContext;
use crate::build::graph::{GraphError, TaskAction, TaskGraph, TaskKind};
use crate::build::progress::{ProgressEvent, ProgressReporter};
use crate::build::result::{BuildResult, TaskResult, TaskStatus};
use crate::error::TaskError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default number of parallel jobs (uses available parallelism).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Runs named tasks from a [`TaskGraph`].
pub struct TaskRunner<'a> {
    graph: &'a TaskGraph,
    context: BuildContext,
    reporter: &'a dyn ProgressReporter,
    jobs: usize,
}

impl<'a> TaskRunner<'a> {
    /// Create a new runner.
    pub fn new(
        graph: &'a TaskGraph,
        context: BuildContext,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self { graph, context, reporter, jobs: default_jobs() }
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// A runner sharing this one's graph, reporter and jobs, over another
    /// context.
    pub fn with_context(&self, context: BuildContext) -> TaskRunner<'a> {
        TaskRunner { graph: self.graph, context, reporter: self.reporter, jobs: self.jobs }
    }

    pub fn graph(&self) -> &TaskGraph {
        self.graph
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn reporter(&self) -> &dyn ProgressReporter {
        self.reporter
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run the requested tasks in order, stopping at the first failure.
    ///
    /// Unknown names are rejected before anything runs.
    pub fn run(&self, requested: &[String]) -> Result<BuildResult, GraphError> {
        let plan = self.graph.plan(requested)?;
        let start = Instant::now();

        self.reporter.report(ProgressEvent::BuildStarted { total_tasks: plan.len() });
        if self.context.is_verbose() {
            let names: Vec<String> = plan.iter().map(TaskKind::to_string).collect();
            tracing::debug!(jobs = self.jobs, "plan: {}", names.join(", "));
        }

        let mut result = BuildResult::new();
        for name in requested {
            result.merge(self.run_task(name));
            if !result.is_success() {
                break;
            }
        }
        let result = result.with_duration(start.elapsed());

        self.reporter.report(ProgressEvent::BuildCompleted {
            success: result.is_success(),
            duration_ms: result.total_duration.as_millis() as u64,
            succeeded: result.success_count(),
            skipped: result.skipped_count(),
            failed: result.failed_count(),
        });
        Ok(result)
    }

    /// Run one task: its dependencies, then its action.
    pub fn run_task(&self, name: &str) -> BuildResult {
        let mut result = BuildResult::new();
        let def = match self.graph.require(name) {
            Ok(def) => def,
            Err(e) => {
                let message = e.to_string();
                result.add_result(TaskResult::failed(name.to_string(), message, Duration::ZERO));
                return result;
            }
        };

        for dep in &def.deps {
            result.merge(self.run_task(dep));
            if !result.is_success() {
                self.skip_action(&def.action, name, &mut result);
                return result;
            }
        }

        match &def.action {
            TaskAction::Pipeline(kind) => result.add_result(self.run_pipeline(name, *kind)),
            TaskAction::Series(members) => result.merge(self.run_series(members)),
            TaskAction::Parallel(members) => result.merge(self.run_parallel(members)),
            TaskAction::Watch => {
                result.add_result(self.run_session(name, crate::watch::watch));
            }
            TaskAction::Serve => {
                result.add_result(self.run_session(name, crate::serve::serve));
            }
        }
        result
    }

    fn run_pipeline(&self, name: &str, kind: TaskKind) -> TaskResult {
        self.reporter.report(ProgressEvent::TaskStarted { task: name.to_string() });
        let start = Instant::now();
        let outcome = kind.run(&self.context, name);
        let duration = start.elapsed();

        let result = match outcome {
            Ok(output) => {
                if let Some(report) = &output.report {
                    self.output(name, report.clone());
                }
                if self.reporter.is_verbose() && !output.sizes.is_empty() {
                    let sizes: Vec<String> = output.sizes.iter().map(|s| s.to_string()).collect();
                    self.output(name, sizes.join("\n"));
                }
                TaskResult::success(name.to_string(), output, duration)
            }
            Err(e) => {
                if let Some(report) = e.report() {
                    self.output(name, report.to_string());
                }
                tracing::debug!(task = name, "task failed: {:?}", e);
                TaskResult::failed(name.to_string(), e.to_string(), duration)
            }
        };

        self.reporter.report(ProgressEvent::TaskCompleted {
            task: name.to_string(),
            status: result.status.clone(),
            duration_ms: duration.as_millis() as u64,
        });
        result
    }

    fn run_series(&self, members: &[String]) -> BuildResult {
        let mut result = BuildResult::new();
        for (i, member) in members.iter().enumerate() {
            result.merge(self.run_task(member));
            if !result.is_success() {
                for rest in &members[i + 1..] {
                    self.skip(rest, &mut result);
                }
                break;
            }
        }
        result
    }

    fn run_parallel(&self, members: &[String]) -> BuildResult {
        let failed = AtomicBool::new(false);
        let next_idx = AtomicUsize::new(0);
        let finished: Mutex<Vec<(usize, BuildResult)>> = Mutex::new(Vec::new());
        let num_workers = self.jobs.min(members.len());

        std::thread::scope(|s| {
            for _ in 0..num_workers {
                s.spawn(|| loop {
                    if failed.load(Ordering::SeqCst) {
                        break;
                    }

                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= members.len() {
                        break;
                    }

                    let result = self.run_task(&members[idx]);
                    if !result.is_success() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    if let Ok(mut finished) = finished.lock() {
                        finished.push((idx, result));
                    }
                });
            }
        });

        // Declaration order keeps the result deterministic
        let mut finished = finished.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        finished.sort_by_key(|(idx, _)| *idx);

        let mut started = vec![false; members.len()];
        let mut result = BuildResult::new();
        for (idx, member_result) in finished {
            started[idx] = true;
            result.merge(member_result);
        }
        for (member, _) in members.iter().zip(started).filter(|(_, started)| !started) {
            self.skip(member, &mut result);
        }
        result
    }

    /// Run a long-lived task (watcher, dev server) until it returns.
    fn run_session(
        &self,
        name: &str,
        session: fn(&TaskRunner<'_>) -> Result<(), TaskError>,
    ) -> TaskResult {
        let start = Instant::now();
        match session(self) {
            Ok(()) => TaskResult::success(name.to_string(), Default::default(), start.elapsed()),
            Err(e) => {
                self.reporter.report(ProgressEvent::Error {
                    task: Some(name.to_string()),
                    message: e.to_string(),
                });
                TaskResult::failed(name.to_string(), e.to_string(), start.elapsed())
            }
        }
    }

    /// Record every pipeline task reachable from `name` as not started.
    fn skip(&self, name: &str, result: &mut BuildResult) {
        for kind in self.graph.plan(&[name.to_string()]).unwrap_or_default() {
            let task = kind.to_string();
            self.reporter.report(ProgressEvent::TaskCompleted {
                task: task.clone(),
                status: TaskStatus::Skipped,
                duration_ms: 0,
            });
            result.add_result(TaskResult::skipped(task));
        }
    }

    fn skip_action(&self, action: &TaskAction, name: &str, result: &mut BuildResult) {
        match action {
            TaskAction::Pipeline(_) => self.skip(name, result),
            TaskAction::Parallel(members) | TaskAction::Series(members) => {
                for member in members {
                    self.skip(member, result);
                }
            }
            TaskAction::Watch | TaskAction::Serve => {}
        }
    }

    fn output(&self, task: &str, text: String) {
        self.reporter.report(ProgressEvent::Output { task: task.to_string(), text });
    }
}
