//! Watch mode: re-run tasks when their sources change
//!
//! One debounced watcher covers the base directory of every category glob.
//! Each changed path is matched against the category globs and bound to the
//! task that rebuilds it. A task re-runs at most once per
//! `watch.min_interval_ms`; changes arriving inside that window mark it
//! pending and it runs once the window has passed.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::build::graph::TaskKind;
use crate::build::parallel::TaskRunner;
use crate::build::progress::ProgressEvent;
use crate::error::TaskError;
use crate::paths::{Category, PathRegistry};
use crate::report::ErrorReporter;
use crate::serve::LiveReload;

/// What a changed file asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Re-run a pipeline task
    Task(TaskKind),
    /// Reload connected browsers
    Reload,
}

/// Triggers for a changed path, in category registration order.
pub fn triggers_for(registry: &PathRegistry, path: &Path) -> Vec<Trigger> {
    registry
        .categories_for(path)
        .into_iter()
        .map(|category| match TaskKind::for_category(category) {
            Some(kind) => Trigger::Task(kind),
            None => Trigger::Reload,
        })
        .collect()
}

/// Directories to watch: the existing base of every category, with bases
/// already covered by a recursive watch removed.
pub fn watch_roots(registry: &PathRegistry) -> Vec<(PathBuf, RecursiveMode)> {
    let mut roots: Vec<(PathBuf, RecursiveMode)> = Vec::new();
    for category in Category::ALL {
        let base = registry.base(category);
        if !base.is_dir() {
            tracing::debug!(category = %category, base = %base.display(), "not watching");
            continue;
        }
        let mode = if registry.pattern(category).contains("**") {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        match roots.iter_mut().find(|(path, _)| *path == base) {
            Some(existing) if mode == RecursiveMode::Recursive => existing.1 = mode,
            Some(_) => {}
            None => roots.push((base, mode)),
        }
    }

    let recursive: Vec<PathBuf> = roots
        .iter()
        .filter(|(_, mode)| *mode == RecursiveMode::Recursive)
        .map(|(path, _)| path.clone())
        .collect();
    roots.retain(|(path, _)| !recursive.iter().any(|r| path != r && path.starts_with(r)));
    roots
}

/// Rate limiter for task re-runs.
#[derive(Debug)]
pub struct RerunScheduler {
    min_interval: Duration,
    last_run: HashMap<TaskKind, Instant>,
    /// Scheduled tasks and when they may run
    pending: Vec<(TaskKind, Instant)>,
}

impl RerunScheduler {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_run: HashMap::new(), pending: Vec::new() }
    }

    /// Mark `kind` as needing a run. A task already pending stays pending
    /// once.
    pub fn schedule(&mut self, kind: TaskKind, now: Instant) {
        if self.pending.iter().any(|(k, _)| *k == kind) {
            return;
        }
        let due = match self.last_run.get(&kind) {
            Some(last) => (*last + self.min_interval).max(now),
            None => now,
        };
        self.pending.push((kind, due));
    }

    /// Take every task that may run at `now`, in scheduling order.
    pub fn due(&mut self, now: Instant) -> Vec<TaskKind> {
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|(_, due)| *due <= now);
        self.pending = waiting;
        ready
            .into_iter()
            .map(|(kind, _)| {
                self.last_run.insert(kind, now);
                kind
            })
            .collect()
    }

    /// The earliest time a pending task becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|(_, due)| *due).min()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Turns file changes into task runs.
pub struct Reactor<'r, 'a> {
    runner: &'r TaskRunner<'a>,
    scheduler: RerunScheduler,
    errors: ErrorReporter,
    livereload: Option<LiveReload>,
}

impl<'r, 'a> Reactor<'r, 'a> {
    pub fn new(runner: &'r TaskRunner<'a>) -> Self {
        let config = runner.context().config();
        Self {
            runner,
            scheduler: RerunScheduler::new(Duration::from_millis(
                config.watch.min_interval_ms as u64,
            )),
            errors: ErrorReporter::new(config.notify.beep),
            livereload: runner.context().livereload().cloned(),
        }
    }

    /// Replace the failure sink.
    pub fn with_errors(mut self, errors: ErrorReporter) -> Self {
        self.errors = errors;
        self
    }

    pub fn scheduler(&self) -> &RerunScheduler {
        &self.scheduler
    }

    /// Record changed paths. Returns whether a browser reload was requested.
    pub fn changed(&mut self, paths: &[PathBuf], now: Instant) -> bool {
        let registry = self.runner.context().registry();
        let mut reload = false;
        for path in paths {
            let triggers = triggers_for(registry, path);
            if !triggers.is_empty() {
                tracing::info!(path = %path.display(), "changed");
            }
            for trigger in triggers {
                match trigger {
                    Trigger::Task(kind) => self.scheduler.schedule(kind, now),
                    Trigger::Reload => reload = true,
                }
            }
        }
        if reload {
            if let Some(livereload) = &self.livereload {
                livereload.reload();
            }
        }
        reload
    }

    /// Run every due task. Failures are reported and do not stop watching.
    pub fn run_due(&mut self, now: Instant) -> Vec<TaskKind> {
        let due = self.scheduler.due(now);
        for kind in &due {
            let result = self.runner.run_task(&kind.to_string());
            if let Some((task, message)) = result.first_failure() {
                self.errors.report(task, message);
            }
        }
        due
    }

    /// How long to block waiting for the next change.
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.scheduler.next_deadline().map(|deadline| deadline.saturating_duration_since(now))
    }
}

/// Create the compiled-style directory so it can be watched from the start.
/// On a fresh checkout it only appears once a style task has run.
pub fn ensure_css_dir(registry: &PathRegistry) -> Result<PathBuf, TaskError> {
    let css_dir = registry.css_dir();
    std::fs::create_dir_all(&css_dir).map_err(|e| TaskError::io(&css_dir, e))?;
    Ok(css_dir)
}

/// Clear the terminal screen
fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Watch sources and re-run the bound tasks until the process is stopped.
pub fn watch(runner: &TaskRunner<'_>) -> Result<(), TaskError> {
    let context = runner.context();
    let config = &context.config().watch;
    ensure_css_dir(context.registry())?;
    let roots = watch_roots(context.registry());
    if roots.is_empty() {
        return Err(TaskError::Watch("no source directory exists".to_string()));
    }

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce, tx)
        .map_err(|e| TaskError::Watch(format!("failed to initialize file watcher: {}", e)))?;
    for (root, mode) in &roots {
        debouncer
            .watcher()
            .watch(root, *mode)
            .map_err(|e| TaskError::Watch(format!("{}: {}", root.display(), e)))?;
        tracing::debug!(root = %root.display(), "watching");
    }

    runner.reporter().report(ProgressEvent::Warning {
        task: None,
        message: format!("Watching {} director(ies) for changes", roots.len()),
    });

    let mut reactor = Reactor::new(runner);
    loop {
        let received = match reactor.timeout(Instant::now()) {
            Some(timeout) => rx.recv_timeout(timeout),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(events)) => {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .collect();
                reactor.changed(&paths, Instant::now());
            }
            Ok(Err(error)) => {
                tracing::warn!("watch error: {:?}", error);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(TaskError::Watch("watcher channel closed".to_string()));
            }
        }

        if reactor.timeout(Instant::now()) == Some(Duration::ZERO) {
            if config.clear_screen {
                clear_screen();
            }
            reactor.run_due(Instant::now());
        }
    }
}
