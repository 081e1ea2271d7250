//! Build system integration tests.
//!
//! Tests cover the task graph and runner end to end:
//!
//! - Cleanup before the parallel build group
//! - Fail-fast propagation of lint failures
//! - Preflight partial checks
//! - Graph validation
//! - Watch triggers and re-run coalescing
//! - Live-reload script injection

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use assetpipe::build::{
    BuildContext, GraphError, NullProgress, ProgressEvent, ProgressReporter, TaskAction, TaskDef,
    TaskGraph, TaskKind, TaskRunner, TaskStatus,
};
use assetpipe::config::AssetConfig;
use assetpipe::preflight::check_partials;
use assetpipe::serve::inject_script;
use assetpipe::watch::{triggers_for, RerunScheduler, Trigger};

// ============================================================================
// Test Utilities
// ============================================================================

/// Records every progress event.
#[derive(Default)]
struct Recorder(Mutex<Vec<ProgressEvent>>);

impl Recorder {
    fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::TaskStarted { task } => Some(task),
                _ => None,
            })
            .collect()
    }

    fn completed(&self) -> Vec<(String, TaskStatus)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::TaskCompleted { task, status, .. } => Some((task, status)),
                _ => None,
            })
            .collect()
    }

    fn outputs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Output { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn events(&self) -> Vec<ProgressEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl ProgressReporter for Recorder {
    fn report(&self, event: ProgressEvent) {
        self.0.lock().unwrap().push(event);
    }
}

/// Create a test file with content.
fn create_test_file(root: &Path, name: &str, content: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// A project whose scripts go through `cat` and whose styles need no
/// vendored libraries.
fn create_test_project() -> (TempDir, BuildContext) {
    let temp = TempDir::new().unwrap();
    let mut config = AssetConfig::default();
    config.styles.include_paths.clear();
    config.scripts.transpile = vec!["cat".to_string()];
    config.scripts.minify = vec!["cat".to_string()];

    let root = temp.path();
    create_test_file(root, "node_modules/normalize.css/normalize.css", "html { margin: 0; }\n");
    create_test_file(root, "src/scss/_colors.scss", "$brand: #336699;\n");
    create_test_file(root, "src/scss/main.scss", "body { color: $brand; }\n");
    create_test_file(root, "src/scss/components/foo.scss", ".foo { .bar { color: red; } }\n");
    create_test_file(root, "src/scss/sections/hero.scss", ".hero { display: flex; }\n");
    create_test_file(root, "src/js/app.ts", "const a = 1;\n");
    create_test_file(root, "src/fonts/sans/regular.woff2", "font");
    create_test_file(root, "index.html", "<html><body></body></html>");

    let ctx = BuildContext::new(config, root.to_path_buf());
    (temp, ctx)
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Build Orchestration
// ============================================================================

#[cfg(unix)]
#[test]
fn test_build_cleans_first_then_builds_every_category() {
    let (temp, ctx) = create_test_project();
    let stale = create_test_file(temp.path(), "assets/stale.min.css", "old");
    create_test_file(temp.path(), "src/css/stale.css", "old");

    let graph = TaskGraph::standard();
    let recorder = Recorder::default();
    let runner = TaskRunner::new(&graph, ctx, &recorder).with_jobs(4);
    let result = runner.run(&names(&["build"])).unwrap();

    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(recorder.started().first().map(String::as_str), Some("cleanAssets"));
    let completed = recorder.completed();
    assert_eq!(completed.first().map(|(t, _)| t.as_str()), Some("cleanAssets"));
    assert_eq!(completed.len(), 10);

    assert!(!stale.exists());
    assert!(!temp.path().join("src/css/stale.css").exists());
    assert!(temp.path().join("src/css/component-foo.css").exists());
    assert!(temp.path().join("src/css/section-hero.css").exists());
    assert!(temp.path().join("src/css/styles.css").exists());
    assert!(temp.path().join("assets/app.min.js").exists());
    assert!(temp.path().join("assets/sans/regular.woff2").exists());
}

#[cfg(unix)]
#[test]
fn test_component_style_reaches_distribution() {
    let (temp, ctx) = create_test_project();
    let graph = TaskGraph::standard();
    let runner = TaskRunner::new(&graph, ctx, &NullProgress);

    let result = runner.run(&names(&["sassComponents", "minifyCss"])).unwrap();
    assert!(result.is_success(), "{}", result.summary());

    let compiled = fs::read_to_string(temp.path().join("src/css/component-foo.css")).unwrap();
    assert!(compiled.contains(".foo .bar"));

    let minified = fs::read_to_string(temp.path().join("assets/component-foo.min.css")).unwrap();
    assert!(minified.starts_with(".foo .bar{color:red}"));
    assert!(minified.contains("sourceMappingURL=data:application/json;"));
}

#[test]
fn test_lint_failure_stops_the_run() {
    let (temp, ctx) = create_test_project();
    create_test_file(temp.path(), "src/scss/bad.scss", "#header { color: red; }\n");

    let graph = TaskGraph::standard();
    let recorder = Recorder::default();
    let runner = TaskRunner::new(&graph, ctx, &recorder);
    let result = runner.run(&names(&["lintScss", "cleanAssets"])).unwrap();

    assert!(!result.is_success());
    let (task, message) = result.first_failure().unwrap();
    assert_eq!(task, "lintScss");
    assert!(message.contains("1 error(s)"), "{}", message);

    // The report is shown before the failure, and nothing runs afterwards
    assert!(recorder.outputs().iter().any(|text| text.contains("no-ids")));
    assert!(!recorder.started().contains(&"cleanAssets".to_string()));
}

#[test]
fn test_unknown_task_runs_nothing() {
    let (_temp, ctx) = create_test_project();
    let graph = TaskGraph::standard();
    let recorder = Recorder::default();
    let runner = TaskRunner::new(&graph, ctx, &recorder);

    let err = runner.run(&names(&["cleanAssets", "deploy"])).unwrap_err();
    assert_eq!(err, GraphError::UnknownTask("deploy".to_string()));
    assert!(recorder.events().is_empty());
}

// ============================================================================
// Preflight
// ============================================================================

const PARTIALS: [&str; 5] =
    ["_colors.scss", "_fonts.scss", "_mixins.scss", "_functions.scss", "_variables.scss"];

#[test]
fn test_required_partials_present() {
    let temp = TempDir::new().unwrap();
    for partial in PARTIALS {
        create_test_file(temp.path(), partial, "");
    }
    let required = names(&PARTIALS);
    assert!(check_partials(temp.path(), &required).iter().all(|c| c.passed));
}

#[test]
fn test_check_scss_names_missing_partial() {
    let (temp, ctx) = create_test_project();
    for partial in PARTIALS {
        create_test_file(temp.path(), &format!("src/scss/{}", partial), "");
    }
    fs::remove_file(temp.path().join("src/scss/_mixins.scss")).unwrap();

    let graph = TaskGraph::standard();
    let runner = TaskRunner::new(&graph, ctx, &NullProgress);
    let result = runner.run(&names(&["checkScss"])).unwrap();
    let (_, message) = result.first_failure().unwrap();
    assert!(message.contains("_mixins.scss"));
    assert!(!message.contains("_colors.scss"));
}

// ============================================================================
// Task Graph
// ============================================================================

#[test]
fn test_standard_graph_is_valid() {
    let graph = TaskGraph::standard();
    assert_eq!(graph.len(), 17);
    assert!(graph.validate().is_ok());
}

#[test]
fn test_cycle_is_reported_with_path() {
    let mut graph = TaskGraph::new();
    graph.insert(TaskDef::new("a", "", TaskAction::Series(names(&["b"]))));
    graph.insert(TaskDef::new("b", "", TaskAction::Watch).with_dependency("a"));

    let err = graph.validate().unwrap_err();
    assert_eq!(err.to_string(), "Circular task dependency: a -> b -> a");
}

// ============================================================================
// Watching
// ============================================================================

#[test]
fn test_changed_files_map_to_tasks() {
    let (temp, ctx) = create_test_project();
    let registry = ctx.registry();
    let root = temp.path();

    let cases = [
        ("src/scss/components/foo.scss", Trigger::Task(TaskKind::SassComponents)),
        ("src/scss/sections/hero.scss", Trigger::Task(TaskKind::SassSections)),
        ("src/scss/main.scss", Trigger::Task(TaskKind::Sass)),
        ("src/js/app.ts", Trigger::Task(TaskKind::Js)),
        ("src/css/component-foo.css", Trigger::Task(TaskKind::MinifyCss)),
        ("src/fonts/sans/regular.woff2", Trigger::Task(TaskKind::Fonts)),
        ("index.html", Trigger::Reload),
    ];
    for (path, expected) in cases {
        assert_eq!(triggers_for(registry, &root.join(path)), vec![expected], "{}", path);
    }
    assert!(triggers_for(registry, &root.join("README.md")).is_empty());
}

#[test]
fn test_rapid_changes_coalesce_into_one_rerun() {
    let mut scheduler = RerunScheduler::new(Duration::from_millis(250));
    let start = Instant::now();

    scheduler.schedule(TaskKind::Sass, start);
    assert_eq!(scheduler.due(start), vec![TaskKind::Sass]);

    for ms in [10, 50, 120] {
        scheduler.schedule(TaskKind::Sass, start + Duration::from_millis(ms));
    }
    assert!(scheduler.due(start + Duration::from_millis(200)).is_empty());
    assert_eq!(scheduler.due(start + Duration::from_millis(250)), vec![TaskKind::Sass]);
    assert!(scheduler.is_idle());
}

// ============================================================================
// Live Reload
// ============================================================================

#[test]
fn test_served_html_gets_client_script() {
    let html = inject_script("<html><body><h1>Shop</h1></body></html>");
    assert!(html.ends_with("<script src=\"/__livereload.js\"></script>\n</body></html>"));
}
