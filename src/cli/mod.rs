//! Command-line interface implementation
//!
//! `assetpipe [OPTIONS] [TASK]...` runs the named tasks from the standard
//! task graph, `default` when none is given.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::build::{
    default_jobs, BuildContext, ConsoleProgress, JsonProgress, ProgressReporter, TaskGraph,
    TaskRunner,
};
use crate::config::loader::project_root;
use crate::config::{
    default_config, find_config_from, load_config, merge_cli_overrides, validate_config,
    AssetConfig, CliOverrides, ConfigError,
};
use crate::report::ErrorReporter;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// assetpipe - Build a site's stylesheets, scripts, fonts and images
#[derive(Debug, Parser)]
#[command(name = "assetpipe")]
#[command(about = "Build a site's stylesheets, scripts, fonts and images")]
#[command(version)]
pub struct Cli {
    /// Tasks to run, in order (default: `default`)
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Config file (default: assetpipe.toml found walking up from the root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Project root (default: the config file's directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Number of tasks to run at once in parallel groups
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Show debug logs and output sizes
    #[arg(short, long)]
    pub verbose: bool,

    /// Only show problems
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report progress as JSON lines on stderr
    #[arg(long)]
    pub json: bool,

    /// Do not ring the terminal bell on failure
    #[arg(long)]
    pub no_beep: bool,

    /// Dev server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Distribution directory
    #[arg(long)]
    pub dest: Option<String>,

    /// List the available tasks and exit
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides { dest: self.dest.clone(), port: self.port, no_beep: self.no_beep }
    }

    /// Requested tasks, `default` when none are given.
    pub fn requested(&self) -> Vec<String> {
        if self.tasks.is_empty() {
            vec!["default".to_string()]
        } else {
            self.tasks.clone()
        }
    }
}

/// Load the configuration and decide the project root.
pub fn load_project(cli: &Cli) -> Result<(AssetConfig, PathBuf), ConfigError> {
    let cwd = std::env::current_dir()?;
    let start = cli.root.clone().unwrap_or_else(|| cwd.clone());
    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => find_config_from(start.clone()),
    };

    let mut config = match &config_path {
        Some(path) => load_config(Some(path))?,
        None => default_config(),
    };
    merge_cli_overrides(&mut config, &cli.overrides());
    validate_config(&config)?;

    let root = match (&cli.root, config_path.as_deref().and_then(project_root)) {
        (Some(root), _) => root.clone(),
        (None, Some(dir)) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => cwd,
    };
    let root = root.canonicalize().unwrap_or(root);
    Ok((config, root))
}

/// Print every task with its description.
pub fn list_tasks(graph: &TaskGraph) -> String {
    let width = graph.tasks().map(|t| t.name.len()).max().unwrap_or(0);
    graph
        .tasks()
        .map(|t| format!("  {:width$}  {}\n", t.name, t.description, width = width))
        .collect()
}

/// Run the CLI application
pub fn run() -> ExitCode {
    run_with(Cli::parse())
}

/// Run with already parsed arguments.
pub fn run_with(cli: Cli) -> ExitCode {
    crate::logging::init(cli.verbose, cli.quiet);

    let (config, root) = match load_project(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    tracing::debug!(root = %root.display(), "project root");

    let graph = TaskGraph::standard();
    if let Err(e) = graph.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    if cli.list {
        print!("{}", list_tasks(&graph));
        return ExitCode::from(EXIT_SUCCESS);
    }

    let requested = cli.requested();
    if let Some(unknown) = requested.iter().find(|name| graph.get(name).is_none()) {
        eprintln!("Error: Task '{}' is not defined", unknown);
        eprintln!("Run 'assetpipe --list' to see the available tasks");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let reporter: Box<dyn ProgressReporter> = if cli.json {
        Box::new(JsonProgress::new())
    } else {
        Box::new(ConsoleProgress::new().with_verbose(cli.verbose).with_quiet(cli.quiet))
    };
    let errors = ErrorReporter::new(config.notify.beep);
    let jobs = cli.jobs.map(usize::from).unwrap_or_else(default_jobs);
    let context = BuildContext::new(config, root).with_verbose(cli.verbose);
    let runner = TaskRunner::new(&graph, context, reporter.as_ref()).with_jobs(jobs);

    match runner.run(&requested) {
        Ok(result) => match result.first_failure() {
            None => ExitCode::from(EXIT_SUCCESS),
            Some((task, message)) => {
                errors.report(task, message);
                ExitCode::from(EXIT_ERROR)
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_INVALID_ARGS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("assetpipe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.requested(), vec!["default".to_string()]);
        assert!(cli.jobs.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn test_parse_tasks_and_flags() {
        let cli = parse(&["lintScss", "lintJs", "-j", "2", "--no-beep", "--port", "8080"]);
        assert_eq!(cli.requested(), vec!["lintScss".to_string(), "lintJs".to_string()]);
        assert_eq!(cli.jobs, Some(2));
        let overrides = cli.overrides();
        assert!(overrides.no_beep);
        assert_eq!(overrides.port, Some(8080));
    }

    #[test]
    fn test_parse_rejects_zero_jobs_and_verbose_quiet() {
        let args = |a: &[&str]| {
            Cli::try_parse_from(std::iter::once("assetpipe").chain(a.iter().copied()))
        };
        assert!(args(&["--jobs", "0"]).is_err());
        assert!(args(&["--verbose", "--quiet"]).is_err());
    }

    #[test]
    fn test_list_tasks() {
        let listing = list_tasks(&TaskGraph::standard());
        assert_eq!(listing.lines().count(), 17);
        assert!(listing.contains("  build "));
        assert!(listing.contains("Clean, then build every asset"));
    }

    #[test]
    #[serial]
    fn test_load_project_from_root() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("assetpipe.toml"), "[paths]\ndest = \"./dist\"\n").unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();

        let cli = parse(&["--root", temp.path().join("src").to_str().unwrap(), "--port", "9000"]);
        let (config, root) = load_project(&cli).unwrap();
        assert_eq!(config.paths.dest, "./dist");
        assert_eq!(config.serve.port, 9000);
        assert_eq!(root, temp.path().join("src").canonicalize().unwrap());
    }

    #[test]
    #[serial]
    fn test_invalid_config_exit_code() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("assetpipe.toml"), "[paths\n").unwrap();
        let cli = parse(&["--root", temp.path().to_str().unwrap(), "--list"]);
        let code = run_with(cli);
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(EXIT_INVALID_ARGS)));
    }

    #[test]
    #[serial]
    fn test_dest_override_cannot_target_project_root() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/scss")).unwrap();
        fs::write(temp.path().join("src/scss/main.scss"), "a { color: red; }").unwrap();
        fs::write(temp.path().join("index.html"), "<html></html>").unwrap();

        for dest in ["", ".", ".."] {
            let root = temp.path().to_str().unwrap();
            let cli = parse(&["--root", root, "--dest", dest, "--no-beep", "cleanAssets"]);
            let code = run_with(cli);
            let expected = ExitCode::from(EXIT_INVALID_ARGS);
            assert_eq!(format!("{:?}", code), format!("{:?}", expected), "--dest {:?}", dest);
        }
        assert!(temp.path().join("src/scss/main.scss").exists());
        assert!(temp.path().join("index.html").exists());
    }

    #[test]
    #[serial]
    fn test_unknown_task_exit_code() {
        let temp = TempDir::new().unwrap();
        let cli = parse(&["--root", temp.path().to_str().unwrap(), "deploy"]);
        let code = run_with(cli);
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(EXIT_INVALID_ARGS)));
    }

    #[test]
    #[serial]
    fn test_failing_task_exit_code() {
        let temp = TempDir::new().unwrap();
        let cli = parse(&["--root", temp.path().to_str().unwrap(), "--no-beep", "checkScss"]);
        let code = run_with(cli);
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(EXIT_ERROR)));
    }
}
