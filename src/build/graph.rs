//! Task graph definitions.
//!
//! Every runnable name maps to a [`TaskDef`]: the tasks it depends on and the
//! action it performs once they have finished. The graph is validated once at
//! startup so that a typo or a cycle is reported before anything runs.

use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// A single-pipeline task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Compile `paths.sass` into one aggregate stylesheet
    Sass,
    SassComponents,
    SassSections,
    Js,
    JsComponents,
    JsSections,
    LintScss,
    LintJs,
    MinifyCss,
    Fonts,
    Images,
    CleanAssets,
    /// Verify the required style partials exist
    CheckScss,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskKind::Sass => "sass",
            TaskKind::SassComponents => "sassComponents",
            TaskKind::SassSections => "sassSections",
            TaskKind::Js => "js",
            TaskKind::JsComponents => "jsComponents",
            TaskKind::JsSections => "jsSections",
            TaskKind::LintScss => "lintScss",
            TaskKind::LintJs => "lintJs",
            TaskKind::MinifyCss => "minifyCss",
            TaskKind::Fonts => "fonts",
            TaskKind::Images => "images",
            TaskKind::CleanAssets => "cleanAssets",
            TaskKind::CheckScss => "checkScss",
        };
        write!(f, "{}", name)
    }
}

/// What a task does after its dependencies have run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    /// Run one pipeline
    Pipeline(TaskKind),
    /// Run the named tasks concurrently
    Parallel(Vec<String>),
    /// Run the named tasks one after another, stopping at the first failure
    Series(Vec<String>),
    /// Watch sources and re-run the bound tasks
    Watch,
    /// Serve the site with live reload, watching sources
    Serve,
}

/// A named entry in the task graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDef {
    pub name: String,
    pub description: String,
    /// Tasks that must finish successfully before the action starts
    pub deps: Vec<String>,
    pub action: TaskAction,
}

impl TaskDef {
    /// A task running a single pipeline.
    pub fn pipeline(kind: TaskKind, description: &str) -> Self {
        Self {
            name: kind.to_string(),
            description: description.to_string(),
            deps: vec![],
            action: TaskAction::Pipeline(kind),
        }
    }

    /// A composite or long-running task.
    pub fn new(name: &str, description: &str, action: TaskAction) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            deps: vec![],
            action,
        }
    }

    /// Add a dependency to this task.
    pub fn with_dependency(mut self, dep: &str) -> Self {
        self.deps.push(dep.to_string());
        self
    }

    /// Names this task refers to, dependencies first.
    pub fn references(&self) -> impl Iterator<Item = &String> {
        let members: &[String] = match &self.action {
            TaskAction::Parallel(names) | TaskAction::Series(names) => names,
            _ => &[],
        };
        self.deps.iter().chain(members.iter())
    }
}

/// Error in the task graph or in a task request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A requested task does not exist
    #[error("Task '{0}' is not defined")]
    UnknownTask(String),
    /// A task refers to a name that does not exist
    #[error("Task '{task}' refers to undefined task '{reference}'")]
    UnknownReference { task: String, reference: String },
    /// Tasks refer to each other in a loop
    #[error("Circular task dependency: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// All tasks by name.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: BTreeMap<String, TaskDef>,
}

/// Members of the `build` group, in declaration order.
pub const BUILD_GROUP: [&str; 9] = [
    "fonts",
    "images",
    "jsComponents",
    "jsSections",
    "js",
    "sassComponents",
    "sassSections",
    "sass",
    "minifyCss",
];

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tasks every project gets.
    pub fn standard() -> Self {
        let mut graph = Self::new();
        for def in [
            TaskDef::pipeline(TaskKind::Sass, "Compile the aggregate stylesheet"),
            TaskDef::pipeline(TaskKind::SassComponents, "Compile component stylesheets"),
            TaskDef::pipeline(TaskKind::SassSections, "Compile section stylesheets"),
            TaskDef::pipeline(TaskKind::Js, "Build scripts"),
            TaskDef::pipeline(TaskKind::JsComponents, "Build component scripts"),
            TaskDef::pipeline(TaskKind::JsSections, "Build section scripts"),
            TaskDef::pipeline(TaskKind::LintScss, "Lint style sources"),
            TaskDef::pipeline(TaskKind::LintJs, "Lint script sources"),
            TaskDef::pipeline(TaskKind::MinifyCss, "Minify compiled stylesheets"),
            TaskDef::pipeline(TaskKind::Fonts, "Copy fonts"),
            TaskDef::pipeline(TaskKind::Images, "Optimize images"),
            TaskDef::pipeline(TaskKind::CleanAssets, "Empty the output directories"),
            TaskDef::pipeline(TaskKind::CheckScss, "Check the required style partials"),
            TaskDef::new(
                "build",
                "Clean, then build every asset",
                TaskAction::Parallel(names(&BUILD_GROUP)),
            )
            .with_dependency("cleanAssets"),
            TaskDef::new("default", "Run build", TaskAction::Series(names(&["build"]))),
            TaskDef::new("watch", "Rebuild on source changes", TaskAction::Watch),
            TaskDef::new("serve", "Serve the site with live reload", TaskAction::Serve),
        ] {
            graph.insert(def);
        }
        graph
    }

    /// Add or replace a task.
    pub fn insert(&mut self, def: TaskDef) {
        self.tasks.insert(def.name.clone(), def);
    }

    /// Look up a task.
    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    /// Look up a requested task.
    pub fn require(&self, name: &str) -> Result<&TaskDef, GraphError> {
        self.get(name).ok_or_else(|| GraphError::UnknownTask(name.to_string()))
    }

    /// All tasks, sorted by name.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check that every reference resolves and nothing refers back to itself.
    pub fn validate(&self) -> Result<(), GraphError> {
        for def in self.tasks.values() {
            if let Some(missing) = def.references().find(|r| !self.tasks.contains_key(*r)) {
                return Err(GraphError::UnknownReference {
                    task: def.name.clone(),
                    reference: missing.clone(),
                });
            }
        }

        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for name in self.tasks.keys() {
            self.visit(name, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), GraphError> {
        if visited.contains(name) {
            return Ok(());
        }
        if let Some(start) = stack.iter().position(|n| *n == name) {
            let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(name.to_string());
            return Err(GraphError::Cycle(cycle));
        }

        stack.push(name);
        if let Some(def) = self.tasks.get(name) {
            for reference in def.references() {
                self.visit(reference, visited, stack)?;
            }
        }
        stack.pop();
        visited.insert(name);
        Ok(())
    }

    /// Pipeline tasks reached by running `requested`, in execution order,
    /// each listed once.
    pub fn plan(&self, requested: &[String]) -> Result<Vec<TaskKind>, GraphError> {
        let mut plan = Vec::new();
        for name in requested {
            self.collect(name, &mut plan)?;
        }
        Ok(plan)
    }

    fn collect(&self, name: &str, plan: &mut Vec<TaskKind>) -> Result<(), GraphError> {
        let def = self.require(name)?;
        for dep in &def.deps {
            self.collect(dep, plan)?;
        }
        match &def.action {
            TaskAction::Pipeline(kind) => {
                if !plan.contains(kind) {
                    plan.push(*kind);
                }
            }
            TaskAction::Parallel(members) | TaskAction::Series(members) => {
                for member in members {
                    self.collect(member, plan)?;
                }
            }
            TaskAction::Watch | TaskAction::Serve => {}
        }
        Ok(())
    }
}
