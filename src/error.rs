//! Task failure type shared by every pipeline stage.

use std::path::PathBuf;
use thiserror::Error;

/// A task-fatal error raised by a pipeline stage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// Reading or writing a file failed
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Style compilation failed
    #[error("Error in {}: {}", .file.display(), .message)]
    Compile { file: PathBuf, message: String },
    /// Parsing or prefixing compiled CSS failed
    #[error("{}: vendor prefixing failed: {}", .file.display(), .message)]
    Prefix { file: PathBuf, message: String },
    /// Minification or source map generation failed
    #[error("{}: minification failed: {}", .file.display(), .message)]
    Minify { file: PathBuf, message: String },
    /// An external transpile/minify command failed
    #[error("`{program}` failed on {} ({status}): {stderr}", .file.display())]
    Command { program: String, file: PathBuf, status: String, stderr: String },
    /// An image could not be decoded or re-encoded
    #[error("{}: image optimization failed: {}", .file.display(), .message)]
    Image { file: PathBuf, message: String },
    /// Lint found error-level violations; `report` lists all of them
    #[error("{tool} found {errors} error(s) and {warnings} warning(s)")]
    Lint { tool: String, errors: usize, warnings: usize, report: String },
    /// Required style partials are missing
    #[error("missing required partials in {}: {}", .root.display(), .missing.join(", "))]
    MissingPartials { root: PathBuf, missing: Vec<String> },
    /// An output directory to empty holds the project itself
    #[error("refusing to empty {}: it contains the project root", .dir.display())]
    UnsafeClean { dir: PathBuf },
    /// The file watcher could not be set up
    #[error("watch failed: {0}")]
    Watch(String),
    /// The dev server could not be started
    #[error("dev server failed: {0}")]
    Serve(String),
}

impl TaskError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io { path: path.into(), source }
    }

    /// Formatted lint output to show before the failure itself.
    pub fn report(&self) -> Option<&str> {
        match self {
            TaskError::Lint { report, .. } => Some(report),
            _ => None,
        }
    }
}
