//! The cleanup task: empty the generated-output directories.

use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::error::TaskError;
use std::fs;
use std::path::{Path, PathBuf};

/// Delete everything inside `dir`, keeping `dir` itself. A missing
/// directory is created. Returns the removed entries.
pub fn empty_dir(dir: &Path) -> Result<Vec<PathBuf>, TaskError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| TaskError::io(dir, e))?;
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| TaskError::io(dir, e))? {
        let path = entry.map_err(|e| TaskError::io(dir, e))?.path();
        let is_dir = fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_dir())
            .map_err(|e| TaskError::io(&path, e))?;
        if is_dir {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        }
        .map_err(|e| TaskError::io(&path, e))?;
        removed.push(path);
    }
    Ok(removed)
}

/// Fail when `dir` is the project root or one of its parents.
fn ensure_below_root(root: &Path, dir: &Path) -> Result<(), TaskError> {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let resolved = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    if root.starts_with(&resolved) {
        return Err(TaskError::UnsafeClean { dir: dir.to_path_buf() });
    }
    Ok(())
}

/// The `cleanAssets` task: empty the distribution and intermediate style
/// directories.
pub fn clean_assets(ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
    let dirs = [ctx.registry().dest(), ctx.registry().css_dir()];
    for dir in &dirs {
        ensure_below_root(ctx.project_root(), dir)?;
    }

    let mut removed = 0;
    for dir in &dirs {
        removed += empty_dir(dir)?.len();
    }
    tracing::info!(task, removed, "cleaned output directories");
    Ok(TaskOutput::new())
}
