//! File pipelines.
//!
//! Each pipeline reads the files of one category into [`Asset`]s, passes them
//! through a fixed chain of transform stages and writes the results. Any
//! stage may fail with a [`TaskError`]; the first failure ends the run.
//!
//! # Overview
//!
//! - [`style`]: compile Sass, vendor-prefix, write the intermediate CSS
//! - [`minify`]: minify intermediate CSS with an inline source map
//! - [`script`]: transpile and minify scripts through external commands
//! - [`assets`]: copy fonts, optimize images
//! - [`svg`]: the SVG optimizer used by the image pipeline

pub mod assets;
pub mod minify;
pub mod script;
pub mod size;
pub mod sourcemap;
pub mod style;
pub mod svg;

use crate::error::TaskError;
use crate::paths::{Category, PathRegistry};
use std::fs;
use std::path::{Path, PathBuf};

/// One file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Where the file was read from (empty for synthesized assets)
    pub source: PathBuf,
    /// Path below the glob base; decides the output location
    pub relative: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    /// Create an asset that does not come from a single source file.
    pub fn new(relative: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self { source: PathBuf::new(), relative: relative.into(), contents: contents.into() }
    }

    /// Read `path`, recording its location relative to `base`.
    pub fn read(path: &Path, base: &Path) -> Result<Self, TaskError> {
        let contents = fs::read(path).map_err(|e| TaskError::io(path, e))?;
        let relative = path
            .strip_prefix(base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default());
        Ok(Self { source: path.to_path_buf(), relative, contents })
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, TaskError> {
        std::str::from_utf8(&self.contents).map_err(|e| {
            TaskError::io(
                self.display_path(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// File name without its extension.
    pub fn stem(&self) -> String {
        self.relative.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    }

    /// Lower-cased extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        self.relative.extension().map(|e| e.to_string_lossy().to_lowercase())
    }

    /// Whether the file is a Sass partial (`_name.scss`).
    pub fn is_partial(&self) -> bool {
        self.relative.file_name().map(|n| n.to_string_lossy().starts_with('_')).unwrap_or(false)
    }

    /// The source path if known, the relative path otherwise.
    pub fn display_path(&self) -> PathBuf {
        if self.source.as_os_str().is_empty() {
            self.relative.clone()
        } else {
            self.source.clone()
        }
    }

    /// Output name as a string, used for source maps and size reports.
    pub fn name(&self) -> String {
        self.relative.to_string_lossy().replace('\\', "/")
    }

    /// Apply a rename to the relative path.
    pub fn rename(&mut self, rename: &Rename) {
        self.relative = rename.apply(&self.relative);
    }

    /// Write the asset below `dir`, creating parent directories.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, TaskError> {
        let out = dir.join(&self.relative);
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
        }
        fs::write(&out, &self.contents).map_err(|e| TaskError::io(&out, e))?;
        Ok(out)
    }
}

/// Output renaming: `<dir>/<prefix><stem><suffix>.<extension>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rename {
    pub prefix: String,
    pub suffix: String,
    /// Replacement extension (without dot); `None` keeps the current one
    pub extension: Option<String>,
    /// Drop the directory part
    pub flatten: bool,
}

impl Rename {
    /// Rename with a category prefix.
    pub fn prefixed(prefix: &str) -> Self {
        Self { prefix: prefix.to_string(), ..Default::default() }
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = Some(extension.to_string());
        self
    }

    pub fn flattened(mut self) -> Self {
        self.flatten = true;
        self
    }

    /// Rename a relative path.
    pub fn apply(&self, path: &Path) -> PathBuf {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let extension = match &self.extension {
            Some(ext) => Some(ext.clone()),
            None => path.extension().map(|e| e.to_string_lossy().into_owned()),
        };
        let mut name = format!("{}{}{}", self.prefix, stem, self.suffix);
        if let Some(ext) = extension {
            name.push('.');
            name.push_str(&ext);
        }
        match path.parent() {
            Some(parent) if !self.flatten => parent.join(name),
            _ => PathBuf::from(name),
        }
    }
}

/// Read every file of a category.
pub fn read_category(registry: &PathRegistry, category: Category) -> Result<Vec<Asset>, TaskError> {
    let base = registry.base(category);
    registry.files(category).iter().map(|path| Asset::read(path, &base)).collect()
}

/// Write assets below `dir`, returning the written paths.
pub fn write_all(assets: &[Asset], dir: &Path) -> Result<Vec<PathBuf>, TaskError> {
    assets.iter().map(|asset| asset.write_to(dir)).collect()
}
