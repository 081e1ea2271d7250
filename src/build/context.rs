//! Build context containing configuration and state for a task run.

use crate::config::AssetConfig;
use crate::paths::PathRegistry;
use crate::serve::LiveReload;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a task run.
///
/// The context provides everything a pipeline needs: the configuration, the
/// resolved path registry and, under `serve`, the live-reload hub.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: AssetConfig,
    /// Project root directory (where assetpipe.toml is located)
    project_root: PathBuf,
    /// Category globs resolved against the project root
    registry: PathRegistry,
    /// Whether to run in verbose mode
    verbose: bool,
    /// Connected browsers, present while the dev server runs
    livereload: Option<LiveReload>,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: AssetConfig, project_root: PathBuf) -> Self {
        let registry = PathRegistry::new(project_root.clone(), config.paths.clone());
        Self { config, project_root, registry, verbose: false, livereload: None }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the path registry.
    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Attach a live-reload hub; style tasks push their outputs to it.
    pub fn with_livereload(mut self, livereload: LiveReload) -> Self {
        self.livereload = Some(livereload);
        self
    }

    /// The live-reload hub, when serving.
    pub fn livereload(&self) -> Option<&LiveReload> {
        self.livereload.as_ref()
    }

    /// Resolve a path relative to the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Style source root.
    pub fn style_root(&self) -> PathBuf {
        self.resolve_path(&self.config.styles.root)
    }
}
