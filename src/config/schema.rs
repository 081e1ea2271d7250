//! Configuration schema types for `assetpipe.toml`
//!
//! Defines the structure and validation rules for a site's asset pipeline.
//! Every section is optional; an empty file yields the stock layout
//! (`src/scss`, `src/js`, `src/fonts`, `src/img` feeding `assets/`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Severity of a lint rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Report and fail the lint task
    Error,
    /// Report only
    Warn,
    /// Rule disabled
    Off,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Error
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warn => write!(f, "warning"),
            Severity::Off => write!(f, "off"),
        }
    }
}

/// Glob patterns for every asset category, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub sass_components: String,
    pub sass_sections: String,
    pub sass: String,
    /// Compiled (intermediate) stylesheets read by the minify task
    pub css: String,
    /// Directory the style tasks write into
    pub css_dir: String,
    pub js_components: String,
    pub js_sections: String,
    pub js: String,
    pub font: String,
    pub img: String,
    /// Distribution directory
    pub dest: String,
    /// Entry document reloaded by the dev server
    pub root: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sass_components: "./src/scss/components/*.scss".to_string(),
            sass_sections: "./src/scss/sections/*.scss".to_string(),
            sass: "./src/scss/*.scss".to_string(),
            css: "./src/css/*.css".to_string(),
            css_dir: "./src/css".to_string(),
            js_components: "./src/js/components/*.ts".to_string(),
            js_sections: "./src/js/sections/*.ts".to_string(),
            js: "./src/js/*.ts".to_string(),
            font: "./src/fonts/**/*".to_string(),
            img: "./src/img/**/*.+(png|jpg|jpeg|gif|svg)".to_string(),
            dest: "./assets".to_string(),
            root: "./index.html".to_string(),
        }
    }
}

/// Browser versions the vendor prefixer targets ("major" or "major.minor").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserTargets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firefox: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_saf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opera: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safari: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samsung: Option<String>,
}

impl BrowserTargets {
    /// Targets roughly matching the browserslist `defaults` query.
    pub fn defaults() -> Self {
        Self {
            android: None,
            chrome: Some("109".to_string()),
            edge: Some("119".to_string()),
            firefox: Some("115".to_string()),
            ie: None,
            ios_saf: Some("15.6".to_string()),
            opera: Some("104".to_string()),
            safari: Some("15.6".to_string()),
            samsung: Some("23".to_string()),
        }
    }

    /// Iterate over `(browser, version)` pairs that are set.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("android", &self.android),
            ("chrome", &self.chrome),
            ("edge", &self.edge),
            ("firefox", &self.firefox),
            ("ie", &self.ie),
            ("ios_saf", &self.ios_saf),
            ("opera", &self.opera),
            ("safari", &self.safari),
            ("samsung", &self.samsung),
        ]
        .into_iter()
        .filter_map(|(name, v)| v.as_deref().map(|v| (name, v)))
    }
}

/// Style compilation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Style source root, searched for imports and required partials
    pub root: PathBuf,
    /// Extra Sass load paths (mixin libraries)
    pub include_paths: Vec<PathBuf>,
    /// Normalization stylesheet prepended by the aggregate task
    pub normalize: PathBuf,
    /// File name of the aggregate stylesheet
    pub aggregate_name: String,
    /// Partials that must exist under `root`
    pub required_partials: Vec<String>,
    /// Vendor prefix targets
    pub browsers: BrowserTargets,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("src/scss"),
            include_paths: vec![
                PathBuf::from("node_modules/bourbon/core"),
                PathBuf::from("node_modules/bourbon-neat/core"),
            ],
            normalize: PathBuf::from("node_modules/normalize.css/normalize.css"),
            aggregate_name: "styles.css".to_string(),
            required_partials: [
                "_colors.scss",
                "_fonts.scss",
                "_mixins.scss",
                "_functions.scss",
                "_variables.scss",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            browsers: BrowserTargets::defaults(),
        }
    }
}

/// Script pipeline settings.
///
/// Both commands receive the file on stdin and must print the result on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Transpiler command line
    pub transpile: Vec<String>,
    /// Minifier command line
    pub minify: Vec<String>,
    /// Append an inline source map
    pub source_maps: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            transpile: vec![
                "esbuild".to_string(),
                "--loader=ts".to_string(),
                "--target=es2015".to_string(),
            ],
            minify: vec![
                "esbuild".to_string(),
                "--loader=js".to_string(),
                "--minify".to_string(),
            ],
            source_maps: true,
        }
    }
}

/// SVG optimizer plugin toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvgConfig {
    pub remove_view_box: bool,
    pub cleanup_ids: bool,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self { remove_view_box: true, cleanup_ids: false }
    }
}

/// Image optimizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub gif_interlaced: bool,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    pub jpeg_progressive: bool,
    /// PNG optimization level, 0-7
    pub png_level: u8,
    pub svg: SvgConfig,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            gif_interlaced: true,
            jpeg_quality: 75,
            jpeg_progressive: true,
            png_level: 5,
            svg: SvgConfig::default(),
        }
    }
}

/// Per-language lint rule table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LintRules {
    /// Rule name to severity; rules not listed keep their built-in severity
    pub rules: BTreeMap<String, Severity>,
}

/// Lint settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    pub scss: LintRules,
    pub js: LintRules,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Minimum time between two runs of the same task
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_min_interval_ms() -> u32 {
    250
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_interval_ms: default_min_interval_ms(),
            clear_screen: false,
        }
    }
}

/// Development server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Directory served, relative to the project root
    pub base_dir: PathBuf,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 3000, base_dir: PathBuf::from(".") }
    }
}

/// Failure notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Ring the terminal bell on failure
    pub beep: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { beep: true }
    }
}

/// Complete assetpipe.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub lint: LintConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub serve: ServeConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "images.jpeg_quality")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetpipe.toml: '{}' {}", self.field, self.message)
    }
}

impl AssetConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        // Both directories are emptied by cleanAssets
        let output_dirs =
            [("paths.dest", &self.paths.dest), ("paths.css_dir", &self.paths.css_dir)];
        for (field, dir) in output_dirs {
            if dir.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must be a non-empty path".to_string(),
                });
            } else if contains_project_root(dir) {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: format!("'{}' is the project root or one of its parents", dir),
                });
            }
        }

        if self.styles.aggregate_name.is_empty() {
            errors.push(ConfigValidationError {
                field: "styles.aggregate_name".to_string(),
                message: "must be a non-empty file name".to_string(),
            });
        }
        for (browser, version) in self.styles.browsers.entries() {
            if parse_browser_version(version).is_none() {
                errors.push(ConfigValidationError {
                    field: format!("styles.browsers.{}", browser),
                    message: format!("'{}' is not a version like \"15\" or \"15.6\"", version),
                });
            }
        }

        if self.scripts.transpile.is_empty() {
            errors.push(ConfigValidationError {
                field: "scripts.transpile".to_string(),
                message: "must name a command".to_string(),
            });
        }
        if self.scripts.minify.is_empty() {
            errors.push(ConfigValidationError {
                field: "scripts.minify".to_string(),
                message: "must name a command".to_string(),
            });
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            errors.push(ConfigValidationError {
                field: "images.jpeg_quality".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }
        if self.images.png_level > 7 {
            errors.push(ConfigValidationError {
                field: "images.png_level".to_string(),
                message: "must be between 0 and 7".to_string(),
            });
        }

        if self.serve.port == 0 {
            errors.push(ConfigValidationError {
                field: "serve.port".to_string(),
                message: "must be a positive port number".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Whether a relative directory resolves to the project root or above it.
/// Absolute paths are checked against the real root by the cleanup task.
pub fn contains_project_root(dir: &str) -> bool {
    let path = Path::new(dir.trim());
    if path.is_absolute() {
        return false;
    }
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth == 0
}

/// Encode a "major[.minor[.patch]]" version the way lightningcss expects
/// (`major << 16 | minor << 8 | patch`).
pub fn parse_browser_version(version: &str) -> Option<u32> {
    let mut parts = version.trim().split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next().map(|p| p.parse().ok()).unwrap_or(Some(0))?;
    let patch: u32 = parts.next().map(|p| p.parse().ok()).unwrap_or(Some(0))?;
    if parts.next().is_some() || major > 0xff || minor > 0xff || patch > 0xff {
        return None;
    }
    Some(major << 16 | minor << 8 | patch)
}
