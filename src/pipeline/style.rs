//! Style compilation: Sass to prefixed CSS in the intermediate directory.

use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::config::{parse_browser_version, BrowserTargets};
use crate::error::TaskError;
use crate::paths::Category;
use crate::pipeline::size::SizeReport;
use crate::pipeline::{read_category, Asset, Rename};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::fs;
use std::path::{Path, PathBuf};

/// Sass compiler plus vendor prefixer.
#[derive(Debug, Clone)]
pub struct StyleCompiler {
    load_paths: Vec<PathBuf>,
    targets: Targets,
}

impl StyleCompiler {
    pub fn new(load_paths: Vec<PathBuf>, browsers: &BrowserTargets) -> Self {
        Self { load_paths, targets: browser_targets(browsers) }
    }

    /// Compiler configured from a build context: include paths followed by
    /// the style root, all resolved against the project root.
    pub fn from_context(ctx: &BuildContext) -> Self {
        let styles = &ctx.config().styles;
        let mut load_paths: Vec<PathBuf> =
            styles.include_paths.iter().map(|p| ctx.resolve_path(p)).collect();
        load_paths.push(ctx.style_root());
        Self::new(load_paths, &styles.browsers)
    }

    pub fn load_paths(&self) -> &[PathBuf] {
        &self.load_paths
    }

    fn options(&self) -> grass::Options<'_> {
        self.load_paths
            .iter()
            .fold(grass::Options::default().style(grass::OutputStyle::Expanded), |opts, path| {
                opts.load_path(path)
            })
    }

    /// Compile one Sass file.
    pub fn compile_file(&self, path: &Path) -> Result<String, TaskError> {
        grass::from_path(path, &self.options()).map_err(|e| compile_error(path, &e))
    }

    /// Compile Sass source that does not live in a single file.
    pub fn compile_source(&self, name: &Path, source: &str) -> Result<String, TaskError> {
        grass::from_string(source.to_string(), &self.options()).map_err(|e| compile_error(name, &e))
    }

    /// Add vendor prefixes for the configured browsers. Output stays
    /// human-readable; minification happens later.
    pub fn prefix(&self, file: &Path, css: &str) -> Result<String, TaskError> {
        let prefix_error =
            |message: String| TaskError::Prefix { file: file.to_path_buf(), message };

        let filename = file.to_string_lossy().into_owned();
        let mut sheet =
            StyleSheet::parse(css, ParserOptions { filename, ..ParserOptions::default() })
                .map_err(|e| prefix_error(e.to_string()))?;
        sheet
            .minify(MinifyOptions { targets: self.targets.clone(), ..MinifyOptions::default() })
            .map_err(|e| prefix_error(e.to_string()))?;
        let printed = sheet
            .to_css(PrinterOptions {
                minify: false,
                targets: self.targets.clone(),
                ..PrinterOptions::default()
            })
            .map_err(|e| prefix_error(e.to_string()))?;
        Ok(printed.code)
    }
}

fn compile_error(file: &Path, err: &grass::Error) -> TaskError {
    let message = err.to_string();
    tracing::error!(file = %file.display(), "{}", message);
    TaskError::Compile { file: file.to_path_buf(), message }
}

/// Convert configured browser versions to prefixer targets.
pub fn browser_targets(browsers: &BrowserTargets) -> Targets {
    let mut targets = Browsers::default();
    for (name, version) in browsers.entries() {
        let Some(version) = parse_browser_version(version) else {
            continue;
        };
        let slot = match name {
            "android" => &mut targets.android,
            "chrome" => &mut targets.chrome,
            "edge" => &mut targets.edge,
            "firefox" => &mut targets.firefox,
            "ie" => &mut targets.ie,
            "ios_saf" => &mut targets.ios_saf,
            "opera" => &mut targets.opera,
            "safari" => &mut targets.safari,
            "samsung" => &mut targets.samsung,
            _ => continue,
        };
        *slot = Some(version);
    }
    Targets::from(targets)
}

/// Compile every non-partial file of a style category into
/// `<css_dir>/<prefix><stem>.css`.
pub fn compile_styles(
    ctx: &BuildContext,
    task: &str,
    category: Category,
    prefix: &str,
) -> Result<TaskOutput, TaskError> {
    let compiler = StyleCompiler::from_context(ctx);
    let rename = Rename::prefixed(prefix).with_extension("css").flattened();

    let mut compiled = Vec::new();
    for source in read_category(ctx.registry(), category)? {
        if source.is_partial() {
            tracing::debug!(task, file = %source.display_path().display(), "skipping partial");
            continue;
        }
        let css = compiler.compile_file(&source.source)?;
        let prefixed = compiler.prefix(&source.source, &css)?;
        let mut asset = Asset { contents: prefixed.into_bytes(), ..source };
        asset.rename(&rename);
        compiled.push(asset);
    }

    emit(ctx, task, compiled)
}

/// Normalization stylesheet followed by every `paths.sass` file, compiled as
/// one `styles.aggregate_name` file with no prefix.
pub fn compile_aggregate(ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
    let styles = &ctx.config().styles;
    let normalize = ctx.resolve_path(&styles.normalize);
    let mut source = fs::read_to_string(&normalize).map_err(|e| TaskError::io(&normalize, e))?;

    for path in ctx.registry().files(Category::Styles) {
        let text = fs::read_to_string(&path).map_err(|e| TaskError::io(&path, e))?;
        if !source.ends_with('\n') {
            source.push('\n');
        }
        source.push_str(&text);
    }

    let name = PathBuf::from(&styles.aggregate_name);
    let compiler = StyleCompiler::from_context(ctx);
    let css = compiler.compile_source(&name, &source)?;
    let prefixed = compiler.prefix(&name, &css)?;

    let mut asset = Asset::new(name, prefixed.into_bytes());
    asset.rename(&Rename::prefixed("").with_extension("css").flattened());
    emit(ctx, task, vec![asset])
}

fn emit(ctx: &BuildContext, task: &str, assets: Vec<Asset>) -> Result<TaskOutput, TaskError> {
    let css_dir = ctx.registry().css_dir();
    let mut output = TaskOutput::new();
    let mut names = Vec::with_capacity(assets.len());

    for asset in &assets {
        output.sizes.push(SizeReport::measure(task, &asset.name(), &asset.contents));
        output.files.push(asset.write_to(&css_dir)?);
        names.push(asset.name());
    }

    if let Some(livereload) = ctx.livereload() {
        livereload.notify_css(&names);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetConfig;
    use tempfile::TempDir;

    fn project() -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        let mut config = AssetConfig::default();
        config.styles.include_paths.clear();
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        (temp, ctx)
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_browser_targets_encodes_versions() {
        let browsers = BrowserTargets { chrome: Some("109".to_string()), ..Default::default() };
        let targets = browser_targets(&browsers);
        assert_eq!(targets.browsers.and_then(|b| b.chrome), Some(109 << 16));
    }

    #[test]
    fn test_prefix_adds_vendor_prefix_for_old_safari() {
        let browsers = BrowserTargets { safari: Some("8".to_string()), ..Default::default() };
        let compiler = StyleCompiler::new(vec![], &browsers);
        let css = compiler.prefix(Path::new("a.css"), ".a { user-select: none; }").unwrap();
        assert!(css.contains("-webkit-user-select"));
    }

    #[test]
    fn test_compile_styles_prefixes_and_flattens() {
        let (temp, ctx) = project();
        write(temp.path(), "src/scss/_colors.scss", "$brand: #ff0000;\n");
        write(
            temp.path(),
            "src/scss/components/foo.scss",
            "@import 'colors';\n.foo { .bar { color: $brand; } }\n",
        );

        let output =
            compile_styles(&ctx, "sassComponents", Category::StyleComponents, "component-")
                .unwrap();
        let out = temp.path().join("src/css/component-foo.css");
        assert_eq!(output.files, vec![out.clone()]);
        assert_eq!(output.sizes.len(), 1);

        let css = fs::read_to_string(out).unwrap();
        assert!(css.contains(".foo .bar"));
    }

    #[test]
    fn test_compile_styles_skips_partials() {
        let (temp, ctx) = project();
        write(temp.path(), "src/scss/_colors.scss", "$a: 1px;\n");
        let output = compile_styles(&ctx, "sass", Category::Styles, "").unwrap();
        assert!(output.files.is_empty());
    }

    #[test]
    fn test_compile_error_fails_task() {
        let (temp, ctx) = project();
        write(temp.path(), "src/scss/sections/hero.scss", ".hero { color: $undefined; }\n");
        let err =
            compile_styles(&ctx, "sassSections", Category::StyleSections, "section-").unwrap_err();
        assert!(matches!(err, TaskError::Compile { .. }));
        assert!(!temp.path().join("src/css/section-hero.css").exists());
    }

    #[test]
    fn test_aggregate_puts_normalize_first() {
        let (temp, ctx) = project();
        write(
            temp.path(),
            "node_modules/normalize.css/normalize.css",
            "html { line-height: 1.15; }\n",
        );
        write(temp.path(), "src/scss/main.scss", "body { margin: 0; }\n");

        compile_aggregate(&ctx, "sass").unwrap();
        let css = fs::read_to_string(temp.path().join("src/css/styles.css")).unwrap();
        let html = css.find("html").unwrap();
        let body = css.find("body").unwrap();
        assert!(html < body);
    }

    #[test]
    fn test_aggregate_requires_normalize() {
        let (temp, ctx) = project();
        write(temp.path(), "src/scss/main.scss", "body { margin: 0; }\n");
        let err = compile_aggregate(&ctx, "sass").unwrap_err();
        assert!(matches!(err, TaskError::Io { .. }));
    }
}
