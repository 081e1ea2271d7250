//! Style minification: intermediate CSS to `<stem>.min.css` in the
//! distribution directory, each with an inline source map.

use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::error::TaskError;
use crate::paths::Category;
use crate::pipeline::size::SizeReport;
use crate::pipeline::sourcemap::{inline_comment, Syntax};
use crate::pipeline::style::browser_targets;
use crate::pipeline::{read_category, Rename};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::Targets;
use parcel_sourcemap::SourceMap;
use std::path::Path;

/// Minify `css`, returning the minified code and its source map as JSON.
pub fn minify_css(
    file: &Path,
    name: &str,
    css: &str,
    targets: &Targets,
) -> Result<(String, String), TaskError> {
    let minify_error = |message: String| TaskError::Minify { file: file.to_path_buf(), message };

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions { filename: name.to_string(), ..ParserOptions::default() },
    )
    .map_err(|e| minify_error(e.to_string()))?;
    sheet
        .minify(MinifyOptions { targets: targets.clone(), ..MinifyOptions::default() })
        .map_err(|e| minify_error(e.to_string()))?;

    let mut map = SourceMap::new("/");
    let source = map.add_source(name);
    map.set_source_content(source as usize, css).map_err(|e| minify_error(e.to_string()))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: Some(&mut map),
            targets: targets.clone(),
            ..PrinterOptions::default()
        })
        .map_err(|e| minify_error(e.to_string()))?;
    let json = map.to_json(None).map_err(|e| minify_error(e.to_string()))?;
    Ok((printed.code, json))
}

/// Minify every compiled stylesheet into the distribution directory.
pub fn minify_styles(ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
    let targets = browser_targets(&ctx.config().styles.browsers);
    let rename = Rename::default().with_suffix(".min").flattened();

    let mut assets = Vec::new();
    for mut asset in read_category(ctx.registry(), Category::CompiledStyles)? {
        let (code, map) =
            minify_css(&asset.display_path(), &asset.name(), asset.text()?, &targets)?;
        let mut contents = code;
        contents.push_str(&inline_comment(&map, Syntax::Css));
        asset.contents = contents.into_bytes();
        asset.rename(&rename);
        assets.push(asset);
    }

    let dest = ctx.registry().dest();
    let mut output = TaskOutput::new();
    let mut names = Vec::with_capacity(assets.len());
    for asset in &assets {
        output.sizes.push(SizeReport::measure(task, &asset.name(), &asset.contents));
        output.files.push(asset.write_to(&dest)?);
        names.push(asset.name());
    }

    if let Some(livereload) = ctx.livereload() {
        livereload.notify_css(&names);
    }
    Ok(output)
}
