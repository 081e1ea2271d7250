//! Script pipeline: transpile, minify and map through external commands.
//!
//! The transpiler and minifier are configured command lines
//! (`[scripts] transpile` / `minify`) that read the file on stdin and print
//! the result on stdout. The source map is initialised over the minified
//! output, so it maps the minified file onto itself.

use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::error::TaskError;
use crate::paths::Category;
use crate::pipeline::size::SizeReport;
use crate::pipeline::sourcemap::{fresh_map, inline_comment, Syntax};
use crate::pipeline::{read_category, write_all, Rename};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run `argv` with `input` on stdin and return its stdout.
///
/// A command that cannot be started or exits unsuccessfully fails with its
/// stderr.
pub fn run_command(argv: &[String], file: &Path, input: &[u8]) -> Result<Vec<u8>, TaskError> {
    let command_error = |program: &str, status: String, stderr: String| TaskError::Command {
        program: program.to_string(),
        file: file.to_path_buf(),
        status,
        stderr,
    };

    let Some((program, args)) = argv.split_first() else {
        return Err(command_error("", "not configured".to_string(), String::new()));
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| command_error(program, "failed to start".to_string(), e.to_string()))?;
    let mut stdin = child.stdin.take().ok_or_else(|| {
        command_error(program, "failed to start".to_string(), "stdin unavailable".to_string())
    })?;

    // Feed stdin from a second thread so a large output cannot deadlock us.
    let (output, written) = std::thread::scope(|scope| {
        let writer = scope.spawn(move || stdin.write_all(input));
        let output = child.wait_with_output();
        let written = match writer.join() {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::other("stdin writer panicked")),
        };
        (output, written)
    });
    let output =
        output.map_err(|e| command_error(program, "failed".to_string(), e.to_string()))?;

    if !output.status.success() {
        return Err(command_error(
            program,
            output.status.to_string(),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    // A command that exits cleanly without reading all of its input has not
    // seen the whole file.
    if let Err(e) = written {
        return Err(command_error(program, "did not read its input".to_string(), e.to_string()));
    }
    tracing::debug!(
        program = %program,
        file = %file.display(),
        bytes = output.stdout.len(),
        "command finished"
    );
    Ok(output.stdout)
}

/// Build every script of a category into `<dest>/<prefix><stem>.min.js`.
pub fn build_scripts(
    ctx: &BuildContext,
    task: &str,
    category: Category,
    prefix: &str,
) -> Result<TaskOutput, TaskError> {
    let scripts = &ctx.config().scripts;
    let rename = Rename::prefixed(prefix).with_suffix(".min").with_extension("js");
    let transpiled_name = Rename::default().with_extension("js");

    let mut output = TaskOutput::new();
    let mut assets = Vec::new();
    for mut asset in read_category(ctx.registry(), category)? {
        let path = asset.display_path();
        let transpiled = run_command(&scripts.transpile, &path, &asset.contents)?;
        let minified = run_command(&scripts.minify, &path, &transpiled)?;

        let source_name =
            transpiled_name.apply(&asset.relative).to_string_lossy().replace('\\', "/");
        output.sizes.push(SizeReport::measure(task, &source_name, &minified));

        asset.contents = minified;
        asset.rename(&rename);

        if scripts.source_maps {
            let text = String::from_utf8_lossy(&asset.contents).into_owned();
            let map = fresh_map(&asset.name(), &source_name, &text);
            let comment = inline_comment(&map.to_string(), Syntax::Js);
            asset.contents.extend_from_slice(comment.as_bytes());
        }
        assets.push(asset);
    }

    output.files = write_all(&assets, &ctx.registry().dest())?;
    Ok(output)
}
