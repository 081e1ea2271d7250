//! Pipeline integration tests: configuration loading, cleanup, script
//! determinism and asset copying through the public task API.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use assetpipe::build::{BuildContext, TaskKind};
use assetpipe::clean::empty_dir;
use assetpipe::config::{find_config, load_config, AssetConfig, Severity};
use assetpipe::error::TaskError;
use assetpipe::pipeline::script::run_command;
use assetpipe::pipeline::svg::optimize_svg;

fn write(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn digest(path: &Path) -> Vec<u8> {
    Sha256::digest(fs::read(path).unwrap()).to_vec()
}

#[test]
#[serial]
fn test_config_discovered_from_subdirectory() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "assetpipe.toml",
        br#"
[paths]
dest = "./public/assets"

[lint.scss.rules]
no-important = "warn"

[serve]
port = 8080
"#,
    );
    let nested = temp.path().join("src/scss");
    fs::create_dir_all(&nested).unwrap();

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(&nested).unwrap();
    let found = find_config();
    std::env::set_current_dir(original).unwrap();

    let found = found.unwrap().canonicalize().unwrap();
    assert_eq!(found, temp.path().join("assetpipe.toml").canonicalize().unwrap());

    let config = load_config(Some(&found)).unwrap();
    assert_eq!(config.paths.dest, "./public/assets");
    assert_eq!(config.serve.port, 8080);
    assert_eq!(config.lint.scss.rules.get("no-important"), Some(&Severity::Warn));
    assert_eq!(config.paths.sass, "./src/scss/*.scss");
}

#[test]
fn test_cleanup_is_idempotent() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "assets/a.min.js", b"x");
    write(temp.path(), "assets/nested/b.png", b"x");
    write(temp.path(), "src/css/a.css", b"x");
    let ctx = BuildContext::new(AssetConfig::default(), temp.path().to_path_buf());

    TaskKind::CleanAssets.run(&ctx, "cleanAssets").unwrap();
    TaskKind::CleanAssets.run(&ctx, "cleanAssets").unwrap();

    for dir in ["assets", "src/css"] {
        let dir = temp.path().join(dir);
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }
    assert!(empty_dir(&temp.path().join("missing")).unwrap().is_empty());
    assert!(temp.path().join("missing").is_dir());
}

#[cfg(unix)]
#[test]
fn test_script_output_is_byte_identical_across_runs() {
    let temp = TempDir::new().unwrap();
    let mut config = AssetConfig::default();
    config.scripts.transpile = vec!["cat".to_string()];
    config.scripts.minify = vec!["tr".to_string(), "-d".to_string(), "\\n".to_string()];
    write(temp.path(), "src/js/components/cart.ts", b"const items = [];\nexport { items };\n");
    let ctx = BuildContext::new(config, temp.path().to_path_buf());

    let output = temp.path().join("assets/component-cart.min.js");
    TaskKind::JsComponents.run(&ctx, "jsComponents").unwrap();
    let first = digest(&output);
    TaskKind::CleanAssets.run(&ctx, "cleanAssets").unwrap();
    assert!(!output.exists());
    TaskKind::JsComponents.run(&ctx, "jsComponents").unwrap();

    assert_eq!(first, digest(&output));
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("const items = [];export { items };\n//# sourceMappingURL="));
}

#[cfg(unix)]
#[test]
fn test_failing_command_fails_the_task() {
    let temp = TempDir::new().unwrap();
    let mut config = AssetConfig::default();
    config.scripts.transpile = vec!["false".to_string()];
    write(temp.path(), "src/js/app.ts", b"let a;");
    let ctx = BuildContext::new(config, temp.path().to_path_buf());

    let err = TaskKind::Js.run(&ctx, "js").unwrap_err();
    assert!(err.to_string().contains("`false` failed"), "{}", err);
    assert!(!temp.path().join("assets/app.min.js").exists());
}

#[cfg(unix)]
#[test]
fn test_command_that_stops_reading_fails() {
    // Larger than a pipe buffer, so the writer is still blocked when `head` exits
    let input = vec![b'x'; 1 << 20];
    let argv = vec!["head".to_string(), "-c".to_string(), "1".to_string()];

    let err = run_command(&argv, Path::new("src/js/app.ts"), &input).unwrap_err();
    match &err {
        TaskError::Command { program, status, .. } => {
            assert_eq!(program, "head");
            assert_eq!(status, "did not read its input");
        }
        other => panic!("unexpected error: {}", other),
    }

    let all = run_command(&["cat".to_string()], Path::new("src/js/app.ts"), &input).unwrap();
    assert_eq!(all.len(), input.len());
}

#[test]
fn test_fonts_keep_their_layout() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/fonts/serif/bold.woff", b"bold");
    write(temp.path(), "src/fonts/icons.ttf", b"icons");
    let ctx = BuildContext::new(AssetConfig::default(), temp.path().to_path_buf());

    let output = TaskKind::Fonts.run(&ctx, "fonts").unwrap();
    assert_eq!(output.files.len(), 2);
    assert_eq!(fs::read(temp.path().join("assets/serif/bold.woff")).unwrap(), b"bold");
    assert_eq!(fs::read(temp.path().join("assets/icons.ttf")).unwrap(), b"icons");
}

#[test]
fn test_images_are_replaced_only_when_smaller() {
    let temp = TempDir::new().unwrap();
    let svg = "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 1 1\">\n  \
               <!-- logo -->\n  <rect width=\"1\" height=\"1\"/>\n</svg>\n";
    write(temp.path(), "src/img/logo.svg", svg.as_bytes());
    let ctx = BuildContext::new(AssetConfig::default(), temp.path().to_path_buf());

    TaskKind::Images.run(&ctx, "images").unwrap();
    let written = fs::read_to_string(temp.path().join("assets/logo.svg")).unwrap();
    assert!(written.len() < svg.len());
    assert!(!written.contains("logo -->"));
    assert_eq!(written, optimize_svg(svg, ctx.config().images.svg));
}

#[test]
fn test_undecodable_image_fails() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/img/broken.png", b"not a png");
    let ctx = BuildContext::new(AssetConfig::default(), temp.path().to_path_buf());

    let err = TaskKind::Images.run(&ctx, "images").unwrap_err();
    assert!(err.to_string().contains("broken.png"), "{}", err);
}
