//! Path registry: the glob patterns of every asset category.
//!
//! Patterns come from the `[paths]` config section and are resolved against
//! the project root. Nothing is validated up front; a pattern that cannot be
//! parsed matches no files and logs a warning.

use crate::config::PathsConfig;
use glob::{glob_with, MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};

/// A named group of source files sharing a glob pattern and a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    StyleComponents,
    StyleSections,
    Styles,
    /// Compiled, not yet minified stylesheets
    CompiledStyles,
    ScriptComponents,
    ScriptSections,
    Scripts,
    Fonts,
    Images,
    EntryDocument,
}

impl Category {
    /// All categories, in watch registration order.
    pub const ALL: [Category; 10] = [
        Category::Fonts,
        Category::Images,
        Category::ScriptComponents,
        Category::ScriptSections,
        Category::Scripts,
        Category::StyleComponents,
        Category::StyleSections,
        Category::Styles,
        Category::CompiledStyles,
        Category::EntryDocument,
    ];

    /// Config key of the category's pattern.
    pub fn key(&self) -> &'static str {
        match self {
            Category::StyleComponents => "sass_components",
            Category::StyleSections => "sass_sections",
            Category::Styles => "sass",
            Category::CompiledStyles => "css",
            Category::ScriptComponents => "js_components",
            Category::ScriptSections => "js_sections",
            Category::Scripts => "js",
            Category::Fonts => "font",
            Category::Images => "img",
            Category::EntryDocument => "root",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Glob options shared by file discovery and path matching.
///
/// `*` never crosses a directory separator and dotfiles are only matched by
/// patterns that spell the leading dot.
pub fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

/// Read-only mapping from categories to resolved glob patterns.
#[derive(Debug, Clone)]
pub struct PathRegistry {
    root: PathBuf,
    paths: PathsConfig,
}

impl PathRegistry {
    /// Create a registry for a project root.
    pub fn new(root: impl Into<PathBuf>, paths: PathsConfig) -> Self {
        Self { root: root.into(), paths }
    }

    /// Project root the patterns are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The raw pattern configured for a category.
    pub fn pattern(&self, category: Category) -> &str {
        match category {
            Category::StyleComponents => &self.paths.sass_components,
            Category::StyleSections => &self.paths.sass_sections,
            Category::Styles => &self.paths.sass,
            Category::CompiledStyles => &self.paths.css,
            Category::ScriptComponents => &self.paths.js_components,
            Category::ScriptSections => &self.paths.js_sections,
            Category::Scripts => &self.paths.js,
            Category::Fonts => &self.paths.font,
            Category::Images => &self.paths.img,
            Category::EntryDocument => &self.paths.root,
        }
    }

    /// Distribution directory.
    pub fn dest(&self) -> PathBuf {
        self.resolve(&self.paths.dest)
    }

    /// Intermediate compiled-style directory.
    pub fn css_dir(&self) -> PathBuf {
        self.resolve(&self.paths.css_dir)
    }

    /// Entry document served and reloaded by the dev server.
    pub fn entry_document(&self) -> PathBuf {
        self.resolve(&self.paths.root)
    }

    /// Resolve a project-relative path (a leading `./` is dropped).
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let mut resolved = self.root.clone();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                other => resolved.push(other),
            }
        }
        resolved
    }

    /// Fully resolved glob patterns for a category, one per extglob alternative.
    pub fn patterns(&self, category: Category) -> Vec<String> {
        expand_extglob(self.pattern(category))
            .into_iter()
            .map(|p| self.resolve_pattern(&p))
            .collect()
    }

    /// Directory the category's pattern is rooted at (everything before the
    /// first wildcard). Output paths keep the layout below it.
    pub fn base(&self, category: Category) -> PathBuf {
        self.resolve(&glob_base(self.pattern(category)))
    }

    /// All files currently matching a category, sorted and deduplicated.
    pub fn files(&self, category: Category) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for pattern in self.patterns(category) {
            match glob_with(&pattern, match_options()) {
                Ok(paths) => {
                    files.extend(paths.filter_map(Result::ok).filter(|p| p.is_file()));
                }
                Err(e) => {
                    tracing::warn!(category = %category, pattern = %pattern, "invalid glob: {}", e);
                }
            }
        }
        files.sort();
        files.dedup();
        files
    }

    /// Whether `path` is matched by the category's pattern.
    pub fn matches(&self, category: Category, path: &Path) -> bool {
        self.patterns(category).iter().any(|pattern| {
            Pattern::new(pattern)
                .map(|p| p.matches_path_with(path, match_options()))
                .unwrap_or(false)
        })
    }

    /// Every category whose pattern matches `path`.
    pub fn categories_for(&self, path: &Path) -> Vec<Category> {
        Category::ALL.iter().copied().filter(|c| self.matches(*c, path)).collect()
    }

    fn resolve_pattern(&self, pattern: &str) -> String {
        let relative = pattern.strip_prefix("./").unwrap_or(pattern);
        if Path::new(relative).is_absolute() {
            return relative.to_string();
        }
        let root = Pattern::escape(&self.root.to_string_lossy());
        if root.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", root.trim_end_matches('/'), relative)
        }
    }
}

/// Expand extglob groups (`+(a|b)`, `@(a|b)`) and brace sets (`{a,b}`) into
/// plain glob patterns, which the `glob` crate does not understand.
pub fn expand_extglob(pattern: &str) -> Vec<String> {
    let bytes = pattern.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let (open, close, sep, skip) = match b {
            b'(' if i > 0 && matches!(bytes[i - 1], b'+' | b'@') => (i, b')', '|', 1),
            b'{' => (i, b'}', ',', 0),
            _ => continue,
        };
        let Some(end) = find_close(bytes, open, bytes[open], close) else {
            continue;
        };
        let prefix = &pattern[..open - skip];
        let inner = &pattern[open + 1..end];
        let suffix = &pattern[end + 1..];
        return split_top_level(inner, sep)
            .into_iter()
            .flat_map(|alt| expand_extglob(&format!("{}{}{}", prefix, alt, suffix)))
            .collect();
    }
    vec![pattern.to_string()]
}

fn find_close(bytes: &[u8], open: usize, open_byte: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == open_byte {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn split_top_level(inner: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' | '{' => depth += 1,
            ')' | '}' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

/// Leading directory of a pattern that contains no wildcard.
pub fn glob_base(pattern: &str) -> String {
    let mut base = Vec::new();
    let parts: Vec<&str> = pattern.split('/').collect();
    // The last component names files, never part of the base.
    for part in &parts[..parts.len().saturating_sub(1)] {
        if part.contains(['*', '?', '[', '{', '(']) {
            break;
        }
        base.push(*part);
    }
    let joined = base.join("/");
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
