//! Rule-based source linting.
//!
//! A [`Linter`] runs a set of [`Rule`]s over a file and turns their findings
//! into [`Violation`]s at the configured severity. Rules see two views of a
//! file: the raw text and a copy with comments and string literals blanked
//! out, so that pattern rules do not fire inside them. Offsets are identical
//! in both views.
//!
//! All files are linted before the task decides; the task fails when any
//! error-severity violation exists and the formatted report is shown first.

pub mod script;
pub mod scss;

use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::config::{LintRules, Severity};
use crate::error::TaskError;
use crate::paths::Category;
use crate::pipeline::read_category;
use regex::Regex;
use std::path::{Path, PathBuf};

/// One file prepared for rules.
#[derive(Debug, Clone)]
pub struct SourceText<'a> {
    /// The file as written
    pub raw: &'a str,
    /// The file with comments and strings replaced by spaces
    pub code: String,
}

impl<'a> SourceText<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self { raw, code: blank_comments_and_strings(raw) }
    }

    /// 1-based line and column of a byte offset.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let mut offset = offset.min(self.raw.len());
        while !self.raw.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &self.raw[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }

    /// Byte offsets of every match of `pattern` in the blanked code.
    pub fn find_all(&self, pattern: &str) -> Vec<usize> {
        match Regex::new(pattern) {
            Ok(re) => re.find_iter(&self.code).map(|m| m.start()).collect(),
            Err(e) => {
                tracing::warn!(pattern, "invalid lint pattern: {}", e);
                Vec::new()
            }
        }
    }

    /// Findings for every line of the raw text ending in spaces or tabs.
    pub fn trailing_whitespace(&self, message: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (index, line) in self.raw.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let trimmed = line.trim_end_matches([' ', '\t']);
            if trimmed.len() != line.len() {
                findings.push(Finding {
                    line: index + 1,
                    column: trimmed.chars().count() + 1,
                    message: message.to_string(),
                });
            }
        }
        findings
    }

    /// A finding at a byte offset.
    pub fn finding_at(&self, offset: usize, message: impl Into<String>) -> Finding {
        let (line, column) = self.position(offset);
        Finding { line, column, message: message.into() }
    }
}

/// Replace comments and string literal contents with spaces, keeping
/// newlines and byte offsets. An unquoted `url(...)` is kept as code, so
/// `url(//host/x)` does not open a line comment.
pub fn blank_comments_and_strings(text: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(u8),
        Url,
    }

    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut state = State::Code;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match (b, next) {
                (b'/', Some(b'/')) => {
                    state = State::LineComment;
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                }
                (b'/', Some(b'*')) => {
                    state = State::BlockComment;
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                }
                (b'"' | b'\'' | b'`', _) => state = State::Str(b),
                (b'(', _) if opens_unquoted_url(bytes, i) => state = State::Url,
                _ => {}
            },
            State::Url => {
                if b == b')' || b == b'\n' {
                    state = State::Code;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                } else {
                    out[i] = b' ';
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                    state = State::Code;
                } else if b != b'\n' {
                    out[i] = b' ';
                }
            }
            State::Str(quote) => {
                if b == b'\\' && next.is_some() {
                    out[i] = b' ';
                    if next != Some(b'\n') {
                        out[i + 1] = b' ';
                    }
                    i += 1;
                } else if b == quote {
                    state = State::Code;
                } else if b == b'\n' && quote != b'`' {
                    state = State::Code;
                } else if b != b'\n' {
                    out[i] = b' ';
                }
            }
        }
        i += 1;
    }
    // Every byte of a blanked character is replaced, so this stays UTF-8.
    String::from_utf8(out).unwrap_or_else(|e| {
        e.into_bytes().into_iter().map(|b| if b.is_ascii() { b as char } else { ' ' }).collect()
    })
}

/// Whether the `(` at `open` starts `url(` with an unquoted argument.
fn opens_unquoted_url(bytes: &[u8], open: usize) -> bool {
    let is_url = open >= 3 && bytes[open - 3..open].eq_ignore_ascii_case(b"url");
    let starts_name =
        open < 4 || !(bytes[open - 4].is_ascii_alphanumeric() || bytes[open - 4] == b'-');
    let first = bytes[open + 1..].iter().find(|b| !matches!(b, b' ' | b'\t'));
    is_url && starts_name && !matches!(first, Some(b'"' | b'\''))
}

/// What a rule reports, before severity is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// A lint rule.
pub trait Rule: Send + Sync {
    /// Rule name as used in `[lint.*.rules]`
    fn name(&self) -> &'static str;

    /// Severity when the config does not mention the rule
    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding>;
}

/// A reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub message: String,
    pub rule: &'static str,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}  {}  {}  {}",
            self.file.display(),
            self.line,
            self.column,
            self.severity,
            self.message,
            self.rule
        )
    }
}

/// A rule set with resolved severities.
pub struct Linter {
    rules: Vec<(Box<dyn Rule>, Severity)>,
}

impl Linter {
    /// Linter with every rule at its default severity.
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let severity = rule.default_severity();
                (rule, severity)
            })
            .collect();
        Self { rules }
    }

    /// Apply severity overrides. Names matching no rule are logged and ignored.
    pub fn with_config(mut self, config: &LintRules) -> Self {
        for (name, severity) in &config.rules {
            match self.rules.iter_mut().find(|(rule, _)| rule.name() == name) {
                Some((_, current)) => *current = *severity,
                None => tracing::warn!(rule = %name, "unknown lint rule in config"),
            }
        }
        self
    }

    /// Rule names with their effective severity.
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, Severity)> + '_ {
        self.rules.iter().map(|(rule, severity)| (rule.name(), *severity))
    }

    /// Lint one file.
    pub fn lint(&self, file: &Path, text: &str) -> Vec<Violation> {
        let source = SourceText::new(text);
        let mut violations: Vec<Violation> = self
            .rules
            .iter()
            .filter(|(_, severity)| *severity != Severity::Off)
            .flat_map(|(rule, severity)| {
                rule.check(&source).into_iter().map(move |finding| Violation {
                    file: file.to_path_buf(),
                    line: finding.line,
                    column: finding.column,
                    severity: *severity,
                    message: finding.message,
                    rule: rule.name(),
                })
            })
            .collect();
        violations.sort_by_key(|v| (v.line, v.column));
        violations
    }
}

/// Violations gathered over a set of files.
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    pub violations: Vec<Violation>,
    pub files_checked: usize,
}

impl LintReport {
    pub fn errors(&self) -> usize {
        self.violations.iter().filter(|v| v.severity == Severity::Error).count()
    }

    pub fn warnings(&self) -> usize {
        self.violations.iter().filter(|v| v.severity == Severity::Warn).count()
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// One line per violation followed by a totals line.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for violation in &self.violations {
            out.push_str(&violation.to_string());
            out.push('\n');
        }
        if !self.is_clean() {
            out.push_str(&format!(
                "\n{} problem(s) ({} error(s), {} warning(s))\n",
                self.violations.len(),
                self.errors(),
                self.warnings()
            ));
        }
        out
    }
}

/// Lint every file of a category. Fails when any error-severity violation
/// is found; warnings alone are returned in the task report.
pub fn lint_category(
    ctx: &BuildContext,
    task: &str,
    category: Category,
    linter: &Linter,
) -> Result<TaskOutput, TaskError> {
    let mut report = LintReport::default();
    for asset in read_category(ctx.registry(), category)? {
        let path = asset.display_path();
        let shown = path.strip_prefix(ctx.project_root()).unwrap_or(&path);
        report.violations.extend(linter.lint(shown, asset.text()?));
        report.files_checked += 1;
    }

    tracing::info!(
        task,
        files = report.files_checked,
        errors = report.errors(),
        warnings = report.warnings(),
        "lint finished"
    );

    if report.errors() > 0 {
        return Err(TaskError::Lint {
            tool: task.to_string(),
            errors: report.errors(),
            warnings: report.warnings(),
            report: report.format(),
        });
    }

    let mut output = TaskOutput::new();
    if !report.is_clean() {
        output.warnings = report.violations.iter().map(|v| v.to_string()).collect();
        output.report = Some(report.format());
    }
    Ok(output)
}
