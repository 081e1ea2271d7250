//! Script lint rules, named after their eslint counterparts.

use super::{lint_category, Finding, Linter, Rule, SourceText};
use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::config::{LintRules, Severity};
use crate::error::TaskError;
use crate::paths::Category;

fn pattern_rule(source: &SourceText<'_>, pattern: &str, message: &str) -> Vec<Finding> {
    source
        .find_all(pattern)
        .into_iter()
        .filter(|&offset| !is_member_access(&source.code, offset))
        .map(|offset| source.finding_at(offset, message))
        .collect()
}

/// Whether the identifier at `offset` follows a `.` (`obj.debugger`).
fn is_member_access(code: &str, offset: usize) -> bool {
    code[..offset].trim_end().ends_with('.')
}

/// `no-debugger`
pub struct NoDebugger;

impl Rule for NoDebugger {
    fn name(&self) -> &'static str {
        "no-debugger"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        pattern_rule(source, r"\bdebugger\b", "Unexpected 'debugger' statement.")
    }
}

/// `no-var`
pub struct NoVar;

impl Rule for NoVar {
    fn name(&self) -> &'static str {
        "no-var"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        pattern_rule(source, r"\bvar\s+[A-Za-z_$\[{]", "Unexpected var, use let or const instead.")
    }
}

/// `eqeqeq`: loose equality operators.
pub struct Eqeqeq;

impl Rule for Eqeqeq {
    fn name(&self) -> &'static str {
        "eqeqeq"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        let bytes = source.code.as_bytes();
        let mut findings = Vec::new();
        let mut i = 0;
        while i + 1 < bytes.len() {
            let (first, second) = (bytes[i], bytes[i + 1]);
            let prev = if i > 0 { bytes[i - 1] } else { b' ' };
            let third = bytes.get(i + 2).copied().unwrap_or(b' ');

            if second == b'=' && matches!(first, b'=' | b'!') {
                let starts_operator = !matches!(prev, b'=' | b'!' | b'<' | b'>');
                if starts_operator && third != b'=' {
                    let (loose, strict) = if first == b'=' { ("==", "===") } else { ("!=", "!==") };
                    findings.push(source.finding_at(
                        i,
                        format!("Expected '{}' and instead saw '{}'.", strict, loose),
                    ));
                }
                // Skip the whole operator, including a third `=`.
                i += if third == b'=' { 3 } else { 2 };
                continue;
            }
            i += 1;
        }
        findings
    }
}

/// `no-console`
pub struct NoConsole;

impl Rule for NoConsole {
    fn name(&self) -> &'static str {
        "no-console"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warn
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        pattern_rule(source, r"\bconsole\s*\.", "Unexpected console statement.")
    }
}

/// `no-trailing-spaces`
pub struct NoTrailingSpaces;

impl Rule for NoTrailingSpaces {
    fn name(&self) -> &'static str {
        "no-trailing-spaces"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warn
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        source.trailing_whitespace("Trailing spaces not allowed.")
    }
}

/// Every script rule at its default severity, then the config overrides.
pub fn linter(config: &LintRules) -> Linter {
    Linter::new(vec![
        Box::new(NoDebugger),
        Box::new(NoVar),
        Box::new(Eqeqeq),
        Box::new(NoConsole),
        Box::new(NoTrailingSpaces),
    ])
    .with_config(config)
}

/// Lint every `paths.js` file.
pub fn lint_scripts(ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
    let linter = linter(&ctx.config().lint.js);
    lint_category(ctx, task, Category::Scripts, &linter)
}
