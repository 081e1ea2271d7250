//! Style lint rules, named after their sass-lint counterparts.

use super::{lint_category, Finding, Linter, Rule, SourceText};
use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::config::LintRules;
use crate::error::TaskError;
use crate::paths::Category;

/// Deepest allowed selector nesting below a top-level rule.
pub const MAX_NESTING_DEPTH: usize = 2;

/// A `{ ... }` block with the text that introduces it.
#[derive(Debug, Clone)]
struct Block {
    /// Offset of the first non-blank prelude character
    prelude_start: usize,
    prelude: String,
    open: usize,
    /// Offset of the matching `}`, if any
    close: Option<usize>,
    /// Enclosing selector blocks (at-rules are not counted)
    depth: usize,
}

impl Block {
    fn is_at_rule(&self) -> bool {
        self.prelude.starts_with('@')
    }

    /// Nested property groups such as `font: { family: x; }`.
    fn is_property_group(&self) -> bool {
        self.prelude.ends_with(':')
    }

    fn is_selector(&self) -> bool {
        !self.prelude.is_empty() && !self.is_at_rule() && !self.is_property_group()
    }
}

/// Split blanked code into blocks, outermost first.
fn blocks(code: &str) -> Vec<Block> {
    let bytes = code.as_bytes();
    let mut blocks: Vec<Block> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut statement_start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                // `#{` opens an interpolation, not a block
                if i > 0 && bytes[i - 1] == b'#' {
                    stack.push(usize::MAX);
                    continue;
                }
                let raw = &code[statement_start..i];
                let trimmed = raw.trim_start();
                let prelude_start = statement_start + (raw.len() - trimmed.len());
                let depth = stack
                    .iter()
                    .filter(|&&index| index != usize::MAX && blocks[index].is_selector())
                    .count();
                stack.push(blocks.len());
                blocks.push(Block {
                    prelude_start,
                    prelude: trimmed.trim_end().to_string(),
                    open: i,
                    close: None,
                    depth,
                });
                statement_start = i + 1;
            }
            b'}' => {
                if let Some(index) = stack.pop() {
                    if index == usize::MAX {
                        continue;
                    }
                    blocks[index].close = Some(i);
                }
                statement_start = i + 1;
            }
            b';' => statement_start = i + 1,
            _ => {}
        }
    }
    blocks
}

/// `no-ids`: ID selectors.
pub struct NoIds;

impl Rule for NoIds {
    fn name(&self) -> &'static str {
        "no-ids"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for block in blocks(&source.code).iter().filter(|b| b.is_selector()) {
            let bytes = block.prelude.as_bytes();
            for (i, &b) in bytes.iter().enumerate() {
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                let starts_name = next.is_ascii_alphabetic() || matches!(next, b'_' | b'-');
                if b == b'#' && starts_name {
                    findings.push(
                        source.finding_at(block.prelude_start + i, "ID selectors not allowed"),
                    );
                }
            }
        }
        findings
    }
}

/// `no-important`: `!important` declarations.
pub struct NoImportant;

impl Rule for NoImportant {
    fn name(&self) -> &'static str {
        "no-important"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        source
            .find_all(r"(?i)!\s*important\b")
            .into_iter()
            .map(|offset| source.finding_at(offset, "!important not allowed"))
            .collect()
    }
}

/// `no-empty-rulesets`: rule blocks with nothing inside.
pub struct NoEmptyRulesets;

impl Rule for NoEmptyRulesets {
    fn name(&self) -> &'static str {
        "no-empty-rulesets"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        blocks(&source.code)
            .iter()
            .filter(|b| b.is_selector())
            .filter(|b| match b.close {
                Some(close) => source.code[b.open + 1..close].trim().is_empty(),
                None => false,
            })
            .map(|b| source.finding_at(b.prelude_start, "No empty blocks allowed"))
            .collect()
    }
}

/// `no-trailing-whitespace`: spaces or tabs at the end of a line.
pub struct NoTrailingWhitespace;

impl Rule for NoTrailingWhitespace {
    fn name(&self) -> &'static str {
        "no-trailing-whitespace"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        source.trailing_whitespace("Whitespace not allowed at end of line")
    }
}

/// `nesting-depth`: selectors nested too deeply.
pub struct NestingDepth {
    pub max_depth: usize,
}

impl Default for NestingDepth {
    fn default() -> Self {
        Self { max_depth: MAX_NESTING_DEPTH }
    }
}

impl Rule for NestingDepth {
    fn name(&self) -> &'static str {
        "nesting-depth"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        let message = format!("Blocks cannot be nested more than {} levels deep", self.max_depth);
        blocks(&source.code)
            .iter()
            .filter(|b| b.is_selector() && b.depth > self.max_depth)
            .map(|b| source.finding_at(b.prelude_start, message.clone()))
            .collect()
    }
}

/// `no-debug`: `@debug` statements.
pub struct NoDebug;

impl Rule for NoDebug {
    fn name(&self) -> &'static str {
        "no-debug"
    }

    fn check(&self, source: &SourceText<'_>) -> Vec<Finding> {
        source
            .find_all(r"@debug\b")
            .into_iter()
            .map(|offset| source.finding_at(offset, "@debug statements should not be used"))
            .collect()
    }
}

/// Every style rule at its default severity, then the config overrides.
pub fn linter(config: &LintRules) -> Linter {
    Linter::new(vec![
        Box::new(NoIds),
        Box::new(NoImportant),
        Box::new(NoEmptyRulesets),
        Box::new(NoTrailingWhitespace),
        Box::new(NestingDepth::default()),
        Box::new(NoDebug),
    ])
    .with_config(config)
}

/// Lint every `paths.sass` file.
pub fn lint_styles(ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
    let linter = linter(&ctx.config().lint.scss);
    lint_category(ctx, task, Category::Styles, &linter)
}
