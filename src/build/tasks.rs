//! Dispatch from pipeline task kinds to their pipelines.

use crate::build::context::BuildContext;
use crate::build::graph::TaskKind;
use crate::build::result::TaskOutput;
use crate::error::TaskError;
use crate::paths::Category;
use crate::{clean, lint, pipeline, preflight};

/// Output prefix of component assets.
pub const COMPONENT_PREFIX: &str = "component-";
/// Output prefix of section assets.
pub const SECTION_PREFIX: &str = "section-";

impl TaskKind {
    /// Run the pipeline behind this kind. `task` names the run in logs.
    pub fn run(&self, ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
        use pipeline::{assets, minify, script, style};

        match self {
            TaskKind::Sass => style::compile_aggregate(ctx, task),
            TaskKind::SassComponents => {
                style::compile_styles(ctx, task, Category::StyleComponents, COMPONENT_PREFIX)
            }
            TaskKind::SassSections => {
                style::compile_styles(ctx, task, Category::StyleSections, SECTION_PREFIX)
            }
            TaskKind::Js => script::build_scripts(ctx, task, Category::Scripts, ""),
            TaskKind::JsComponents => {
                script::build_scripts(ctx, task, Category::ScriptComponents, COMPONENT_PREFIX)
            }
            TaskKind::JsSections => {
                script::build_scripts(ctx, task, Category::ScriptSections, SECTION_PREFIX)
            }
            TaskKind::LintScss => lint::scss::lint_styles(ctx, task),
            TaskKind::LintJs => lint::script::lint_scripts(ctx, task),
            TaskKind::MinifyCss => minify::minify_styles(ctx, task),
            TaskKind::Fonts => assets::copy_fonts(ctx, task),
            TaskKind::Images => assets::optimize_images(ctx, task),
            TaskKind::CleanAssets => clean::clean_assets(ctx, task),
            TaskKind::CheckScss => preflight::check_styles(ctx, task),
        }
    }

    /// The task to re-run when a file of `category` changes.
    pub fn for_category(category: Category) -> Option<TaskKind> {
        match category {
            Category::Fonts => Some(TaskKind::Fonts),
            Category::Images => Some(TaskKind::Images),
            Category::ScriptComponents => Some(TaskKind::JsComponents),
            Category::ScriptSections => Some(TaskKind::JsSections),
            Category::Scripts => Some(TaskKind::Js),
            Category::StyleComponents => Some(TaskKind::SassComponents),
            Category::StyleSections => Some(TaskKind::SassSections),
            Category::Styles => Some(TaskKind::Sass),
            Category::CompiledStyles => Some(TaskKind::MinifyCss),
            Category::EntryDocument => None,
        }
    }
}
