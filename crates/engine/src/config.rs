//! Configuration for the lexer, parser and renderer.

use std::path::{Path, PathBuf};

use crate::template::Template;

/// Delimiter configuration for the lexer. Every pair has a whitespace-trim
/// variant: the opener suffixed with `-`, the closer prefixed with `-`.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub statement_open: String,
    pub statement_open_force_lstrip: String,
    pub statement_close: String,
    pub statement_close_force_rstrip: String,
    pub line_statement: String,
    pub expression_open: String,
    pub expression_open_force_lstrip: String,
    pub expression_close: String,
    pub expression_close_force_rstrip: String,
    pub comment_open: String,
    pub comment_open_force_lstrip: String,
    pub comment_close: String,
    pub comment_close_force_rstrip: String,

    /// Directory where nested templates are resolved.
    pub templates_dir: PathBuf,
}

impl Default for LexerConfig {
    fn default() -> Self {
        LexerConfig {
            statement_open: "{%".into(),
            statement_open_force_lstrip: "{%-".into(),
            statement_close: "%}".into(),
            statement_close_force_rstrip: "-%}".into(),
            line_statement: "##".into(),
            expression_open: "{{".into(),
            expression_open_force_lstrip: "{{-".into(),
            expression_close: "}}".into(),
            expression_close_force_rstrip: "-}}".into(),
            comment_open: "{#".into(),
            comment_open_force_lstrip: "{#-".into(),
            comment_close: "#}".into(),
            comment_close_force_rstrip: "-#}".into(),
            templates_dir: PathBuf::new(),
        }
    }
}

/// Loads a template for `apply-template` when nested parsing is disabled.
/// Receives the derived file path and the template name.
pub type IncludeCallback = Box<dyn Fn(&Path, &str) -> Option<Template> + Send + Sync>;

pub struct ParserConfig {
    /// Parse templates referenced by `apply-template` from the templates
    /// directory.
    pub parse_nested_template: bool,
    /// Keep comment nodes in the AST.
    pub keep_comments: bool,
    /// Fallback template loader used when `parse_nested_template` is off.
    pub include_callback: Option<IncludeCallback>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            parse_nested_template: true,
            keep_comments: false,
            include_callback: None,
        }
    }
}

impl std::fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserConfig")
            .field("parse_nested_template", &self.parse_nested_template)
            .field("keep_comments", &self.keep_comments)
            .field("include_callback", &self.include_callback.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Directory that `file` statements write into.
    pub output_dir: PathBuf,
    /// Print sentinel markers instead of creating real files.
    pub dry_run: bool,
    /// Treat unresolvable variables as errors instead of nulls.
    pub strict: bool,
    /// Error on `apply-template` naming an unknown template.
    pub throw_at_missing_includes: bool,
    /// Name of the synthesized loop variable.
    pub loop_variable_name: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            output_dir: PathBuf::new(),
            dry_run: false,
            strict: false,
            throw_at_missing_includes: true,
            loop_variable_name: "loop".into(),
        }
    }
}
