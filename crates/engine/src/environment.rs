//! The engine facade: binds lexer/parser/renderer configuration, the
//! function registry and the template store behind one convenience API.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::config::{IncludeCallback, LexerConfig, ParserConfig, RenderConfig};
use crate::describe::DescriptionVisitor;
use crate::description::Description;
use crate::error::EngineError;
use crate::functions::{Callback, FunctionStorage};
use crate::parser::Parser;
use crate::renderer::Renderer;
use crate::template::{Template, TemplateStorage};

#[derive(Default)]
pub struct Environment {
    lexer_config: LexerConfig,
    parser_config: ParserConfig,
    render_config: RenderConfig,
    functions: FunctionStorage,
    templates: TemplateStorage,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Parsing ---

    pub fn parse(&mut self, input: &str) -> Result<Template, EngineError> {
        let mut parser = Parser::new(
            &self.parser_config,
            &self.lexer_config,
            &mut self.templates,
            &self.functions,
        );
        parser.parse(input)
    }

    /// Parses a template file (resolved against the templates directory),
    /// optionally attaching a description loaded from `info`.
    pub fn parse_file(
        &mut self,
        path: &Path,
        info: Option<&Path>,
    ) -> Result<Template, EngineError> {
        let mut parser = Parser::new(
            &self.parser_config,
            &self.lexer_config,
            &mut self.templates,
            &self.functions,
        );
        let mut tpl = parser.parse_file(path)?;
        if let Some(info) = info {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            tpl.desc = Description::from_file(&name, info)?;
        }
        Ok(tpl)
    }

    /// Parses a stand-alone expression (wrapped in expression delimiters when
    /// not already).
    pub fn parse_expression(&mut self, input: &str) -> Result<Template, EngineError> {
        let mut parser = Parser::new(
            &self.parser_config,
            &self.lexer_config,
            &mut self.templates,
            &self.functions,
        );
        parser.parse_expression_source(input)
    }

    // --- Rendering ---

    pub fn render(&self, tmpl: &Template, data: &Value) -> Result<String, EngineError> {
        let mut buffer = Vec::new();
        self.render_to(&mut buffer, tmpl, data)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn render_to(
        &self,
        out: &mut dyn Write,
        tmpl: &Template,
        data: &Value,
    ) -> Result<(), EngineError> {
        self.renderer().render(out, tmpl, data, None)
    }

    pub fn render_source(&mut self, input: &str, data: &Value) -> Result<String, EngineError> {
        let tmpl = self.parse(input)?;
        self.render(&tmpl, data)
    }

    pub fn render_file(
        &mut self,
        path: &Path,
        data: &Value,
        info: Option<&Path>,
    ) -> Result<String, EngineError> {
        let tmpl = self.parse_file(path, info)?;
        self.render(&tmpl, data)
    }

    // --- Expression evaluation ---

    /// Parses and evaluates a stand-alone expression against `data`.
    pub fn evaluate(&mut self, expr: &str, data: &Value) -> Result<Value, EngineError> {
        let tmpl = self.parse_expression(expr)?;
        self.renderer().evaluate_expression(&tmpl, data)
    }

    /// Evaluates an already-parsed expression template against `data`.
    pub fn evaluate_template(&self, tmpl: &Template, data: &Value) -> Result<Value, EngineError> {
        self.renderer().evaluate_expression(tmpl, data)
    }

    // --- Template descriptions ---

    pub fn describe_template(&self, tmpl: &Template) -> Description {
        let mut visitor = DescriptionVisitor::new(&self.render_config);
        visitor.populate(tmpl);
        visitor.description
    }

    /// Extracts the raw description of a template source: referenced
    /// variables and applied templates.
    pub fn description(&mut self, input: &str) -> Result<Description, EngineError> {
        let config = description_parser_config();
        let mut parser = Parser::new(
            &config,
            &self.lexer_config,
            &mut self.templates,
            &self.functions,
        );
        let tmpl = parser.parse(input)?;
        Ok(self.describe_template(&tmpl))
    }

    pub fn description_from_file(&mut self, path: &Path) -> Result<Description, EngineError> {
        let config = description_parser_config();
        let mut parser = Parser::new(
            &config,
            &self.lexer_config,
            &mut self.templates,
            &self.functions,
        );
        let tmpl = parser.parse_file(path)?;
        Ok(self.describe_template(&tmpl))
    }

    // --- Configuration ---

    /// Sets the opener and closer for template statements; trim variants are
    /// derived automatically.
    pub fn set_statement(&mut self, open: &str, close: &str) {
        self.lexer_config.statement_open = open.to_string();
        self.lexer_config.statement_open_force_lstrip = format!("{open}-");
        self.lexer_config.statement_close = close.to_string();
        self.lexer_config.statement_close_force_rstrip = format!("-{close}");
    }

    /// Sets the opener for template line statements.
    pub fn set_line_statement(&mut self, open: &str) {
        self.lexer_config.line_statement = open.to_string();
    }

    /// Sets the opener and closer for template expressions; trim variants
    /// are derived automatically.
    pub fn set_expression(&mut self, open: &str, close: &str) {
        self.lexer_config.expression_open = open.to_string();
        self.lexer_config.expression_open_force_lstrip = format!("{open}-");
        self.lexer_config.expression_close = close.to_string();
        self.lexer_config.expression_close_force_rstrip = format!("-{close}");
    }

    /// Sets the opener and closer for template comments; trim variants are
    /// derived automatically.
    pub fn set_comment(&mut self, open: &str, close: &str) {
        self.lexer_config.comment_open = open.to_string();
        self.lexer_config.comment_open_force_lstrip = format!("{open}-");
        self.lexer_config.comment_close = close.to_string();
        self.lexer_config.comment_close_force_rstrip = format!("-{close}");
    }

    pub fn set_templates_dir(&mut self, dir: impl Into<PathBuf>) {
        self.lexer_config.templates_dir = dir.into();
    }

    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.render_config.output_dir = dir.into();
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.render_config.dry_run = dry_run;
    }

    pub fn is_dry_run(&self) -> bool {
        self.render_config.dry_run
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.render_config.strict = strict;
    }

    pub fn set_loop_variable_name(&mut self, name: &str) {
        self.render_config.loop_variable_name = name.to_string();
    }

    pub fn set_throw_at_missing_includes(&mut self, throw: bool) {
        self.render_config.throw_at_missing_includes = throw;
    }

    pub fn set_parse_nested_template(&mut self, parse: bool) {
        self.parser_config.parse_nested_template = parse;
    }

    pub fn set_keep_comments(&mut self, keep: bool) {
        self.parser_config.keep_comments = keep;
    }

    pub fn set_include_callback(&mut self, callback: IncludeCallback) {
        self.parser_config.include_callback = Some(callback);
    }

    // --- Custom functions ---

    /// Registers a callback under `(name, arity)`; an arity of `-1` accepts
    /// any argument count.
    pub fn add_callback<F>(&mut self, name: &str, arity: i32, callback: F)
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.functions.add_callback(name, arity, Arc::new(callback));
    }

    /// Registers a callback invoked for its side effects; it renders as
    /// null, producing no output.
    pub fn add_void_callback<F>(&mut self, name: &str, arity: i32, callback: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let wrapped: Callback = Arc::new(move |args| {
            callback(args);
            Value::Null
        });
        self.functions.add_callback(name, arity, wrapped);
    }

    // --- Accessors ---

    pub fn templates(&self) -> &TemplateStorage {
        &self.templates
    }

    pub fn functions(&self) -> &FunctionStorage {
        &self.functions
    }

    fn renderer(&self) -> Renderer<'_> {
        Renderer::new(&self.render_config, &self.templates, &self.functions)
    }
}

/// Description extraction parses with nested templates disabled (the
/// extractor records their names without loading them) and comments kept.
fn description_parser_config() -> ParserConfig {
    ParserConfig {
        parse_nested_template: false,
        keep_comments: true,
        include_callback: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_source_in_one_call() {
        let mut env = Environment::new();
        let output = env.render_source("Simple text", &json!({})).unwrap();
        assert_eq!(output, "Simple text");
    }

    #[test]
    fn evaluates_stand_alone_expressions() {
        let mut env = Environment::new();
        let data = json!({"id": true});
        assert_eq!(
            env.evaluate(r#"exists("id") and id"#, &data).unwrap(),
            json!(true)
        );
        assert_eq!(env.evaluate("{{ 2 + 3 }}", &json!({})).unwrap(), json!(5));
    }

    #[test]
    fn custom_delimiters_apply_to_parsing() {
        let mut env = Environment::new();
        env.set_expression("<%", "%>");
        let output = env
            .render_source("value: <% x %>", &json!({"x": 7}))
            .unwrap();
        assert_eq!(output, "value: 7");
    }

    #[test]
    fn custom_callbacks_participate_in_expressions() {
        let mut env = Environment::new();
        env.add_callback("double", 1, |args| {
            json!(args[0].as_i64().unwrap_or_default() * 2)
        });
        let output = env.render_source("{{ double(21) }}", &json!({})).unwrap();
        assert_eq!(output, "42");
    }

    #[test]
    fn zero_arity_callbacks_resolve_like_variables() {
        let mut env = Environment::new();
        env.add_callback("answer", 0, |_| json!(42));
        let output = env.render_source("{{ answer }}", &json!({})).unwrap();
        assert_eq!(output, "42");
    }
}
