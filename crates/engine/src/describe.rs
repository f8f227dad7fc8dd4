//! Description extraction: walks a parsed template and accumulates the
//! variables it references plus the templates it applies. Loop-iteration
//! bindings and `<loop>.`-prefixed references are not variables of the
//! template and are filtered out.

use crate::ast::{Block, ExpressionNode, ExpressionWrapper, Node};
use crate::config::RenderConfig;
use crate::description::{Description, Variable};
use crate::template::Template;

pub struct DescriptionVisitor<'cfg> {
    pub description: Description,
    config: &'cfg RenderConfig,
    /// Names bound by enclosing `for` statements.
    bound: Vec<String>,
}

impl<'cfg> DescriptionVisitor<'cfg> {
    pub fn new(config: &'cfg RenderConfig) -> Self {
        DescriptionVisitor {
            description: Description::default(),
            config,
            bound: Vec::new(),
        }
    }

    pub fn populate(&mut self, tpl: &Template) {
        self.description = Description::default();
        self.bound.clear();
        self.visit_block(&tpl.root);
    }

    fn record_variable(&mut self, name: &str) {
        if self.description.variables.contains_key(name) {
            return;
        }
        let loop_prefix = format!("{}.", self.config.loop_variable_name);
        if name.starts_with(&loop_prefix) {
            return;
        }
        let first_segment = name.split('.').next().unwrap_or(name);
        if self.bound.iter().any(|b| b == first_segment) {
            return;
        }
        self.description
            .variables
            .insert(name.to_string(), Variable::named(name));
    }

    fn visit_block(&mut self, block: &Block) {
        for node in &block.nodes {
            self.visit_node(node);
        }
    }

    fn visit_node(&mut self, node: &Node) {
        match node {
            Node::Text(_) | Node::Comment(_) => {}
            Node::Expression(wrapper) => self.visit_wrapper(wrapper),
            Node::If(stmt) => {
                self.visit_wrapper(&stmt.condition);
                self.visit_block(&stmt.true_block);
                self.visit_block(&stmt.false_block);
            }
            Node::ForArray(stmt) => {
                self.visit_wrapper(&stmt.condition);
                self.bound.push(stmt.value.clone());
                self.visit_block(&stmt.body);
                self.bound.pop();
            }
            Node::ForObject(stmt) => {
                self.visit_wrapper(&stmt.condition);
                self.bound.push(stmt.key.clone());
                self.bound.push(stmt.value.clone());
                self.visit_block(&stmt.body);
                self.bound.pop();
                self.bound.pop();
            }
            Node::File(stmt) => {
                self.visit_wrapper(&stmt.filename);
                self.visit_block(&stmt.body);
            }
            Node::ApplyTemplate(stmt) => {
                self.record_variable(&stmt.field_name);
                self.description.nested.insert(stmt.template_name.clone());
            }
            Node::Set(stmt) => self.visit_wrapper(&stmt.expression),
        }
    }

    fn visit_wrapper(&mut self, wrapper: &ExpressionWrapper) {
        if let Some(root) = &wrapper.root {
            self.visit_expression(root);
        }
    }

    fn visit_expression(&mut self, expr: &ExpressionNode) {
        match expr {
            ExpressionNode::Literal(_) => {}
            ExpressionNode::Data(data) => self.record_variable(&data.name),
            ExpressionNode::Function(func) => {
                for arg in &func.arguments {
                    self.visit_expression(arg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LexerConfig, ParserConfig};
    use crate::functions::FunctionStorage;
    use crate::parser::Parser;
    use crate::template::TemplateStorage;

    fn describe(input: &str) -> Description {
        let parser_config = ParserConfig {
            parse_nested_template: false,
            ..ParserConfig::default()
        };
        let lexer_config = LexerConfig::default();
        let mut templates = TemplateStorage::new();
        let functions = FunctionStorage::default();
        let mut parser = Parser::new(&parser_config, &lexer_config, &mut templates, &functions);
        let tpl = parser.parse(input).unwrap();

        let render_config = RenderConfig::default();
        let mut visitor = DescriptionVisitor::new(&render_config);
        visitor.populate(&tpl);
        visitor.description
    }

    #[test]
    fn records_referenced_variables_once() {
        let desc = describe("{{ title }} {{ person.age }} {{ title }}");
        let names: Vec<_> = desc.variables.keys().cloned().collect();
        assert_eq!(names, vec!["person.age", "title"]);
    }

    #[test]
    fn skips_loop_frame_and_iteration_variables() {
        let desc = describe(
            "## for guest in guests\n{{ loop.index1 }}: {{ guest }} from {{ origin }}\n## endfor\n",
        );
        let names: Vec<_> = desc.variables.keys().cloned().collect();
        assert_eq!(names, vec!["guests", "origin"]);
    }

    #[test]
    fn object_loops_bind_key_and_value() {
        let desc = describe("## for k, v in person\n{{ k }}={{ v }}\n## endfor\n");
        let names: Vec<_> = desc.variables.keys().cloned().collect();
        assert_eq!(names, vec!["person"]);
    }

    #[test]
    fn apply_template_contributes_field_and_nested_name() {
        let desc = describe("## apply-template TableSchema tables\n");
        assert!(desc.variables.contains_key("tables"));
        assert!(desc.nested.contains("TableSchema"));
    }

    #[test]
    fn walks_conditions_bodies_and_set_expressions() {
        let desc = describe(
            "{% if flag %}{{ a }}{% else %}{{ b }}{% endif %}{% set x = c + 1 %}{% file fname %}{{ d }}{% endfile %}",
        );
        let names: Vec<_> = desc.variables.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "flag", "fname"]);
    }
}
