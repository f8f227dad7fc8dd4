//! The template AST. Every node carries the byte offset it was parsed at so
//! render errors can be mapped back to a source position.

use serde_json::Value;

use crate::functions::{Associativity, Callback, Operation};
use crate::utils::{dotted_to_pointer, split_dotted};

/// Ordered sequence of child nodes; the root of every template.
#[derive(Debug, Default)]
pub struct Block {
    pub nodes: Vec<Node>,
}

#[derive(Debug)]
pub enum Node {
    Text(TextNode),
    Comment(CommentNode),
    Expression(ExpressionWrapper),
    If(IfStatement),
    ForArray(ForArrayStatement),
    ForObject(ForObjectStatement),
    File(FileStatement),
    ApplyTemplate(ApplyTemplateStatement),
    Set(SetStatement),
}

/// Verbatim slice of the template source.
#[derive(Debug)]
pub struct TextNode {
    pub pos: usize,
    pub length: usize,
}

#[derive(Debug)]
pub struct CommentNode {
    pub pos: usize,
    pub length: usize,
}

/// Wraps an expression at a statement boundary. The wrapped expression is
/// always present after a successful parse.
#[derive(Debug, Default)]
pub struct ExpressionWrapper {
    pub pos: usize,
    pub root: Option<ExpressionNode>,
}

#[derive(Debug)]
pub enum ExpressionNode {
    Literal(LiteralNode),
    Data(DataNode),
    Function(FunctionNode),
}

/// A literal parsed out of the source: boolean, number, string, or a whole
/// bracketed/braced JSON value.
#[derive(Debug)]
pub struct LiteralNode {
    pub pos: usize,
    pub value: Value,
}

/// A dotted data reference, resolved against the scope and user data at
/// render time.
#[derive(Debug)]
pub struct DataNode {
    pub pos: usize,
    pub name: String,
    pub parts: Vec<String>,
}

impl DataNode {
    pub fn new(name: impl Into<String>, pos: usize) -> Self {
        let name = name.into();
        let parts = split_dotted(&name);
        DataNode { pos, name, parts }
    }
}

/// An operator or function call with its resolved operation tag.
pub struct FunctionNode {
    pub pos: usize,
    pub operation: Operation,
    pub name: String,
    /// Number of arguments; operators carry the fixed arity of their
    /// operation.
    pub arity: i32,
    pub precedence: u8,
    pub associativity: Associativity,
    pub arguments: Vec<ExpressionNode>,
    pub callback: Option<Callback>,
}

impl FunctionNode {
    /// A named call; operation and callback are filled in once the registry
    /// resolves the name.
    pub fn named(name: impl Into<String>, pos: usize) -> Self {
        FunctionNode {
            pos,
            operation: Operation::Callback,
            name: name.into(),
            arity: 0,
            precedence: 8,
            associativity: Associativity::Left,
            arguments: Vec::new(),
            callback: None,
        }
    }

    /// An operator node with the arity/precedence/associativity of its
    /// operation.
    pub fn operator(operation: Operation, pos: usize) -> Self {
        let (arity, precedence, associativity) = operation
            .operator_info()
            .unwrap_or((1, 1, Associativity::Left));
        FunctionNode {
            pos,
            operation,
            name: String::new(),
            arity,
            precedence,
            associativity,
            arguments: Vec::new(),
            callback: None,
        }
    }
}

impl std::fmt::Debug for FunctionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionNode")
            .field("pos", &self.pos)
            .field("operation", &self.operation)
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("precedence", &self.precedence)
            .field("associativity", &self.associativity)
            .field("arguments", &self.arguments)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct IfStatement {
    pub pos: usize,
    pub condition: ExpressionWrapper,
    pub true_block: Block,
    pub false_block: Block,
    pub has_false: bool,
    /// Part of an `else if` chain; `endif` closes the whole chain at once.
    pub is_nested: bool,
}

/// `for value in expr`
#[derive(Debug)]
pub struct ForArrayStatement {
    pub pos: usize,
    pub value: String,
    pub condition: ExpressionWrapper,
    pub body: Block,
}

/// `for key, value in expr`
#[derive(Debug)]
pub struct ForObjectStatement {
    pub pos: usize,
    pub key: String,
    pub value: String,
    pub condition: ExpressionWrapper,
    pub body: Block,
}

/// `file expr … endfile`
#[derive(Debug)]
pub struct FileStatement {
    pub pos: usize,
    pub filename: ExpressionWrapper,
    pub body: Block,
}

/// `apply-template NAME FIELD`
#[derive(Debug)]
pub struct ApplyTemplateStatement {
    pub pos: usize,
    pub template_name: String,
    pub field_name: String,
    pub field_pointer: String,
}

impl ApplyTemplateStatement {
    pub fn new(template_name: impl Into<String>, field_name: impl Into<String>, pos: usize) -> Self {
        let field_name = field_name.into();
        let field_pointer = dotted_to_pointer(&field_name);
        ApplyTemplateStatement {
            pos,
            template_name: template_name.into(),
            field_name,
            field_pointer,
        }
    }
}

/// `set KEY = EXPR`
#[derive(Debug)]
pub struct SetStatement {
    pub pos: usize,
    pub key: String,
    pub expression: ExpressionWrapper,
}
