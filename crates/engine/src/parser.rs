//! The template parser.
//!
//! Drives the lexer token by token: statements are handled by recursive
//! descent over a stack of builder frames (one per open `if`/`for`/`file`),
//! expressions by a Shunting-Yard pass respecting operator precedence and
//! associativity. Parsing an `apply-template` statement loads the referenced
//! template into the shared template store, either by parsing
//! `<name>.tpl` from the templates directory or through the include
//! callback.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{
    ApplyTemplateStatement, Block, CommentNode, DataNode, ExpressionNode, ExpressionWrapper,
    FileStatement, ForArrayStatement, ForObjectStatement, FunctionNode, IfStatement, LiteralNode,
    Node, SetStatement, TextNode,
};
use crate::config::{LexerConfig, ParserConfig};
use crate::error::EngineError;
use crate::functions::{FunctionStorage, Operation};
use crate::lexer::{Lexer, LexerState};
use crate::template::{Template, TemplateStorage};
use crate::token::{Token, TokenKind};

struct ParserState<'src, 'l> {
    lexer: &'l Lexer,
    lstate: LexerState<'src>,
    tok: Token<'src>,
    peeked: Option<Token<'src>>,
}

impl<'src> ParserState<'src, '_> {
    fn next(&mut self) {
        self.tok = match self.peeked.take() {
            Some(token) => token,
            None => self.lexer.scan(&mut self.lstate),
        };
    }

    fn peek(&mut self) -> Token<'src> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.scan(&mut self.lstate));
        }
        self.peeked.expect("peeked token was just filled")
    }

    fn error(&self, msg: impl Into<String>) -> EngineError {
        EngineError::parser(msg, self.lexer.current_position(&self.lstate))
    }
}

/// How a `for` statement binds its iteration variables.
enum ForHead {
    Array { value: String },
    Object { key: String, value: String },
}

/// One open statement under construction. The frame plays the role of the
/// parent-block back-reference: when the closing keyword arrives the frame is
/// popped, assembled into a node and appended to the block below it.
enum Frame {
    If {
        pos: usize,
        condition: ExpressionWrapper,
        true_block: Block,
        false_block: Block,
        has_false: bool,
        in_false: bool,
        is_nested: bool,
    },
    For {
        pos: usize,
        head: ForHead,
        condition: ExpressionWrapper,
        body: Block,
    },
    File {
        pos: usize,
        filename: ExpressionWrapper,
        body: Block,
    },
}

#[derive(Default)]
struct BlockBuilder {
    root: Block,
    frames: Vec<Frame>,
}

impl BlockBuilder {
    fn active_mut(&mut self) -> &mut Vec<Node> {
        if self.frames.is_empty() {
            return &mut self.root.nodes;
        }
        match self.frames.last_mut().expect("frames is non-empty") {
            Frame::If {
                true_block,
                false_block,
                in_false,
                ..
            } => {
                if *in_false {
                    &mut false_block.nodes
                } else {
                    &mut true_block.nodes
                }
            }
            Frame::For { body, .. } | Frame::File { body, .. } => &mut body.nodes,
        }
    }

    fn push(&mut self, node: Node) {
        self.active_mut().push(node);
    }

    fn in_file_statement(&self) -> bool {
        self.frames.iter().any(|f| matches!(f, Frame::File { .. }))
    }
}

pub struct Parser<'env> {
    parser_config: &'env ParserConfig,
    lexer_config: &'env LexerConfig,
    templates: &'env mut TemplateStorage,
    functions: &'env FunctionStorage,
}

impl<'env> Parser<'env> {
    pub fn new(
        parser_config: &'env ParserConfig,
        lexer_config: &'env LexerConfig,
        templates: &'env mut TemplateStorage,
        functions: &'env FunctionStorage,
    ) -> Self {
        Parser {
            parser_config,
            lexer_config,
            templates,
            functions,
        }
    }

    pub fn parse(&mut self, input: &str) -> Result<Template, EngineError> {
        let mut tpl = Template::new(input);
        self.parse_into(&mut tpl)?;
        Ok(tpl)
    }

    /// Parses a template file resolved against the templates directory.
    pub fn parse_file(&mut self, path: &Path) -> Result<Template, EngineError> {
        let filepath = self.lexer_config.templates_dir.join(path);
        let input = fs::read_to_string(&filepath).map_err(|_| {
            EngineError::file(format!("failed accessing file '{}'", path.display()))
        })?;
        let mut tpl = Template::with_path(input, path);
        self.parse_into(&mut tpl)?;
        Ok(tpl)
    }

    /// Parses a stand-alone expression, wrapping it in expression delimiters
    /// when they are not already present.
    pub fn parse_expression_source(&mut self, input: &str) -> Result<Template, EngineError> {
        let content = if input.starts_with(&self.lexer_config.expression_open) {
            input.to_string()
        } else {
            format!(
                "{}{}{}",
                self.lexer_config.expression_open, input, self.lexer_config.expression_close
            )
        };
        let mut tpl = Template::new(content);
        self.parse_into(&mut tpl)?;
        Ok(tpl)
    }

    pub fn parse_into(&mut self, tmpl: &mut Template) -> Result<(), EngineError> {
        let lexer = Lexer::new(self.lexer_config);
        let mut st = ParserState {
            lexer: &lexer,
            lstate: lexer.start(&tmpl.content),
            tok: Token::new(TokenKind::Unknown, "", 0),
            peeked: None,
        };
        let mut builder = BlockBuilder::default();

        loop {
            st.next();
            match st.tok.kind {
                TokenKind::Eof => {
                    match builder.frames.last() {
                        Some(Frame::If { .. }) => return Err(st.error("unmatched if")),
                        Some(Frame::For { .. }) => return Err(st.error("unmatched for")),
                        Some(Frame::File { .. }) => return Err(st.error("unmatched file")),
                        None => {}
                    }
                    break;
                }
                TokenKind::Text => {
                    builder.push(Node::Text(TextNode {
                        pos: st.tok.offset,
                        length: st.tok.text.len(),
                    }));
                }
                TokenKind::StatementOpen => {
                    st.next();
                    self.parse_statement(&mut st, &mut builder)?;
                    if st.tok.kind != TokenKind::StatementClose {
                        return Err(st.error(format!(
                            "expected statement close, got '{}'",
                            st.tok.describe()
                        )));
                    }
                }
                TokenKind::LineStatementOpen => {
                    st.next();
                    self.parse_statement(&mut st, &mut builder)?;
                    if st.tok.kind != TokenKind::LineStatementClose && st.tok.kind != TokenKind::Eof
                    {
                        return Err(st.error(format!(
                            "expected line statement close, got '{}'",
                            st.tok.describe()
                        )));
                    }
                }
                TokenKind::ExpressionOpen => {
                    st.next();
                    let wrapper = self.parse_required_expression(&mut st)?;
                    builder.push(Node::Expression(wrapper));
                    if st.tok.kind != TokenKind::ExpressionClose {
                        return Err(st.error(format!(
                            "expected expression close, got '{}'",
                            st.tok.describe()
                        )));
                    }
                }
                TokenKind::CommentOpen => {
                    st.next();
                    if st.tok.kind != TokenKind::CommentClose {
                        return Err(st.error(format!(
                            "expected comment close, got '{}'",
                            st.tok.describe()
                        )));
                    }
                    if self.parser_config.keep_comments {
                        builder.push(Node::Comment(CommentNode {
                            pos: st.tok.offset,
                            length: st.tok.text.len(),
                        }));
                    }
                }
                _ => {
                    return Err(st.error(format!("unexpected token '{}'", st.tok.describe())));
                }
            }
        }

        tmpl.root = builder.root;
        Ok(())
    }

    fn parse_statement(
        &mut self,
        st: &mut ParserState<'_, '_>,
        builder: &mut BlockBuilder,
    ) -> Result<(), EngineError> {
        if st.tok.kind != TokenKind::Id {
            return Err(st.error(format!("expected statement, got '{}'", st.tok.describe())));
        }
        match st.tok.text {
            "if" => self.parse_if_statement(false, st, builder),
            "else" => self.parse_else_statement(st, builder),
            "endif" => parse_endif_statement(st, builder),
            "for" => self.parse_for_statement(st, builder),
            "endfor" => parse_endfor_statement(st, builder),
            "file" => self.parse_file_statement(st, builder),
            "endfile" => parse_endfile_statement(st, builder),
            "apply-template" => self.parse_apply_template_statement(st, builder),
            "set" => self.parse_set_statement(st, builder),
            _ => Err(st.error(format!("expected statement, got '{}'", st.tok.describe()))),
        }
    }

    fn parse_if_statement(
        &mut self,
        is_nested: bool,
        st: &mut ParserState<'_, '_>,
        builder: &mut BlockBuilder,
    ) -> Result<(), EngineError> {
        // skip the "if" keyword
        st.next();
        let pos = st.tok.offset;
        let condition = self.parse_required_expression(st)?;
        builder.frames.push(Frame::If {
            pos,
            condition,
            true_block: Block::default(),
            false_block: Block::default(),
            has_false: false,
            in_false: false,
            is_nested,
        });
        Ok(())
    }

    fn parse_else_statement(
        &mut self,
        st: &mut ParserState<'_, '_>,
        builder: &mut BlockBuilder,
    ) -> Result<(), EngineError> {
        let Some(Frame::If {
            has_false, in_false, ..
        }) = builder.frames.last_mut()
        else {
            return Err(st.error("else without matching if"));
        };
        *has_false = true;
        *in_false = true;
        // skip the "else" keyword
        st.next();
        // chained `else if`
        if st.tok.kind == TokenKind::Id && st.tok.text == "if" {
            return self.parse_if_statement(true, st, builder);
        }
        Ok(())
    }

    fn parse_for_statement(
        &mut self,
        st: &mut ParserState<'_, '_>,
        builder: &mut BlockBuilder,
    ) -> Result<(), EngineError> {
        // skip the "for" keyword
        st.next();
        // options: `for v in arr`, `for k, v in obj`
        if st.tok.kind != TokenKind::Id {
            return Err(st.error(format!("expected id, got '{}'", st.tok.describe())));
        }
        let first = st.tok.text.to_string();
        st.next();

        let head = if st.tok.kind == TokenKind::Comma {
            st.next();
            if st.tok.kind != TokenKind::Id {
                return Err(st.error(format!("expected id, got '{}'", st.tok.describe())));
            }
            let value = st.tok.text.to_string();
            st.next();
            ForHead::Object { key: first, value }
        } else {
            ForHead::Array { value: first }
        };

        let pos = st.tok.offset;
        if st.tok.kind != TokenKind::Id || st.tok.text != "in" {
            return Err(st.error(format!("expected 'in', got '{}'", st.tok.describe())));
        }
        st.next();
        let condition = self.parse_required_expression(st)?;
        builder.frames.push(Frame::For {
            pos,
            head,
            condition,
            body: Block::default(),
        });
        Ok(())
    }

    fn parse_file_statement(
        &mut self,
        st: &mut ParserState<'_, '_>,
        builder: &mut BlockBuilder,
    ) -> Result<(), EngineError> {
        if builder.in_file_statement() {
            return Err(st.error("file statements cannot be nested"));
        }
        // skip the "file" keyword
        st.next();
        let pos = st.tok.offset;
        let filename = self.parse_required_expression(st)?;
        builder.frames.push(Frame::File {
            pos,
            filename,
            body: Block::default(),
        });
        Ok(())
    }

    fn parse_apply_template_statement(
        &mut self,
        st: &mut ParserState<'_, '_>,
        builder: &mut BlockBuilder,
    ) -> Result<(), EngineError> {
        // skip the "apply-template" keyword
        st.next();
        if st.tok.kind != TokenKind::Id {
            return Err(st.error(format!(
                "expected template name, got '{}'",
                st.tok.describe()
            )));
        }
        let name = st.tok.text.to_string();
        st.next();
        if st.tok.kind != TokenKind::Id {
            return Err(st.error(format!(
                "expected json field name, got '{}'",
                st.tok.describe()
            )));
        }
        let field = st.tok.text.to_string();
        builder.push(Node::ApplyTemplate(ApplyTemplateStatement::new(
            &name,
            field,
            st.tok.offset,
        )));
        st.next();
        self.load_nested_template(&name)
    }

    fn parse_set_statement(
        &mut self,
        st: &mut ParserState<'_, '_>,
        builder: &mut BlockBuilder,
    ) -> Result<(), EngineError> {
        // skip the "set" keyword
        st.next();
        if st.tok.kind != TokenKind::Id {
            return Err(st.error(format!(
                "expected variable name, got '{}'",
                st.tok.describe()
            )));
        }
        let key = st.tok.text.to_string();
        let pos = st.tok.offset;
        st.next();
        if st.tok.text != "=" {
            return Err(st.error(format!("expected '=', got '{}'", st.tok.describe())));
        }
        st.next();
        let expression = self.parse_required_expression(st)?;
        builder.push(Node::Set(SetStatement {
            pos,
            key,
            expression,
        }));
        Ok(())
    }

    /// Ensures the template referenced by `apply-template` is present in the
    /// store, parsing `<name>.tpl` or delegating to the include callback.
    fn load_nested_template(&mut self, name: &str) -> Result<(), EngineError> {
        if self.templates.contains_key(name) {
            return Ok(());
        }
        let template_path = PathBuf::from(format!("{name}.tpl"));
        if self.parser_config.parse_nested_template {
            log::debug!("parsing nested template '{name}'");
            let tpl = self.parse_file(&template_path)?;
            self.templates.insert(name.to_string(), tpl);
        } else if let Some(callback) = &self.parser_config.include_callback
            && let Some(mut tpl) = callback(&template_path, name)
        {
            // the callback may hand back bare source; compile it here
            if tpl.root.nodes.is_empty() && !tpl.content.is_empty() {
                self.parse_into(&mut tpl)?;
            }
            self.templates.insert(name.to_string(), tpl);
        }
        Ok(())
    }

    fn parse_required_expression(
        &mut self,
        st: &mut ParserState<'_, '_>,
    ) -> Result<ExpressionWrapper, EngineError> {
        let pos = st.tok.offset;
        let root = self.parse_expression(st)?;
        if root.is_none() {
            return Err(st.error("empty expression"));
        }
        Ok(ExpressionWrapper { pos, root })
    }

    /// Shunting-Yard over the token stream. Returns with the current token
    /// at the terminator (body close, `,`, `)` or any unexpected token).
    fn parse_expression(
        &mut self,
        st: &mut ParserState<'_, '_>,
    ) -> Result<Option<ExpressionNode>, EngineError> {
        let mut bracket_level = 0usize;
        let mut brace_level = 0usize;
        let mut operator_stack: Vec<FunctionNode> = Vec::new();
        let mut arguments: Vec<ExpressionNode> = Vec::new();
        let mut literal_start: Option<Token<'_>> = None;

        'scan: while st.tok.kind != TokenKind::Eof {
            match st.tok.kind {
                TokenKind::String | TokenKind::Number => {
                    if bracket_level == 0 && brace_level == 0 {
                        add_literal(st, st.tok, &mut arguments)?;
                    }
                }
                TokenKind::LeftBracket => {
                    if bracket_level == 0 && brace_level == 0 {
                        literal_start = Some(st.tok);
                    }
                    bracket_level += 1;
                }
                TokenKind::LeftBrace => {
                    if bracket_level == 0 && brace_level == 0 {
                        literal_start = Some(st.tok);
                    }
                    brace_level += 1;
                }
                TokenKind::RightBracket => {
                    if bracket_level == 0 {
                        return Err(st.error("unexpected ']'"));
                    }
                    bracket_level -= 1;
                    if bracket_level == 0 && brace_level == 0 {
                        let start = literal_start.take().expect("bracket literal has a start");
                        add_literal(st, start, &mut arguments)?;
                    }
                }
                TokenKind::RightBrace => {
                    if brace_level == 0 {
                        return Err(st.error("unexpected '}'"));
                    }
                    brace_level -= 1;
                    if bracket_level == 0 && brace_level == 0 {
                        let start = literal_start.take().expect("brace literal has a start");
                        add_literal(st, start, &mut arguments)?;
                    }
                }
                TokenKind::Id => match st.tok.text {
                    "true" | "false" | "null" => {
                        if bracket_level == 0 && brace_level == 0 {
                            add_literal(st, st.tok, &mut arguments)?;
                        }
                    }
                    "and" | "or" | "in" | "not" => {
                        push_operator(st, &mut arguments, &mut operator_stack)?;
                    }
                    _ => {
                        if st.peek().kind == TokenKind::LeftParen {
                            let func = self.create_function(st)?;
                            arguments.push(ExpressionNode::Function(func));
                        } else {
                            arguments
                                .push(ExpressionNode::Data(DataNode::new(st.tok.text, st.tok.offset)));
                        }
                    }
                },
                TokenKind::Equal
                | TokenKind::NotEqual
                | TokenKind::GreaterThan
                | TokenKind::GreaterEqual
                | TokenKind::LessThan
                | TokenKind::LessEqual
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Times
                | TokenKind::Slash
                | TokenKind::Power
                | TokenKind::Percent => {
                    push_operator(st, &mut arguments, &mut operator_stack)?;
                }
                TokenKind::Comma => {
                    if bracket_level == 0 && brace_level == 0 {
                        break 'scan;
                    }
                }
                TokenKind::Colon => {
                    if bracket_level == 0 && brace_level == 0 {
                        return Err(st.error("unexpected ':'"));
                    }
                }
                TokenKind::LeftParen => {
                    let expr = self.create_sub_expression(st)?;
                    arguments.push(expr);
                }
                _ => break 'scan,
            }
            st.next();
        }

        while let Some(op) = operator_stack.pop() {
            apply_operator(st, op, &mut arguments)?;
        }
        match arguments.len() {
            0 => Ok(None),
            1 => Ok(arguments.pop()),
            _ => Err(st.error("malformed expression")),
        }
    }

    /// A named call: `name(arg, …)`. The name is resolved in the function
    /// registry; unknown names and arity mismatches are parse errors.
    fn create_function(
        &mut self,
        st: &mut ParserState<'_, '_>,
    ) -> Result<FunctionNode, EngineError> {
        let mut func = FunctionNode::named(st.tok.text, st.tok.offset);
        // current token is the name; the '(' was peeked
        st.next();
        loop {
            st.next();
            let Some(expr) = self.parse_expression(st)? else {
                break;
            };
            func.arity += 1;
            func.arguments.push(expr);
            if st.tok.kind != TokenKind::Comma {
                break;
            }
        }
        if st.tok.kind != TokenKind::RightParen {
            return Err(st.error(format!(
                "expected right parenthesis, got '{}'",
                st.tok.describe()
            )));
        }
        let Some(data) = self.functions.find_function(&func.name, func.arity) else {
            return Err(st.error(format!("unknown function {}", func.name)));
        };
        func.operation = data.operation;
        if data.operation == Operation::Callback {
            func.callback = data.callback.clone();
        }
        Ok(func)
    }

    /// A parenthesized sub-expression; must be non-empty and end at `)`.
    fn create_sub_expression(
        &mut self,
        st: &mut ParserState<'_, '_>,
    ) -> Result<ExpressionNode, EngineError> {
        st.next();
        let expr = self.parse_expression(st)?;
        if st.tok.kind != TokenKind::RightParen {
            return Err(st.error(format!(
                "expected right parenthesis, got '{}'",
                st.tok.describe()
            )));
        }
        expr.ok_or_else(|| st.error("empty expression in parentheses"))
    }
}

fn parse_endif_statement(
    st: &mut ParserState<'_, '_>,
    builder: &mut BlockBuilder,
) -> Result<(), EngineError> {
    if !matches!(builder.frames.last(), Some(Frame::If { .. })) {
        return Err(st.error("endif without matching if"));
    }
    // skip the "endif" keyword
    st.next();
    // an `else if` chain closes atomically
    loop {
        let Some(Frame::If {
            pos,
            condition,
            true_block,
            false_block,
            has_false,
            is_nested,
            ..
        }) = builder.frames.pop()
        else {
            return Err(st.error("endif without matching if"));
        };
        let node = Node::If(IfStatement {
            pos,
            condition,
            true_block,
            false_block,
            has_false,
            is_nested,
        });
        if is_nested {
            match builder.frames.last_mut() {
                Some(Frame::If { false_block, .. }) => false_block.nodes.push(node),
                _ => return Err(st.error("endif without matching if")),
            }
        } else {
            builder.push(node);
            break;
        }
    }
    Ok(())
}

fn parse_endfor_statement(
    st: &mut ParserState<'_, '_>,
    builder: &mut BlockBuilder,
) -> Result<(), EngineError> {
    let Some(Frame::For { .. }) = builder.frames.last() else {
        return Err(st.error("endfor without matching for"));
    };
    // skip the "endfor" keyword
    st.next();
    let Some(Frame::For {
        pos,
        head,
        condition,
        body,
    }) = builder.frames.pop()
    else {
        unreachable!("top frame was checked to be a for");
    };
    let node = match head {
        ForHead::Array { value } => Node::ForArray(ForArrayStatement {
            pos,
            value,
            condition,
            body,
        }),
        ForHead::Object { key, value } => Node::ForObject(ForObjectStatement {
            pos,
            key,
            value,
            condition,
            body,
        }),
    };
    builder.push(node);
    Ok(())
}

fn parse_endfile_statement(
    st: &mut ParserState<'_, '_>,
    builder: &mut BlockBuilder,
) -> Result<(), EngineError> {
    let Some(Frame::File { .. }) = builder.frames.last() else {
        return Err(st.error("endfile without matching file"));
    };
    // skip the "endfile" keyword
    st.next();
    let Some(Frame::File {
        pos,
        filename,
        body,
    }) = builder.frames.pop()
    else {
        unreachable!("top frame was checked to be a file");
    };
    builder.push(Node::File(FileStatement {
        pos,
        filename,
        body,
    }));
    Ok(())
}

/// Parses the source span from `start` through the current token as a JSON
/// literal and pushes it as an operand.
fn add_literal(
    st: &ParserState<'_, '_>,
    start: Token<'_>,
    arguments: &mut Vec<ExpressionNode>,
) -> Result<(), EngineError> {
    let end = st.tok.offset + st.tok.text.len();
    let text = &st.lstate.input()[start.offset..end];
    let value = serde_json::from_str(text)
        .map_err(|_| st.error(format!("malformed literal '{text}'")))?;
    arguments.push(ExpressionNode::Literal(LiteralNode {
        pos: start.offset,
        value,
    }));
    Ok(())
}

fn operation_for_token(st: &ParserState<'_, '_>) -> Result<Operation, EngineError> {
    match st.tok.kind {
        TokenKind::Id => match st.tok.text {
            "and" => Ok(Operation::And),
            "or" => Ok(Operation::Or),
            "in" => Ok(Operation::In),
            "not" => Ok(Operation::Not),
            _ => Err(st.error("unknown operator in parser")),
        },
        TokenKind::Equal => Ok(Operation::Equal),
        TokenKind::NotEqual => Ok(Operation::NotEqual),
        TokenKind::GreaterThan => Ok(Operation::Greater),
        TokenKind::GreaterEqual => Ok(Operation::GreaterEqual),
        TokenKind::LessThan => Ok(Operation::Less),
        TokenKind::LessEqual => Ok(Operation::LessEqual),
        TokenKind::Plus => Ok(Operation::Add),
        TokenKind::Minus => Ok(Operation::Subtract),
        TokenKind::Times => Ok(Operation::Multiplication),
        TokenKind::Slash => Ok(Operation::Division),
        TokenKind::Power => Ok(Operation::Power),
        TokenKind::Percent => Ok(Operation::Modulo),
        _ => Err(st.error("unknown operator in parser")),
    }
}

/// Pops operators with better precedence into the operand list, then pushes
/// the operator for the current token.
fn push_operator(
    st: &mut ParserState<'_, '_>,
    arguments: &mut Vec<ExpressionNode>,
    operator_stack: &mut Vec<FunctionNode>,
) -> Result<(), EngineError> {
    let operation = operation_for_token(st)?;
    let node = FunctionNode::operator(operation, st.tok.offset);
    while let Some(top) = operator_stack.last() {
        let pops = top.precedence > node.precedence
            || (top.precedence == node.precedence
                && node.associativity == crate::functions::Associativity::Left);
        if !pops {
            break;
        }
        let top = operator_stack.pop().expect("operator stack is non-empty");
        apply_operator(st, top, arguments)?;
    }
    operator_stack.push(node);
    Ok(())
}

/// Moves an operator off the stack, consuming its arity in operands.
fn apply_operator(
    st: &ParserState<'_, '_>,
    mut op: FunctionNode,
    arguments: &mut Vec<ExpressionNode>,
) -> Result<(), EngineError> {
    let arity = op.arity.max(0) as usize;
    if arguments.len() < arity {
        return Err(st.error("too few arguments"));
    }
    op.arguments = arguments.split_off(arguments.len() - arity);
    arguments.push(ExpressionNode::Function(op));
    Ok(())
}
