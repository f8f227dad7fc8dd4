//! The tree-walking renderer.
//!
//! Rendering walks the AST depth-first, left to right, against the read-only
//! user data and a per-invocation auxiliary scope holding `set` results and
//! the synthesized loop frame. Expressions are evaluated on an explicit slot
//! stack; a slot either carries a value (borrowed from the data or computed)
//! or records the data reference that failed to resolve, so `default`,
//! `exists*` and lenient-mode printing can consume the miss without losing
//! the diagnostic. `file` statements redirect output through a sink stack;
//! `apply-template` runs nested templates in fresh invocation state seeded
//! with the caller's scope.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fs;
use std::io::{BufWriter, Write};

use itertools::Itertools;
use serde_json::{Map, Value, json};

use crate::ast::{
    ApplyTemplateStatement, Block, DataNode, ExpressionNode, ExpressionWrapper, FileStatement,
    ForArrayStatement, ForObjectStatement, FunctionNode, Node, SetStatement,
};
use crate::config::RenderConfig;
use crate::description::VarType;
use crate::error::EngineError;
use crate::functions::{FunctionStorage, Operation};
use crate::template::{Template, TemplateStorage};
use crate::utils::{dotted_to_pointer, normalize_separators, source_location};
use crate::value::{
    as_int, compare_values, convert_value, find_pointers, set_dotted, truthy, write_value,
};

enum Sink<'o> {
    Main(&'o mut dyn Write),
    File(BufWriter<fs::File>),
}

impl Sink<'_> {
    fn as_write(&mut self) -> &mut dyn Write {
        match self {
            Sink::Main(out) => &mut **out,
            Sink::File(file) => file,
        }
    }
}

/// Per-invocation state; `apply-template` sub-renders get a fresh one.
struct RenderState<'t, 'o> {
    tmpl: &'t Template,
    input: &'t Value,
    scope: Value,
    sinks: Vec<Sink<'o>>,
}

impl RenderState<'_, '_> {
    fn out(&mut self) -> &mut dyn Write {
        self.sinks
            .last_mut()
            .expect("a render always has an active sink")
            .as_write()
    }
}

/// One entry of the evaluation stack: a resolved value, or the data
/// reference whose resolution came up empty.
enum Slot<'v> {
    Value(Cow<'v, Value>),
    Missing(&'v DataNode),
}

enum NumPair {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numeric_pair(a: &Value, b: &Value) -> Option<NumPair> {
    if let (Some(x), Some(y)) = (as_int(a), as_int(b)) {
        return Some(NumPair::Ints(x, y));
    }
    if a.is_number() && b.is_number() {
        return Some(NumPair::Floats(a.as_f64()?, b.as_f64()?));
    }
    None
}

fn op_symbol(op: Operation) -> &'static str {
    match op {
        Operation::Greater => ">",
        Operation::GreaterEqual => ">=",
        Operation::Less => "<",
        Operation::LessEqual => "<=",
        Operation::Add => "+",
        Operation::Subtract => "-",
        Operation::Multiplication => "*",
        Operation::Division => "/",
        Operation::Power => "^",
        Operation::Modulo => "%",
        _ => "?",
    }
}

fn render_error(tmpl: &Template, pos: usize, msg: impl Into<String>) -> EngineError {
    EngineError::render(msg, source_location(&tmpl.content, pos))
}

fn scope_object(scope: &mut Value) -> &mut Map<String, Value> {
    if !scope.is_object() {
        *scope = Value::Object(Map::new());
    }
    scope.as_object_mut().expect("scope was just made an object")
}

fn loop_frame(index: usize, count: usize, parent: Option<&Value>) -> Value {
    let mut frame = Map::new();
    frame.insert("index".into(), json!(index));
    frame.insert("index1".into(), json!(index + 1));
    frame.insert("is_first".into(), json!(index == 0));
    frame.insert("is_last".into(), json!(index + 1 == count));
    if let Some(parent) = parent {
        frame.insert("parent".into(), parent.clone());
    }
    Value::Object(frame)
}

pub struct Renderer<'env> {
    config: &'env RenderConfig,
    templates: &'env TemplateStorage,
    functions: &'env FunctionStorage,
}

impl<'env> Renderer<'env> {
    pub fn new(
        config: &'env RenderConfig,
        templates: &'env TemplateStorage,
        functions: &'env FunctionStorage,
    ) -> Self {
        Renderer {
            config,
            templates,
            functions,
        }
    }

    /// Renders `tmpl` against `data` into `out`. `loop_data` seeds the
    /// auxiliary scope; top-level renders start with an empty scope.
    pub fn render(
        &self,
        out: &mut dyn Write,
        tmpl: &Template,
        data: &Value,
        loop_data: Option<Value>,
    ) -> Result<(), EngineError> {
        let mut st = RenderState {
            tmpl,
            input: data,
            scope: loop_data.unwrap_or_else(|| Value::Object(Map::new())),
            sinks: vec![Sink::Main(out)],
        };
        self.render_block(&mut st, &tmpl.root)
    }

    /// Evaluates a template holding a single expression, returning the value.
    pub fn evaluate_expression(
        &self,
        tmpl: &Template,
        data: &Value,
    ) -> Result<Value, EngineError> {
        let Some(node) = tmpl.root.nodes.first() else {
            return Err(render_error(tmpl, 0, "empty expression"));
        };
        let Node::Expression(wrapper) = node else {
            return Err(render_error(tmpl, 0, "template doesn't contain an expression"));
        };
        let st = RenderState {
            tmpl,
            input: data,
            scope: Value::Object(Map::new()),
            sinks: Vec::new(),
        };
        self.eval_expression(&st, wrapper)
    }

    fn render_block<'t>(
        &self,
        st: &mut RenderState<'t, '_>,
        block: &'t Block,
    ) -> Result<(), EngineError> {
        for node in &block.nodes {
            self.render_node(st, node)?;
        }
        Ok(())
    }

    fn render_node<'t>(
        &self,
        st: &mut RenderState<'t, '_>,
        node: &'t Node,
    ) -> Result<(), EngineError> {
        match node {
            Node::Text(text) => {
                let content = &st.tmpl.content;
                let end = (text.pos + text.length).min(content.len());
                let bytes = &content.as_bytes()[text.pos.min(end)..end];
                st.out().write_all(bytes)?;
                Ok(())
            }
            Node::Comment(_) => Ok(()),
            Node::Expression(wrapper) => {
                let value = self.eval_expression(st, wrapper)?;
                write_value(st.out(), &value)?;
                Ok(())
            }
            Node::If(stmt) => {
                let condition = self.eval_expression(st, &stmt.condition)?;
                if truthy(&condition) {
                    self.render_block(st, &stmt.true_block)
                } else if stmt.has_false {
                    self.render_block(st, &stmt.false_block)
                } else {
                    Ok(())
                }
            }
            Node::ForArray(stmt) => self.render_for_array(st, stmt),
            Node::ForObject(stmt) => self.render_for_object(st, stmt),
            Node::File(stmt) => self.render_file(st, stmt),
            Node::ApplyTemplate(stmt) => self.render_apply_template(st, stmt),
            Node::Set(stmt) => self.render_set(st, stmt),
        }
    }

    fn render_for_array<'t>(
        &self,
        st: &mut RenderState<'t, '_>,
        stmt: &'t ForArrayStatement,
    ) -> Result<(), EngineError> {
        let result = self.eval_expression(st, &stmt.condition)?;
        let Value::Array(items) = result else {
            return Err(render_error(st.tmpl, stmt.pos, "object must be an array"));
        };
        let loop_name = self.config.loop_variable_name.clone();
        let prior_loop = scope_object(&mut st.scope).get(&loop_name).cloned();

        let count = items.len();
        for (index, item) in items.into_iter().enumerate() {
            let frame = loop_frame(index, count, prior_loop.as_ref());
            let scope = scope_object(&mut st.scope);
            scope.insert(stmt.value.clone(), item);
            scope.insert(loop_name.clone(), frame);
            self.render_block(st, &stmt.body)?;
        }

        let scope = scope_object(&mut st.scope);
        scope.shift_remove(&stmt.value);
        match prior_loop {
            Some(prev) => {
                scope.insert(loop_name, prev);
            }
            None => {
                scope.shift_remove(&loop_name);
            }
        }
        Ok(())
    }

    fn render_for_object<'t>(
        &self,
        st: &mut RenderState<'t, '_>,
        stmt: &'t ForObjectStatement,
    ) -> Result<(), EngineError> {
        let result = self.eval_expression(st, &stmt.condition)?;
        let Value::Object(entries) = result else {
            return Err(render_error(st.tmpl, stmt.pos, "object must be an object"));
        };
        let loop_name = self.config.loop_variable_name.clone();
        let prior_loop = scope_object(&mut st.scope).get(&loop_name).cloned();

        let count = entries.len();
        for (index, (key, value)) in entries.into_iter().enumerate() {
            let frame = loop_frame(index, count, prior_loop.as_ref());
            let scope = scope_object(&mut st.scope);
            scope.insert(stmt.key.clone(), json!(key));
            scope.insert(stmt.value.clone(), value);
            scope.insert(loop_name.clone(), frame);
            self.render_block(st, &stmt.body)?;
        }

        let scope = scope_object(&mut st.scope);
        scope.shift_remove(&stmt.key);
        scope.shift_remove(&stmt.value);
        match prior_loop {
            Some(prev) => {
                scope.insert(loop_name, prev);
            }
            None => {
                scope.shift_remove(&loop_name);
            }
        }
        Ok(())
    }

    fn render_file<'t>(
        &self,
        st: &mut RenderState<'t, '_>,
        stmt: &'t FileStatement,
    ) -> Result<(), EngineError> {
        let filename = self.eval_expression(st, &stmt.filename)?;
        let Value::String(name) = filename else {
            return Err(render_error(st.tmpl, stmt.pos, "filename must be a string"));
        };

        if self.config.dry_run {
            writeln!(st.out(), ">>>>>> Start file: {name:?}")?;
            self.render_block(st, &stmt.body)?;
            writeln!(st.out(), "<<<<<< End file: {name:?}")?;
            return Ok(());
        }

        let filepath = self.config.output_dir.join(normalize_separators(&name));
        if let Some(parent) = filepath.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|_| render_error(st.tmpl, stmt.pos, "couldn't create output path"))?;
        }
        log::debug!("writing generated file {}", filepath.display());
        let file = fs::File::create(&filepath)
            .map_err(|_| render_error(st.tmpl, stmt.pos, "couldn't create output file"))?;

        st.sinks.push(Sink::File(BufWriter::new(file)));
        let rendered = self.render_block(st, &stmt.body);
        let sink = st.sinks.pop().expect("the file sink was just pushed");
        rendered?;
        if let Sink::File(mut writer) = sink {
            writer.flush()?;
        }
        Ok(())
    }

    fn render_apply_template<'t>(
        &self,
        st: &mut RenderState<'t, '_>,
        stmt: &'t ApplyTemplateStatement,
    ) -> Result<(), EngineError> {
        let Some(tpl) = self.templates.get(&stmt.template_name) else {
            if self.config.throw_at_missing_includes {
                return Err(render_error(
                    st.tmpl,
                    stmt.pos,
                    format!("apply template '{}' not found", stmt.template_name),
                ));
            }
            return Ok(());
        };
        let input = st.input;
        let Some(field) = input.pointer(&stmt.field_pointer) else {
            return Ok(());
        };
        log::debug!(
            "applying template '{}' to field '{}'",
            stmt.template_name,
            stmt.field_name
        );

        match field {
            Value::Array(items) => {
                let loop_name = self.config.loop_variable_name.clone();
                let prior_loop = scope_object(&mut st.scope).get(&loop_name).cloned();

                let count = items.len();
                for (index, item) in items.iter().enumerate() {
                    let frame = loop_frame(index, count, prior_loop.as_ref());
                    scope_object(&mut st.scope).insert(loop_name.clone(), frame);
                    let seed = st.scope.clone();
                    let out = st
                        .sinks
                        .last_mut()
                        .expect("a render always has an active sink")
                        .as_write();
                    self.render(out, tpl, item, Some(seed))?;
                }

                let scope = scope_object(&mut st.scope);
                match prior_loop {
                    Some(prev) => {
                        scope.insert(loop_name, prev);
                    }
                    None => {
                        scope.shift_remove(&loop_name);
                    }
                }
            }
            _ => {
                let seed = st.scope.clone();
                let out = st
                    .sinks
                    .last_mut()
                    .expect("a render always has an active sink")
                    .as_write();
                self.render(out, tpl, field, Some(seed))?;
            }
        }
        Ok(())
    }

    fn render_set<'t>(
        &self,
        st: &mut RenderState<'t, '_>,
        stmt: &'t SetStatement,
    ) -> Result<(), EngineError> {
        let value = self.eval_expression(st, &stmt.expression)?;
        set_dotted(&mut st.scope, &stmt.key, value);
        Ok(())
    }

    /// Evaluates a wrapped expression to a single value. Exactly one slot
    /// must remain; an unresolved reference either errors (strict) or decays
    /// to null.
    fn eval_expression<'v>(
        &self,
        st: &'v RenderState<'_, '_>,
        wrapper: &'v ExpressionWrapper,
    ) -> Result<Value, EngineError> {
        let Some(root) = &wrapper.root else {
            return Err(render_error(st.tmpl, wrapper.pos, "empty expression"));
        };
        let mut stack: Vec<Slot<'v>> = Vec::new();
        self.eval_node(st, root, &mut stack)?;
        if stack.len() != 1 {
            return Err(render_error(st.tmpl, wrapper.pos, "malformed expression"));
        }
        match stack.pop().expect("stack length was just checked") {
            Slot::Value(value) => Ok(value.into_owned()),
            Slot::Missing(node) => {
                if self.config.strict {
                    Err(render_error(
                        st.tmpl,
                        node.pos,
                        format!("variable '{}' not found", node.name),
                    ))
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    fn eval_node<'v>(
        &self,
        st: &'v RenderState<'_, '_>,
        node: &'v ExpressionNode,
        stack: &mut Vec<Slot<'v>>,
    ) -> Result<(), EngineError> {
        match node {
            ExpressionNode::Literal(lit) => {
                stack.push(Slot::Value(Cow::Borrowed(&lit.value)));
                Ok(())
            }
            ExpressionNode::Data(data) => self.eval_data(st, data, stack),
            ExpressionNode::Function(func) => self.eval_function(st, func, stack),
        }
    }

    /// Resolves a data reference: auxiliary scope first, then user data,
    /// then a 0-arity callback of the same name. Multiple matches from array
    /// fan-out collapse into a synthesized array.
    fn eval_data<'v>(
        &self,
        st: &'v RenderState<'_, '_>,
        data: &'v DataNode,
        stack: &mut Vec<Slot<'v>>,
    ) -> Result<(), EngineError> {
        let mut found = find_pointers(&st.scope, &data.parts);
        if found.is_empty() {
            found = find_pointers(st.input, &data.parts);
        }
        if found.is_empty() {
            if let Some(entry) = self.functions.find_function(&data.name, 0)
                && entry.operation == Operation::Callback
                && let Some(callback) = &entry.callback
            {
                let value = callback(&[]);
                return self.push_checked(st, data, Some(Cow::Owned(value)), stack);
            }
            return self.push_checked(st, data, None, stack);
        }
        if found.len() == 1 {
            self.push_checked(st, data, Some(Cow::Borrowed(found[0])), stack)
        } else {
            let array = Value::Array(found.into_iter().cloned().collect());
            self.push_checked(st, data, Some(Cow::Owned(array)), stack)
        }
    }

    /// Applies the template description to a resolution result: defaults for
    /// absent values, required checks, declared-type coercion.
    fn push_checked<'v>(
        &self,
        st: &'v RenderState<'_, '_>,
        node: &'v DataNode,
        data: Option<Cow<'v, Value>>,
        stack: &mut Vec<Slot<'v>>,
    ) -> Result<(), EngineError> {
        let Some(var) = st.tmpl.desc.find_variable(&node.name) else {
            match data {
                Some(value) => stack.push(Slot::Value(value)),
                None => stack.push(Slot::Missing(node)),
            }
            return Ok(());
        };
        match data {
            None if !var.default.is_null() => {
                stack.push(Slot::Value(Cow::Borrowed(&var.default)));
            }
            None if var.required => {
                return Err(render_error(
                    st.tmpl,
                    node.pos,
                    format!("The \"{}\" variable should be set", node.name),
                ));
            }
            None => stack.push(Slot::Value(Cow::Owned(Value::Null))),
            Some(value) if var.var_type == VarType::Null => stack.push(Slot::Value(value)),
            Some(value) => {
                let converted = convert_value(var.var_type, value.as_ref())?;
                stack.push(Slot::Value(Cow::Owned(converted)));
            }
        }
        Ok(())
    }

    fn pop_value<'v>(
        &self,
        st: &RenderState<'_, '_>,
        stack: &mut Vec<Slot<'v>>,
        pos: usize,
    ) -> Result<Cow<'v, Value>, EngineError> {
        match stack.pop() {
            Some(Slot::Value(value)) => Ok(value),
            Some(Slot::Missing(node)) => {
                if self.config.strict {
                    Err(render_error(
                        st.tmpl,
                        node.pos,
                        format!("variable '{}' not found", node.name),
                    ))
                } else {
                    Ok(Cow::Owned(Value::Null))
                }
            }
            None => Err(render_error(st.tmpl, pos, "malformed expression")),
        }
    }

    /// Evaluates the first `count` arguments of `func` and pops them as
    /// values, left to right.
    fn eval_args<'v>(
        &self,
        st: &'v RenderState<'_, '_>,
        func: &'v FunctionNode,
        count: usize,
        stack: &mut Vec<Slot<'v>>,
    ) -> Result<Vec<Cow<'v, Value>>, EngineError> {
        if func.arguments.len() < count {
            return Err(render_error(
                st.tmpl,
                func.pos,
                format!(
                    "function needs {} arguments, but only found {}",
                    count,
                    func.arguments.len()
                ),
            ));
        }
        for arg in &func.arguments[..count] {
            self.eval_node(st, arg, stack)?;
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.pop_value(st, stack, func.pos)?);
        }
        values.reverse();
        Ok(values)
    }

    #[allow(clippy::too_many_lines)]
    fn eval_function<'v>(
        &self,
        st: &'v RenderState<'_, '_>,
        func: &'v FunctionNode,
        stack: &mut Vec<Slot<'v>>,
    ) -> Result<(), EngineError> {
        let pos = func.pos;
        let err = |msg: String| render_error(st.tmpl, pos, msg);
        let push = |stack: &mut Vec<Slot<'v>>, value: Value| {
            stack.push(Slot::Value(Cow::Owned(value)));
        };

        match func.operation {
            Operation::Not => {
                let args = self.eval_args(st, func, 1, stack)?;
                push(stack, json!(!truthy(&args[0])));
            }
            Operation::And | Operation::Or => {
                if func.arguments.len() < 2 {
                    return Err(err("function needs 2 arguments".into()));
                }
                self.eval_node(st, &func.arguments[0], stack)?;
                let left = truthy(self.pop_value(st, stack, pos)?.as_ref());
                // short-circuit: the right side only runs when it decides
                let result = if func.operation == Operation::And {
                    left && {
                        self.eval_node(st, &func.arguments[1], stack)?;
                        truthy(self.pop_value(st, stack, pos)?.as_ref())
                    }
                } else {
                    left || {
                        self.eval_node(st, &func.arguments[1], stack)?;
                        truthy(self.pop_value(st, stack, pos)?.as_ref())
                    }
                };
                push(stack, json!(result));
            }
            Operation::In => {
                let args = self.eval_args(st, func, 2, stack)?;
                let Value::Array(items) = args[1].as_ref() else {
                    return Err(err("the 'in' operator works only with arrays".into()));
                };
                push(stack, json!(items.contains(args[0].as_ref())));
            }
            Operation::Equal => {
                let args = self.eval_args(st, func, 2, stack)?;
                push(stack, json!(args[0].as_ref() == args[1].as_ref()));
            }
            Operation::NotEqual => {
                let args = self.eval_args(st, func, 2, stack)?;
                push(stack, json!(args[0].as_ref() != args[1].as_ref()));
            }
            Operation::Greater | Operation::GreaterEqual | Operation::Less | Operation::LessEqual => {
                let args = self.eval_args(st, func, 2, stack)?;
                let Some(ord) = compare_values(args[0].as_ref(), args[1].as_ref()) else {
                    return Err(err(format!(
                        "The '{}' operator works only with strings or numbers",
                        op_symbol(func.operation)
                    )));
                };
                let result = match func.operation {
                    Operation::Greater => ord == Ordering::Greater,
                    Operation::GreaterEqual => ord != Ordering::Less,
                    Operation::Less => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                };
                push(stack, json!(result));
            }
            Operation::Add => {
                let args = self.eval_args(st, func, 2, stack)?;
                match (args[0].as_ref(), args[1].as_ref()) {
                    (Value::String(a), Value::String(b)) => {
                        push(stack, json!(format!("{a}{b}")));
                    }
                    (a, b) => match numeric_pair(a, b) {
                        Some(NumPair::Ints(x, y)) => push(stack, json!(x + y)),
                        Some(NumPair::Floats(x, y)) => push(stack, Value::from(x + y)),
                        None => {
                            return Err(err(
                                "The '+' operator works only with strings or numbers".into(),
                            ));
                        }
                    },
                }
            }
            Operation::Subtract | Operation::Multiplication => {
                let args = self.eval_args(st, func, 2, stack)?;
                let pair = numeric_pair(args[0].as_ref(), args[1].as_ref()).ok_or_else(|| {
                    err(format!(
                        "The '{}' operator works only with numbers",
                        op_symbol(func.operation)
                    ))
                })?;
                let value = match (func.operation, pair) {
                    (Operation::Subtract, NumPair::Ints(x, y)) => json!(x - y),
                    (Operation::Subtract, NumPair::Floats(x, y)) => Value::from(x - y),
                    (_, NumPair::Ints(x, y)) => json!(x * y),
                    (_, NumPair::Floats(x, y)) => Value::from(x * y),
                };
                push(stack, value);
            }
            Operation::Division => {
                let args = self.eval_args(st, func, 2, stack)?;
                let pair = numeric_pair(args[0].as_ref(), args[1].as_ref())
                    .ok_or_else(|| err("The '/' operator works only with numbers".into()))?;
                let value = match pair {
                    NumPair::Ints(_, 0) => return Err(err("division by zero".into())),
                    NumPair::Floats(_, y) if y == 0.0 => {
                        return Err(err("division by zero".into()));
                    }
                    NumPair::Ints(x, y) => json!(x / y),
                    NumPair::Floats(x, y) => Value::from(x / y),
                };
                push(stack, value);
            }
            Operation::Power => {
                let args = self.eval_args(st, func, 2, stack)?;
                let pair = numeric_pair(args[0].as_ref(), args[1].as_ref())
                    .ok_or_else(|| err("The '^' operator works only with numbers".into()))?;
                let (x, y) = match pair {
                    NumPair::Ints(x, y) => (x as f64, y as f64),
                    NumPair::Floats(x, y) => (x, y),
                };
                push(stack, Value::from(x.powf(y)));
            }
            Operation::Modulo => {
                let args = self.eval_args(st, func, 2, stack)?;
                let (Some(x), Some(y)) = (as_int(args[0].as_ref()), as_int(args[1].as_ref()))
                else {
                    return Err(err("The '%' operator works only with integers".into()));
                };
                if y == 0 {
                    return Err(err("division by zero".into()));
                }
                push(stack, json!(x % y));
            }
            Operation::At => {
                let args = self.eval_args(st, func, 2, stack)?;
                match args[0].as_ref() {
                    Value::Object(obj) => {
                        let Some(key) = args[1].as_str() else {
                            return Err(err(
                                "the 'at' function expects a string key for objects".into(),
                            ));
                        };
                        let Some(value) = obj.get(key) else {
                            return Err(err(format!("key '{key}' not found")));
                        };
                        push(stack, value.clone());
                    }
                    Value::Array(items) => {
                        let index = as_int(args[1].as_ref()).ok_or_else(|| {
                            err("the 'at' function expects an integer index for arrays".into())
                        })?;
                        let value = usize::try_from(index)
                            .ok()
                            .and_then(|i| items.get(i))
                            .ok_or_else(|| err(format!("index {index} out of range")))?;
                        push(stack, value.clone());
                    }
                    _ => {
                        return Err(err(
                            "the 'at' function works only with arrays and objects".into(),
                        ));
                    }
                }
            }
            Operation::AtId => {
                let args = self.eval_args(st, func, 1, stack)?;
                let Some(ExpressionNode::Data(field)) = func.arguments.get(1) else {
                    return Err(err("could not find element with given name".into()));
                };
                let Some(value) = args[0].get(&field.name) else {
                    return Err(err("could not find element with given name".into()));
                };
                push(stack, value.clone());
            }
            Operation::Default => {
                if func.arguments.len() < 2 {
                    return Err(err("function needs 2 arguments".into()));
                }
                self.eval_node(st, &func.arguments[0], stack)?;
                match stack.pop() {
                    Some(Slot::Value(value)) => stack.push(Slot::Value(value)),
                    _ => {
                        // the reference was missing; yield the fallback
                        self.eval_node(st, &func.arguments[1], stack)?;
                        let value = self.pop_value(st, stack, pos)?;
                        stack.push(Slot::Value(value));
                    }
                }
            }
            Operation::DivisibleBy => {
                let args = self.eval_args(st, func, 2, stack)?;
                let (Some(x), Some(y)) = (as_int(args[0].as_ref()), as_int(args[1].as_ref()))
                else {
                    return Err(err("the 'divisibleBy' function works only with integers".into()));
                };
                push(stack, json!(y != 0 && x % y == 0));
            }
            Operation::Even => {
                let args = self.eval_args(st, func, 1, stack)?;
                let value = as_int(args[0].as_ref())
                    .ok_or_else(|| err("the 'even' function works only with integers".into()))?;
                push(stack, json!(value % 2 == 0));
            }
            Operation::Odd => {
                let args = self.eval_args(st, func, 1, stack)?;
                let value = as_int(args[0].as_ref())
                    .ok_or_else(|| err("the 'odd' function works only with integers".into()))?;
                push(stack, json!(value % 2 != 0));
            }
            Operation::Exists => {
                // probes the user-data root only, never the auxiliary scope
                let args = self.eval_args(st, func, 1, stack)?;
                let Some(name) = args[0].as_str() else {
                    return Err(err("the 'exists' function works only with strings".into()));
                };
                let pointer = dotted_to_pointer(name);
                push(stack, json!(st.input.pointer(&pointer).is_some()));
            }
            Operation::ExistsInObject => {
                let args = self.eval_args(st, func, 2, stack)?;
                let Value::Object(obj) = args[0].as_ref() else {
                    return Err(err("the 'existsIn' function works only with objects".into()));
                };
                let Some(key) = args[1].as_str() else {
                    return Err(err("the 'existsIn' function expects a string key".into()));
                };
                push(stack, json!(obj.contains_key(key)));
            }
            Operation::First | Operation::Last => {
                let name = if func.operation == Operation::First {
                    "first"
                } else {
                    "last"
                };
                let args = self.eval_args(st, func, 1, stack)?;
                let Value::Array(items) = args[0].as_ref() else {
                    return Err(err(format!("the '{name}' function works only with arrays")));
                };
                let value = if func.operation == Operation::First {
                    items.first()
                } else {
                    items.last()
                };
                let value = value.ok_or_else(|| err(format!("the '{name}' argument is empty")))?;
                push(stack, value.clone());
            }
            Operation::Float => {
                let args = self.eval_args(st, func, 1, stack)?;
                let Some(text) = args[0].as_str() else {
                    return Err(err("the 'float' function works only with strings".into()));
                };
                let value: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| err(format!("could not convert \"{text}\" to a float")))?;
                push(stack, Value::from(value));
            }
            Operation::Int => {
                let args = self.eval_args(st, func, 1, stack)?;
                let Some(text) = args[0].as_str() else {
                    return Err(err("the 'int' function works only with strings".into()));
                };
                let value: i64 = text
                    .trim()
                    .parse()
                    .map_err(|_| err(format!("could not convert \"{text}\" to an integer")))?;
                push(stack, json!(value));
            }
            Operation::Length => {
                let args = self.eval_args(st, func, 1, stack)?;
                let length = match args[0].as_ref() {
                    Value::String(s) => s.chars().count(),
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    _ => {
                        return Err(err(
                            "the 'length' function works only with arrays, objects and strings"
                                .into(),
                        ));
                    }
                };
                push(stack, json!(length));
            }
            Operation::Lower | Operation::Upper => {
                let name = if func.operation == Operation::Lower {
                    "lower"
                } else {
                    "upper"
                };
                let args = self.eval_args(st, func, 1, stack)?;
                let Some(text) = args[0].as_str() else {
                    return Err(err(format!("the '{name}' function works only with strings")));
                };
                let value = if func.operation == Operation::Lower {
                    text.to_ascii_lowercase()
                } else {
                    text.to_ascii_uppercase()
                };
                push(stack, json!(value));
            }
            Operation::Max | Operation::Min => {
                let name = if func.operation == Operation::Max {
                    "max"
                } else {
                    "min"
                };
                let args = self.eval_args(st, func, 1, stack)?;
                let Value::Array(items) = args[0].as_ref() else {
                    return Err(err(format!("the '{name}' function works only with arrays")));
                };
                let mut iter = items.iter();
                let mut best = iter
                    .next()
                    .ok_or_else(|| err(format!("the '{name}' argument is empty")))?;
                for item in iter {
                    let ord = compare_values(item, best).ok_or_else(|| {
                        err("the compare operator works only with arrays of numbers or strings"
                            .into())
                    })?;
                    let better = if func.operation == Operation::Max {
                        ord == Ordering::Greater
                    } else {
                        ord == Ordering::Less
                    };
                    if better {
                        best = item;
                    }
                }
                push(stack, best.clone());
            }
            Operation::Range => {
                let args = self.eval_args(st, func, 1, stack)?;
                let count = as_int(args[0].as_ref())
                    .ok_or_else(|| err("the 'range' function works only with integers".into()))?;
                if count < 0 {
                    return Err(err("the 'range' function expects a non-negative count".into()));
                }
                push(stack, Value::Array((0..count).map(Value::from).collect()));
            }
            Operation::Round => {
                let args = self.eval_args(st, func, 2, stack)?;
                let value = args[0]
                    .as_f64()
                    .ok_or_else(|| err("the 'round' function works only with numbers".into()))?;
                let precision = as_int(args[1].as_ref())
                    .ok_or_else(|| err("the 'round' precision must be an integer".into()))?;
                let factor = 10f64.powi(precision as i32);
                let rounded = (value * factor).round() / factor;
                if precision == 0 {
                    push(stack, json!(rounded as i64));
                } else {
                    push(stack, Value::from(rounded));
                }
            }
            Operation::Sort => {
                let args = self.eval_args(st, func, 1, stack)?;
                let Value::Array(items) = args[0].as_ref() else {
                    return Err(err("the 'sort' function works only with arrays".into()));
                };
                let mut items = items.clone();
                if items.len() > 1 {
                    let comparable = items.iter().all(Value::is_number)
                        || items.iter().all(Value::is_string);
                    if !comparable {
                        return Err(err(
                            "the compare operator works only with arrays of numbers or strings"
                                .into(),
                        ));
                    }
                }
                items.sort_by(|a, b| compare_values(a, b).unwrap_or(Ordering::Equal));
                push(stack, Value::Array(items));
            }
            Operation::IsBoolean => {
                let args = self.eval_args(st, func, 1, stack)?;
                push(stack, json!(args[0].is_boolean()));
            }
            Operation::IsNumber => {
                let args = self.eval_args(st, func, 1, stack)?;
                push(stack, json!(args[0].is_number()));
            }
            Operation::IsInteger => {
                let args = self.eval_args(st, func, 1, stack)?;
                push(stack, json!(args[0].is_i64() || args[0].is_u64()));
            }
            Operation::IsFloat => {
                let args = self.eval_args(st, func, 1, stack)?;
                push(stack, json!(args[0].is_f64()));
            }
            Operation::IsObject => {
                let args = self.eval_args(st, func, 1, stack)?;
                push(stack, json!(args[0].is_object()));
            }
            Operation::IsArray => {
                let args = self.eval_args(st, func, 1, stack)?;
                push(stack, json!(args[0].is_array()));
            }
            Operation::IsString => {
                let args = self.eval_args(st, func, 1, stack)?;
                push(stack, json!(args[0].is_string()));
            }
            Operation::Join => {
                let args = self.eval_args(st, func, 2, stack)?;
                let Value::Array(items) = args[0].as_ref() else {
                    return Err(err("the 'join' function works only with arrays".into()));
                };
                let Some(separator) = args[1].as_str() else {
                    return Err(err("the 'join' separator must be a string".into()));
                };
                let joined = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => serde_json::to_string(other).unwrap_or_default(),
                    })
                    .join(separator);
                push(stack, json!(joined));
            }
            Operation::Split => {
                let args = self.eval_args(st, func, 2, stack)?;
                let Some(text) = args[0].as_str() else {
                    return Err(err("the 'split' function works only with strings".into()));
                };
                let Some(delimiter) = args[1].as_str() else {
                    return Err(err("the 'split' delimiter must be a string".into()));
                };
                if delimiter.is_empty() {
                    return Err(err("the 'split' delimiter must not be empty".into()));
                }
                let parts: Vec<Value> = text.split(delimiter).map(Value::from).collect();
                push(stack, Value::Array(parts));
            }
            Operation::Callback => {
                let args = self.eval_args(st, func, func.arguments.len(), stack)?;
                let Some(callback) = &func.callback else {
                    return Err(err(format!("function '{}' has no implementation", func.name)));
                };
                let owned: Vec<Value> = args.into_iter().map(Cow::into_owned).collect();
                push(stack, callback(&owned));
            }
        }
        Ok(())
    }
}
