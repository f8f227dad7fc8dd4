//! The function registry: built-in operators, built-in named functions and
//! user-registered callbacks.
//!
//! Operators carry a fixed (arity, precedence, associativity) triple consumed
//! by the expression parser. Named functions and callbacks are keyed by
//! `(name, arity)`; an arity of `-1` marks a variadic entry used as a
//! fallback when no exact-arity entry exists.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// A user-registered function: receives the evaluated arguments, returns a
/// JSON value.
pub type Callback = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

pub const VARIADIC: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // operators
    Not,
    And,
    Or,
    In,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Add,
    Subtract,
    Multiplication,
    Division,
    Power,
    Modulo,
    AtId,
    // named functions
    At,
    Default,
    DivisibleBy,
    Even,
    Exists,
    ExistsInObject,
    First,
    Float,
    Int,
    Last,
    Length,
    Lower,
    Max,
    Min,
    Odd,
    Range,
    Round,
    Sort,
    Upper,
    IsBoolean,
    IsNumber,
    IsInteger,
    IsFloat,
    IsObject,
    IsArray,
    IsString,
    Join,
    Split,
    // user function
    Callback,
}

impl Operation {
    /// `(arity, precedence, associativity)` for operator forms; `None` for
    /// named functions.
    pub fn operator_info(self) -> Option<(i32, u8, Associativity)> {
        use Associativity::{Left, Right};
        match self {
            Operation::Not => Some((1, 4, Left)),
            Operation::And | Operation::Or => Some((2, 1, Left)),
            Operation::In
            | Operation::Equal
            | Operation::NotEqual
            | Operation::Greater
            | Operation::GreaterEqual
            | Operation::Less
            | Operation::LessEqual => Some((2, 2, Left)),
            Operation::Add | Operation::Subtract => Some((2, 3, Left)),
            Operation::Multiplication | Operation::Division | Operation::Modulo => {
                Some((2, 4, Left))
            }
            Operation::Power => Some((2, 5, Right)),
            Operation::AtId => Some((2, 8, Left)),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct FunctionData {
    pub operation: Operation,
    pub callback: Option<Callback>,
}

impl FunctionData {
    fn builtin(operation: Operation) -> Self {
        FunctionData {
            operation,
            callback: None,
        }
    }
}

impl std::fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionData")
            .field("operation", &self.operation)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Registry of callable functions, keyed by name and arity.
#[derive(Debug)]
pub struct FunctionStorage {
    functions: HashMap<String, HashMap<i32, FunctionData>>,
}

impl FunctionStorage {
    pub fn new() -> Self {
        FunctionStorage {
            functions: HashMap::new(),
        }
    }

    fn add_builtin(&mut self, name: &str, arity: i32, operation: Operation) {
        self.functions
            .entry(name.to_string())
            .or_default()
            .insert(arity, FunctionData::builtin(operation));
    }

    /// Registers a user callback under `(name, arity)`; pass [`VARIADIC`] for
    /// an any-arity entry.
    pub fn add_callback(&mut self, name: &str, arity: i32, callback: Callback) {
        self.functions.entry(name.to_string()).or_default().insert(
            arity,
            FunctionData {
                operation: Operation::Callback,
                callback: Some(callback),
            },
        );
    }

    /// Exact-arity match preferred, variadic fallback otherwise.
    pub fn find_function(&self, name: &str, arity: i32) -> Option<&FunctionData> {
        let by_arity = self.functions.get(name)?;
        by_arity.get(&arity).or_else(|| by_arity.get(&VARIADIC))
    }
}

impl Default for FunctionStorage {
    /// A registry populated with all built-in functions.
    fn default() -> Self {
        let mut storage = Self::new();
        storage.add_builtin("at", 2, Operation::At);
        storage.add_builtin("default", 2, Operation::Default);
        storage.add_builtin("divisibleBy", 2, Operation::DivisibleBy);
        storage.add_builtin("even", 1, Operation::Even);
        storage.add_builtin("exists", 1, Operation::Exists);
        storage.add_builtin("existsIn", 2, Operation::ExistsInObject);
        storage.add_builtin("first", 1, Operation::First);
        storage.add_builtin("float", 1, Operation::Float);
        storage.add_builtin("int", 1, Operation::Int);
        storage.add_builtin("last", 1, Operation::Last);
        storage.add_builtin("length", 1, Operation::Length);
        storage.add_builtin("lower", 1, Operation::Lower);
        storage.add_builtin("max", 1, Operation::Max);
        storage.add_builtin("min", 1, Operation::Min);
        storage.add_builtin("odd", 1, Operation::Odd);
        storage.add_builtin("range", 1, Operation::Range);
        storage.add_builtin("round", 2, Operation::Round);
        storage.add_builtin("sort", 1, Operation::Sort);
        storage.add_builtin("upper", 1, Operation::Upper);
        storage.add_builtin("isBoolean", 1, Operation::IsBoolean);
        storage.add_builtin("isNumber", 1, Operation::IsNumber);
        storage.add_builtin("isInteger", 1, Operation::IsInteger);
        storage.add_builtin("isFloat", 1, Operation::IsFloat);
        storage.add_builtin("isObject", 1, Operation::IsObject);
        storage.add_builtin("isArray", 1, Operation::IsArray);
        storage.add_builtin("isString", 1, Operation::IsString);
        storage.add_builtin("join", 2, Operation::Join);
        storage.add_builtin("split", 2, Operation::Split);
        storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_resolve_by_name_and_arity() {
        let storage = FunctionStorage::default();
        let found = storage.find_function("round", 2).unwrap();
        assert_eq!(found.operation, Operation::Round);
        assert!(storage.find_function("round", 3).is_none());
        assert!(storage.find_function("no-such-fn", 1).is_none());
    }

    #[test]
    fn variadic_callback_is_a_fallback() {
        let mut storage = FunctionStorage::default();
        storage.add_callback("pick", VARIADIC, Arc::new(|args| args[0].clone()));
        storage.add_callback("pick", 2, Arc::new(|args| args[1].clone()));

        let exact = storage.find_function("pick", 2).unwrap();
        let args = [json!(1), json!(2)];
        assert_eq!((exact.callback.as_ref().unwrap())(&args), json!(2));

        let fallback = storage.find_function("pick", 5).unwrap();
        assert_eq!((fallback.callback.as_ref().unwrap())(&args), json!(1));
    }

    #[test]
    fn operator_table_matches_the_documented_precedences() {
        use Associativity::{Left, Right};
        assert_eq!(Operation::And.operator_info(), Some((2, 1, Left)));
        assert_eq!(Operation::Equal.operator_info(), Some((2, 2, Left)));
        assert_eq!(Operation::Add.operator_info(), Some((2, 3, Left)));
        assert_eq!(Operation::Not.operator_info(), Some((1, 4, Left)));
        assert_eq!(Operation::Division.operator_info(), Some((2, 4, Left)));
        assert_eq!(Operation::Power.operator_info(), Some((2, 5, Right)));
        assert_eq!(Operation::AtId.operator_info(), Some((2, 8, Left)));
        assert_eq!(Operation::Length.operator_info(), None);
    }
}
