use crate::ast::{FunctionLiteral, InfixOperator, PrefixOperator};
pub use crate::object::builtins::{Builtin, Builtins};
pub use crate::object::environment::{Environment, ScopeId, ScopeRef};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

pub mod builtins;
pub mod environment;

pub const TRUE: Object = Object::Boolean(true);
pub const FALSE: Object = Object::Boolean(false);
pub const NULL: Object = Object::Null;

#[derive(Clone, Debug)]
pub enum Object {
    Null,
    Integer(i64),
    Boolean(bool),
    String(String),
    /// Arrays are never mutated in place; builtins that "change" one return a new array.
    Array(Rc<Vec<Object>>),
    /// A `return` unwinding towards the nearest function call. Never escapes evaluation.
    Return(Box<Object>),
    Function(Closure),
    BuiltIn(Builtin),
    Error(String),
}

/// A function value: the literal it was created from and the scope it closed over.
#[derive(Clone, Debug)]
pub struct Closure {
    pub literal: Rc<FunctionLiteral>,
    pub scope: ScopeRef,
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Integer(v) => write!(f, "{}", v),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::String(s) => write!(f, "{}", s),
            Object::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Object::Return(obj) => write!(f, "{}", obj),
            Object::Function(closure) => write!(f, "{}", closure.literal),
            Object::BuiltIn(_) => write!(f, "builtin function"),
            Object::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Equality as seen by `==` and `!=` in Monkey.
///
/// Scalars and null compare by value and arrays element-wise. Functions are
/// only equal to themselves: the same literal closed over the same scope.
/// Values of different types are never equal.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Return(a), Object::Return(b)) => a == b,
            (Object::Function(a), Object::Function(b)) => {
                Rc::ptr_eq(&a.literal, &b.literal) && a.scope == b.scope
            }
            (Object::BuiltIn(a), Object::BuiltIn(b)) => a.name == b.name,
            (Object::Error(a), Object::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl Object {
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Null => false,
            Object::Boolean(b) => *b,
            _ => true,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Boolean(_) => "BOOLEAN",
            Object::Integer(_) => "INTEGER",
            Object::Null => "NULL",
            Object::String(_) => "STRING",
            Object::Array(_) => "ARRAY",
            Object::Return(_) => "RETURN_VALUE",
            Object::Function(_) => "FUNCTION",
            Object::BuiltIn(_) => "BUILTIN",
            Object::Error(_) => "ERROR",
        }
    }

    pub fn from_bool(b: bool) -> Object {
        if b {
            TRUE
        } else {
            FALSE
        }
    }
}

impl From<Vec<Object>> for Object {
    fn from(elements: Vec<Object>) -> Self {
        Object::Array(Rc::new(elements))
    }
}

pub type EvalResult = std::result::Result<Object, EvalError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("identifier not found: {0}")]
    IdentifierNotFound(String),
    #[error("not a function: {0}")]
    NotCallable(&'static str),
    #[error("unknown operator: {left} {operator} {right}")]
    UnsupportedInfixOperator {
        operator: InfixOperator,
        left: &'static str,
        right: &'static str,
    },
    #[error("unknown operator: {operator}{operand}")]
    UnsupportedPrefixOperator {
        operator: PrefixOperator,
        operand: &'static str,
    },
    #[error("index operator not supported: {0}")]
    UnsupportedIndex(&'static str),
    #[error("index out of bounds")]
    IndexOutOfBounds,
    #[error("division by zero")]
    DivisionByZero,
    #[error("wrong number of arguments. got={got}, want={want}")]
    WrongArgumentCount { got: usize, want: usize },
    #[error("argument to `{function}` not supported, got {got}")]
    UnsupportedArgument {
        function: &'static str,
        got: &'static str,
    },
    #[error("argument to `{function}` must be ARRAY, got {got}")]
    ExpectedArray {
        function: &'static str,
        got: &'static str,
    },
    #[error("could not write output: {0}")]
    Output(String),
}
