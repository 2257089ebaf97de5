//! A tree-walking interpreter for the Monkey programming language.
//!
//! Source text goes through [`lexer::Lexer`], [`parser::Parser`] and
//! [`evaluator::Evaluator`]. Most callers only need [`parse`] and [`evaluate`]:
//!
//! ```
//! use monkey_interpreter::{evaluate, parse, object::Environment};
//!
//! let (program, errors) = parse("let add = fn(a, b) { a + b }; add(1, 2)");
//! assert!(errors.is_empty());
//!
//! let mut env = Environment::new();
//! assert_eq!(evaluate(&program, &mut env).to_string(), "3");
//! ```

pub mod ast;
pub mod evaluator;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod repl;
pub mod token;

use crate::ast::Program;
use crate::lexer::Lexer;
use crate::object::{Environment, Object};
use crate::parser::Parser;

/// Parses `source` into a program and the syntax errors met along the way.
///
/// A program that comes with errors may be missing statements and should not
/// be evaluated.
pub fn parse(source: &str) -> (Program, Vec<String>) {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    let errors = parser.errors().iter().map(|e| e.to_string()).collect();

    (program, errors)
}

/// Evaluates `program` in the root scope of `env`.
///
/// Evaluation errors come back as [`Object::Error`]. `env` keeps the bindings
/// made by the program so it can be reused for the next one.
pub fn evaluate(program: &Program, env: &mut Environment) -> Object {
    match evaluator::eval(program, env) {
        Ok(obj) => obj,
        Err(err) => Object::Error(err.to_string()),
    }
}
