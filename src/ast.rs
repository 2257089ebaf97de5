//! Syntax tree produced by the parser and walked by the evaluator.
//!
//! Every node implements `Display`, rendering source text that parses back to
//! an equal tree. Infix, prefix and index expressions are fully parenthesised.

use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expression {
    Identifier(String),
    IntegerLiteral(i64),
    Boolean(bool),
    StringLiteral(String),
    Array(Vec<Expression>),
    Prefix(PrefixOperator, Box<Expression>),
    Infix(InfixOperator, Box<Expression>, Box<Expression>),
    /// condition, consequence, alternative
    If(Box<Expression>, BlockStatement, Option<BlockStatement>),
    /// Shared so that function values outlive the program they were parsed from.
    Function(Rc<FunctionLiteral>),
    /// callee, arguments
    Call(Box<Expression>, Vec<Expression>),
    /// collection, index
    Index(Box<Expression>, Box<Expression>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrefixOperator {
    Bang,
    Minus,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InfixOperator {
    Plus,
    Minus,
    Asterisk,
    Slash,
    Lt,
    Gt,
    Eq,
    NotEq,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FunctionLiteral {
    pub parameters: Vec<String>,
    pub body: BlockStatement,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Statement {
    Let(String, Expression),
    Return(Expression),
    Expression(Expression),
    Block(BlockStatement),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrefixOperator::Bang => write!(f, "!"),
            PrefixOperator::Minus => write!(f, "-"),
        }
    }
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = match self {
            InfixOperator::Plus => "+",
            InfixOperator::Minus => "-",
            InfixOperator::Asterisk => "*",
            InfixOperator::Slash => "/",
            InfixOperator::Lt => "<",
            InfixOperator::Gt => ">",
            InfixOperator::Eq => "==",
            InfixOperator::NotEq => "!=",
        };
        write!(f, "{}", op)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::IntegerLiteral(v) => write!(f, "{}", v),
            Expression::Boolean(b) => write!(f, "{}", b),
            Expression::StringLiteral(s) => write!(f, "\"{}\"", s),
            Expression::Array(elements) => {
                write!(f, "[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
            Expression::Prefix(operator, right) => write!(f, "({}{})", operator, right),
            Expression::Infix(operator, left, right) => {
                write!(f, "({} {} {})", left, operator, right)
            }
            Expression::If(condition, consequence, alternative) => {
                write!(f, "if ({}) {}", condition, consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, " else {}", alternative)?;
                }
                Ok(())
            }
            Expression::Function(literal) => write!(f, "{}", literal),
            Expression::Call(function, arguments) => {
                write!(f, "{}(", function)?;
                write_list(f, arguments)?;
                write!(f, ")")
            }
            Expression::Index(left, index) => write!(f, "({}[{}])", left, index),
        }
    }
}

impl fmt::Display for FunctionLiteral {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "fn(")?;
        write_list(f, &self.parameters)?;
        write!(f, ") {}", self.body)
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.statements.is_empty() {
            return write!(f, "{{ }}");
        }

        write!(f, "{{ ")?;
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", stmt)?;
        }
        write!(f, " }}")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Statement::Let(name, value) => write!(f, "let {} = {}", name, value),
            Statement::Return(value) => write!(f, "return {}", value),
            Statement::Expression(exp) => write!(f, "{}", exp),
            Statement::Block(block) => write!(f, "{}", block),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{};", stmt)?;
        }
        Ok(())
    }
}
