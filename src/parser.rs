use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{
    BlockStatement, Expression, FunctionLiteral, InfixOperator, PrefixOperator, Program, Statement,
};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

type Result<T> = std::result::Result<T, ParserError>;

type PrefixParseFn<'a> = fn(&mut Parser<'a>) -> Result<Expression>;
type InfixParseFn<'a> = fn(&mut Parser<'a>, Expression) -> Result<Expression>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParserError {
    #[error("expected next token to be {expected}, got {got} instead")]
    ExpectedToken { expected: TokenKind, got: TokenKind },
    #[error("no prefix parse function for {0} found")]
    NoPrefixParseFn(TokenKind),
    #[error("no infix parse function for {0} found")]
    NoInfixParseFn(TokenKind),
    #[error("could not parse {0} as integer")]
    InvalidInteger(String),
}

/// Binding power of operators, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    /// == or !=
    Equals,
    /// > or <
    LessGreater,
    /// + or -
    Sum,
    /// * or /
    Product,
    /// -X or !X
    Prefix,
    /// myFunction(X)
    Call,
    /// array[index]
    Index,
}

impl Precedence {
    fn of(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
            TokenKind::Lt | TokenKind::Gt => Precedence::LessGreater,
            TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
            TokenKind::Asterisk | TokenKind::Slash => Precedence::Product,
            TokenKind::LParen => Precedence::Call,
            TokenKind::LBracket => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }
}

/// Pratt parser over a [`Lexer`].
///
/// Errors are collected rather than returned: a malformed statement is
/// recorded, skipped, and parsing carries on with the next one.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur_token: Token,
    peek_token: Token,
    errors: Vec<ParserError>,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        let mut p = Parser {
            lexer,
            cur_token: Token::Eof,
            peek_token: Token::Eof,
            errors: vec![],
        };

        // Read 2 tokens so that cur_token and peek_token are both initialised
        p.next_token();
        p.next_token();

        p
    }

    pub fn errors(&self) -> &[ParserError] {
        &self.errors
    }

    pub fn next_token(&mut self) {
        self.cur_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token());
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = vec![];

        while self.cur_token != Token::Eof {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.record(err);
                    self.synchronize();
                }
            }
            self.next_token();
        }

        debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );

        Program { statements }
    }

    fn record(&mut self, err: ParserError) {
        trace!(%err, "syntax error");
        self.errors.push(err);
    }

    /// Skips the remainder of a malformed statement. Stops on its `;`, or just
    /// before the `}` that closes the enclosing block. Nested braces are
    /// skipped whole.
    ///
    /// Returns true when the current token is already that closing `}`.
    fn synchronize(&mut self) -> bool {
        let mut depth = 0usize;

        loop {
            match self.cur_token {
                Token::Eof => return false,
                Token::SemiColon if depth == 0 => return false,
                Token::LBrace => depth += 1,
                Token::RBrace if depth == 0 => return true,
                Token::RBrace => depth -= 1,
                _ => {}
            }

            if depth == 0 && self.peek_token == Token::RBrace {
                return false;
            }

            self.next_token();
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.cur_token {
            Token::Let => self.parse_let_statement(),
            Token::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Result<Statement> {
        let name;

        if let Token::Ident(ident) = &self.peek_token {
            name = ident.clone();
            self.next_token();
        } else {
            return Err(self.peek_error(TokenKind::Ident));
        }

        self.expect_peek(TokenKind::Assign)?;
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();

        Ok(Statement::Let(name, value))
    }

    fn parse_return_statement(&mut self) -> Result<Statement> {
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();

        Ok(Statement::Return(value))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement> {
        let exp = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();

        Ok(Statement::Expression(exp))
    }

    /// Parses statements up to the closing `}` (or end of input). Expects the
    /// current token to be the opening `{` and leaves the closing one current.
    fn parse_block_statement(&mut self) -> BlockStatement {
        let mut statements = vec![];

        self.next_token();

        while self.cur_token != Token::RBrace && self.cur_token != Token::Eof {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.record(err);
                    if self.synchronize() {
                        break;
                    }
                }
            }
            self.next_token();
        }

        BlockStatement { statements }
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression> {
        let prefix = Self::prefix_parse_fn(self.cur_token.kind())
            .ok_or_else(|| ParserError::NoPrefixParseFn(self.cur_token.kind()))?;

        let mut left = prefix(self)?;

        while self.peek_token != Token::SemiColon && precedence < self.peek_precedence() {
            let infix = match Self::infix_parse_fn(self.peek_token.kind()) {
                Some(infix) => infix,
                None => return Ok(left),
            };

            self.next_token();
            left = infix(self, left)?;
        }

        Ok(left)
    }

    fn prefix_parse_fn(kind: TokenKind) -> Option<PrefixParseFn<'a>> {
        let f: PrefixParseFn<'a> = match kind {
            TokenKind::Ident => Self::parse_identifier,
            TokenKind::Int => Self::parse_integer_literal,
            TokenKind::String => Self::parse_string_literal,
            TokenKind::True | TokenKind::False => Self::parse_boolean,
            TokenKind::Bang | TokenKind::Minus => Self::parse_prefix_expression,
            TokenKind::LParen => Self::parse_grouped_expression,
            TokenKind::If => Self::parse_if_expression,
            TokenKind::Function => Self::parse_function_literal,
            TokenKind::LBracket => Self::parse_array_literal,
            _ => return None,
        };
        Some(f)
    }

    fn infix_parse_fn(kind: TokenKind) -> Option<InfixParseFn<'a>> {
        let f: InfixParseFn<'a> = match kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Asterisk
            | TokenKind::Slash
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::Eq
            | TokenKind::NotEq => Self::parse_infix_expression,
            TokenKind::LParen => Self::parse_call_expression,
            TokenKind::LBracket => Self::parse_index_expression,
            _ => return None,
        };
        Some(f)
    }

    fn parse_identifier(&mut self) -> Result<Expression> {
        match &self.cur_token {
            Token::Ident(name) => Ok(Expression::Identifier(name.clone())),
            other => Err(ParserError::NoPrefixParseFn(other.kind())),
        }
    }

    fn parse_integer_literal(&mut self) -> Result<Expression> {
        let digits = self.cur_token.literal();

        digits
            .parse()
            .map(Expression::IntegerLiteral)
            .map_err(|_| ParserError::InvalidInteger(digits))
    }

    fn parse_string_literal(&mut self) -> Result<Expression> {
        Ok(Expression::StringLiteral(self.cur_token.literal()))
    }

    fn parse_boolean(&mut self) -> Result<Expression> {
        Ok(Expression::Boolean(self.cur_token == Token::True))
    }

    fn parse_prefix_expression(&mut self) -> Result<Expression> {
        let operator = match self.cur_token {
            Token::Bang => PrefixOperator::Bang,
            Token::Minus => PrefixOperator::Minus,
            ref other => return Err(ParserError::NoPrefixParseFn(other.kind())),
        };

        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;

        Ok(Expression::Prefix(operator, Box::new(right)))
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Result<Expression> {
        let operator = match self.cur_token {
            Token::Plus => InfixOperator::Plus,
            Token::Minus => InfixOperator::Minus,
            Token::Asterisk => InfixOperator::Asterisk,
            Token::Slash => InfixOperator::Slash,
            Token::Lt => InfixOperator::Lt,
            Token::Gt => InfixOperator::Gt,
            Token::Eq => InfixOperator::Eq,
            Token::NotEq => InfixOperator::NotEq,
            ref other => return Err(ParserError::NoInfixParseFn(other.kind())),
        };

        let precedence = self.cur_precedence();
        self.next_token();
        let right = self.parse_expression(precedence)?;

        Ok(Expression::Infix(operator, Box::new(left), Box::new(right)))
    }

    fn parse_grouped_expression(&mut self) -> Result<Expression> {
        self.next_token();

        let exp = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;

        Ok(exp)
    }

    fn parse_if_expression(&mut self) -> Result<Expression> {
        self.expect_peek(TokenKind::LParen)?;
        self.next_token();

        let condition = self.parse_expression(Precedence::Lowest)?;

        self.expect_peek(TokenKind::RParen)?;
        self.expect_peek(TokenKind::LBrace)?;

        let consequence = self.parse_block_statement();

        let alternative = if self.peek_token == Token::Else {
            self.next_token();
            self.expect_peek(TokenKind::LBrace)?;
            Some(self.parse_block_statement())
        } else {
            None
        };

        Ok(Expression::If(Box::new(condition), consequence, alternative))
    }

    fn parse_function_literal(&mut self) -> Result<Expression> {
        self.expect_peek(TokenKind::LParen)?;

        let parameters = self.parse_list(TokenKind::RParen, Self::parse_parameter)?;

        self.expect_peek(TokenKind::LBrace)?;

        let body = self.parse_block_statement();

        Ok(Expression::Function(Rc::new(FunctionLiteral {
            parameters,
            body,
        })))
    }

    fn parse_parameter(&mut self) -> Result<String> {
        match &self.cur_token {
            Token::Ident(name) => Ok(name.clone()),
            other => Err(ParserError::ExpectedToken {
                expected: TokenKind::Ident,
                got: other.kind(),
            }),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression> {
        let elements = self.parse_list(TokenKind::RBracket, Self::parse_list_element)?;

        Ok(Expression::Array(elements))
    }

    fn parse_call_expression(&mut self, function: Expression) -> Result<Expression> {
        let arguments = self.parse_list(TokenKind::RParen, Self::parse_list_element)?;

        Ok(Expression::Call(Box::new(function), arguments))
    }

    fn parse_index_expression(&mut self, left: Expression) -> Result<Expression> {
        self.next_token();

        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RBracket)?;

        Ok(Expression::Index(Box::new(left), Box::new(index)))
    }

    fn parse_list_element(&mut self) -> Result<Expression> {
        self.parse_expression(Precedence::Lowest)
    }

    /// Parses a comma separated, possibly empty, list whose opening delimiter
    /// is the current token, through to the `end` delimiter.
    fn parse_list<T>(
        &mut self,
        end: TokenKind,
        parse_item: fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = vec![];

        if self.peek_token.kind() == end {
            self.next_token();
            return Ok(items);
        }

        self.next_token();
        items.push(parse_item(self)?);

        while self.peek_token == Token::Comma {
            self.next_token();
            self.next_token();
            items.push(parse_item(self)?);
        }

        self.expect_peek(end)?;

        Ok(items)
    }

    fn skip_optional_semicolon(&mut self) {
        if self.peek_token == Token::SemiColon {
            self.next_token();
        }
    }

    fn peek_precedence(&self) -> Precedence {
        Precedence::of(self.peek_token.kind())
    }

    fn cur_precedence(&self) -> Precedence {
        Precedence::of(self.cur_token.kind())
    }

    fn peek_error(&self, expected: TokenKind) -> ParserError {
        ParserError::ExpectedToken {
            expected,
            got: self.peek_token.kind(),
        }
    }

    fn expect_peek(&mut self, expected: TokenKind) -> Result<()> {
        if self.peek_token.kind() != expected {
            return Err(self.peek_error(expected));
        }

        self.next_token();
        Ok(())
    }
}
