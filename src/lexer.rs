use std::iter::Peekable;
use std::str::Chars;

use crate::token;
use crate::token::Token;

/// Lexer turns source text into tokens on demand.
///
/// Once the input is exhausted `next_token` keeps returning [`Token::Eof`].
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            input: input.chars().peekable(),
            finished: false,
        }
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    /// Consumes the next character if it satisfies the predicate.
    fn next_if<F>(&mut self, predicate: F) -> Option<char>
    where
        F: FnOnce(char) -> bool,
    {
        self.input.next_if(|&c| predicate(c))
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut ident = String::new();
        ident.push(first);

        while let Some(c) = self.next_if(is_letter) {
            ident.push(c);
        }

        ident
    }

    fn read_number(&mut self, first: char) -> String {
        let mut number = String::new();
        number.push(first);

        while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
            number.push(c);
        }

        number
    }

    fn read_string(&mut self) -> String {
        let mut res = String::new();

        while let Some(c) = self.next_if(|c| c != '"') {
            res.push(c);
        }

        // Consume the closing '"', if there is one.
        self.read_char();

        res
    }

    fn skip_whitespace(&mut self) {
        while self.next_if(|c| matches!(c, ' ' | '\t' | '\r' | '\n')).is_some() {}
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.read_char() {
            Some('=') => {
                if let Some('=') = self.peek_char() {
                    self.read_char();
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            Some('+') => Token::Plus,
            Some('!') => {
                if let Some('=') = self.peek_char() {
                    self.read_char();
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            Some('-') => Token::Minus,
            Some('*') => Token::Asterisk,
            Some('/') => Token::Slash,
            Some('<') => Token::Lt,
            Some('>') => Token::Gt,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some('{') => Token::LBrace,
            Some('}') => Token::RBrace,
            Some('[') => Token::LBracket,
            Some(']') => Token::RBracket,
            Some(',') => Token::Comma,
            Some(';') => Token::SemiColon,
            Some('"') => Token::String(self.read_string()),
            Some(c) => {
                if is_letter(c) {
                    token::lookup_ident(&self.read_identifier(c))
                } else if c.is_ascii_digit() {
                    Token::Int(self.read_number(c))
                } else {
                    Token::Illegal(c)
                }
            }
            None => Token::Eof,
        }
    }
}

/// Yields every token up to and including the first [`Token::Eof`].
impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }

        let token = self.next_token();
        if token == Token::Eof {
            self.finished = true;
        }

        Some(token)
    }
}

fn is_letter(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_uppercase() || c == '_'
}
