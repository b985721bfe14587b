//! FILENAME: core/measure-parser/src/lexer.rs
//! PURPOSE: Scans a raw measure formula and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. It handles
//! whitespace skipping, number parsing (with exponents), identifiers and
//! the two-character coalescing operator `||`.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / % ^ ( ) ,
//! - Multi char: ||

use crate::token::Token;
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
        }
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.input.next() {
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('*') => Token::Asterisk,
            Some('/') => Token::Slash,
            Some('%') => Token::Percent,
            Some('^') => Token::Caret,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some(',') => Token::Comma,

            // A lone '|' has no meaning
            Some('|') => match self.input.peek() {
                Some('|') => {
                    self.input.next();
                    Token::DoublePipe
                }
                _ => Token::Illegal('|'),
            },

            // Handle Numbers (starts with digit or dot)
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.read_number(ch),

            // Handle Identifiers (starts with letter or underscore)
            Some(ch) if is_identifier_start(ch) => self.read_identifier(ch),

            // End of input
            None => Token::EOF,

            // Unknown character
            Some(ch) => Token::Illegal(ch),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.input.next();
        }
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut has_dot = first_char == '.';
        let mut has_exponent = false;

        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.input.next();
            } else if ch == '.' && !has_dot && !has_exponent {
                has_dot = true;
                number_str.push(ch);
                self.input.next();
            } else if (ch == 'e' || ch == 'E') && !has_exponent {
                has_exponent = true;
                number_str.push(ch);
                self.input.next();
                if let Some(&sign) = self.input.peek() {
                    if sign == '+' || sign == '-' {
                        number_str.push(sign);
                        self.input.next();
                    }
                }
            } else {
                break;
            }
        }

        match number_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            // e.g. just "." or "1e"
            Err(_) => Token::Illegal(first_char),
        }
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);

        while let Some(&ch) = self.input.peek() {
            if is_identifier_start(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        Token::Identifier(ident)
    }
}

/// Returns true if `ch` can start an identifier.
fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
