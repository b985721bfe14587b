//! FILENAME: core/measure-parser/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into an AST.
//! CONTEXT: This is the second stage of the parsing pipeline. It takes tokens
//! from the Lexer and builds an Expression tree that can be compiled.
//!
//! GRAMMAR:
//!   expression     --> additive
//!   additive       --> multiplicative ( ("+" | "-" | "||") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/" | "%") unary )*
//!   unary          --> ("-" | "+") unary | power
//!   power          --> primary ( "^" unary )?
//!   primary        --> NUMBER | IDENTIFIER | function_call | "(" expression ")"
//!   function_call  --> IDENTIFIER "(" arguments? ")"
//!   arguments      --> expression ("," expression)*

use crate::ast::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator};
use crate::lexer::Lexer;
use crate::token::Token;

/// Parser errors with descriptive messages.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// The Parser struct holds the lexer and current token state.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
        }
    }

    /// Parses the entire input and returns the AST.
    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::EOF {
            return Err(ParseError::new("Empty expression"));
        }

        let expr = self.parse_expression()?;

        // Ensure we consumed all tokens
        if self.current_token != Token::EOF {
            return Err(ParseError::new(format!(
                "Unexpected token after expression: {}",
                self.current_token
            )));
        }

        Ok(expr)
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Checks if the current token matches the expected token.
    /// If it matches, advances and returns Ok. Otherwise returns an error.
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "Expected {}, found {}",
                expected, self.current_token
            )))
        }
    }

    /// Entry point for expression parsing.
    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_additive()
    }

    /// Parses additive expressions (+, - and the coalescing ||).
    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => Some(BinaryOperator::Add),
                Token::Minus => Some(BinaryOperator::Subtract),
                Token::DoublePipe => None,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;

            left = match op {
                Some(op) => Expression::BinaryOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                None => Expression::Coalesce {
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    /// Parses multiplicative expressions (*, / and %).
    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Asterisk => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;

            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parses unary expressions. A leading '+' is accepted and dropped.
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        match self.current_token {
            Token::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expression::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    /// Parses power/exponentiation expressions (^).
    fn parse_power(&mut self) -> ParseResult<Expression> {
        let left = self.parse_primary()?;

        if self.current_token == Token::Caret {
            self.advance();
            let right = self.parse_unary()?;

            return Ok(Expression::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Power,
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    /// Parses primary expressions (literals, measure references, function calls, parentheses).
    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current_token.clone() {
            // Literals must print back as numbers, so overflowing ones are rejected
            Token::Number(n) if !n.is_finite() => {
                Err(ParseError::new(format!("Number literal out of range: {}", n)))
            }
            Token::Number(n) => {
                self.advance();
                Ok(Expression::Number(n))
            }

            // Identifier: a function call when followed by '(', otherwise a measure
            Token::Identifier(name) => {
                self.advance();

                if self.current_token == Token::LParen {
                    return self.parse_function_call(name);
                }

                Ok(Expression::Variable(name))
            }

            // Parenthesized expression
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            // Error cases
            Token::EOF => Err(ParseError::new("Unexpected end of expression")),

            Token::Illegal(ch) => Err(ParseError::new(format!("Illegal character: {}", ch))),

            token => Err(ParseError::new(format!("Unexpected token: {}", token))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> ParseResult<Expression> {
        let function = BuiltinFunction::from_name(&name)
            .ok_or_else(|| ParseError::new(format!("Unknown function: {}", name)))?;

        // Consume the '('
        self.advance();

        let mut args = Vec::new();

        if self.current_token != Token::RParen {
            args.push(self.parse_expression()?);

            while self.current_token == Token::Comma {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(Token::RParen)?;

        let arity_ok = if function.is_variadic() {
            !args.is_empty()
        } else {
            args.len() == 1
        };
        if !arity_ok {
            return Err(ParseError::new(format!(
                "Wrong number of arguments for {}: {}",
                function.name(),
                args.len()
            )));
        }

        Ok(Expression::FunctionCall { function, args })
    }
}

/// Parses a measure formula into an expression tree.
pub fn parse(input: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(input);
    parser.parse()
}
