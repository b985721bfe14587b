//! FILENAME: core/measure-parser/src/lib.rs
//! PURPOSE: Library root for the computed-measure formula language.
//! CONTEXT: This crate exposes the lexer, parser, AST and compiler needed to
//! turn a formula such as `routers / antennas` into a program evaluated once
//! per cube cell.
//!
//! PIPELINE: Formula String --> Lexer --> Tokens --> Parser --> AST --> CompiledExpression
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, %, ^ (power)
//! - Coalescing sum: a || b (NaN on one side yields the other side)
//! - Measure references: antennas, antennas__total
//! - Function calls: abs, ceil, floor, round, sqrt, exp, log, min, max, isNaN
//! - Parentheses for grouping
//! - Unary negation: -5

pub mod ast;
pub mod compile;
pub mod lexer;
pub mod parser;
pub mod token;

// Register the separate tests module
#[cfg(test)]
mod tests;

// Re-export commonly used types for convenience
pub use ast::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator};
pub use compile::CompiledExpression;
pub use lexer::Lexer;
pub use parser::{parse, ParseError, ParseResult, Parser};
pub use token::Token;
