//! FILENAME: core/measure-parser/src/tests.rs
//! PURPOSE: Consolidated unit tests for the measure-parser crate.

use crate::ast::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator};
use crate::compile::CompiledExpression;
use crate::lexer::Lexer;
use crate::parser::parse;
use crate::token::Token;

fn var(name: &str) -> Expression {
    Expression::Variable(name.to_string())
}

fn eval_with(formula: &str, bindings: &[(&str, f64)]) -> f64 {
    let compiled = CompiledExpression::compile(&parse(formula).unwrap());
    let params: Vec<f64> = compiled
        .slots()
        .iter()
        .map(|slot| {
            bindings
                .iter()
                .find(|(name, _)| name == slot)
                .map(|(_, v)| *v)
                .unwrap_or(f64::NAN)
        })
        .collect();
    compiled.evaluate(&params)
}

// ========================================
// LEXER TESTS
// ========================================

#[test]
fn lexer_tokenizes_ratio() {
    let mut lexer = Lexer::new("routers / antennas");
    assert_eq!(lexer.next_token(), Token::Identifier("routers".to_string()));
    assert_eq!(lexer.next_token(), Token::Slash);
    assert_eq!(lexer.next_token(), Token::Identifier("antennas".to_string()));
    assert_eq!(lexer.next_token(), Token::EOF);
}

#[test]
fn lexer_reads_double_pipe() {
    let mut lexer = Lexer::new("a||b");
    assert_eq!(lexer.next_token(), Token::Identifier("a".to_string()));
    assert_eq!(lexer.next_token(), Token::DoublePipe);
    assert_eq!(lexer.next_token(), Token::Identifier("b".to_string()));
}

#[test]
fn lexer_rejects_single_pipe() {
    let mut lexer = Lexer::new("a | b");
    lexer.next_token();
    assert_eq!(lexer.next_token(), Token::Illegal('|'));
}

#[test]
fn lexer_keeps_identifier_case_and_underscores() {
    let mut lexer = Lexer::new("Antennas__total");
    assert_eq!(
        lexer.next_token(),
        Token::Identifier("Antennas__total".to_string())
    );
}

#[test]
fn lexer_reads_exponent_numbers() {
    let mut lexer = Lexer::new("1.5e3 2E-2");
    assert_eq!(lexer.next_token(), Token::Number(1500.0));
    assert_eq!(lexer.next_token(), Token::Number(0.02));
}

// ========================================
// PARSER TESTS
// ========================================

#[test]
fn parses_precedence() {
    let expr = parse("a + b * 2").unwrap();
    assert_eq!(
        expr,
        Expression::BinaryOp {
            left: Box::new(var("a")),
            op: BinaryOperator::Add,
            right: Box::new(Expression::BinaryOp {
                left: Box::new(var("b")),
                op: BinaryOperator::Multiply,
                right: Box::new(Expression::Number(2.0)),
            }),
        }
    );
}

#[test]
fn parses_coalesce_as_own_node() {
    let expr = parse("antennas || routers").unwrap();
    assert_eq!(
        expr,
        Expression::Coalesce {
            left: Box::new(var("antennas")),
            right: Box::new(var("routers")),
        }
    );
}

#[test]
fn coalesce_shares_additive_precedence() {
    // (a || b) + c, left associative
    let expr = parse("a || b + c").unwrap();
    match expr {
        Expression::BinaryOp { left, op, .. } => {
            assert_eq!(op, BinaryOperator::Add);
            assert!(matches!(*left, Expression::Coalesce { .. }));
        }
        other => panic!("unexpected tree: {:?}", other),
    }
}

#[test]
fn parses_unary_negation_and_plus() {
    assert_eq!(
        parse("-a").unwrap(),
        Expression::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(var("a")),
        }
    );
    assert_eq!(parse("+a").unwrap(), var("a"));
}

#[test]
fn power_is_right_associative() {
    assert_eq!(eval_with("2 ^ 3 ^ 2", &[]), 512.0);
}

#[test]
fn parses_function_calls_case_insensitively() {
    let expr = parse("isNaN(a)").unwrap();
    assert_eq!(
        expr,
        Expression::FunctionCall {
            function: BuiltinFunction::IsNaN,
            args: vec![var("a")],
        }
    );
    assert!(parse("ISNAN(a)").is_ok());
}

#[test]
fn rejects_unknown_function() {
    let err = parse("sum(a)").unwrap_err();
    assert!(err.message.contains("Unknown function"));
}

#[test]
fn rejects_wrong_arity() {
    assert!(parse("abs(a, b)").is_err());
    assert!(parse("max()").is_err());
    assert!(parse("max(a, b, c)").is_ok());
}

#[test]
fn rejects_empty_and_trailing_input() {
    assert_eq!(parse("").unwrap_err().message, "Empty expression");
    assert!(parse("a b").is_err());
    assert!(parse("(a + b").is_err());
}

#[test]
fn rejects_overflowing_number_literal() {
    let err = parse("antennas * 1e999").unwrap_err();
    assert!(err.message.contains("out of range"));
    assert!(parse("antennas * 1e300").is_ok());
}

// ========================================
// AST HELPER TESTS
// ========================================

#[test]
fn variables_are_distinct_in_first_appearance_order() {
    let expr = parse("b / a + b__total * a").unwrap();
    assert_eq!(expr.variables(), vec!["b", "a", "b__total"]);
}

#[test]
fn references_uses_exact_token() {
    let expr = parse("antennas__total + routers").unwrap();
    assert!(expr.references("routers"));
    assert!(!expr.references("antennas"));
    assert!(expr.references("antennas__total"));
}

#[test]
fn substitute_inlines_expression() {
    let ratio = parse("routers / antennas").unwrap();
    let expr = parse("ratio * 100").unwrap().substitute("ratio", &ratio);
    assert_eq!(expr, parse("(routers / antennas) * 100").unwrap());
}

#[test]
fn rename_variable_leaves_other_names() {
    let expr = parse("a + ab").unwrap().rename_variable("a", "c");
    assert_eq!(expr, parse("c + ab").unwrap());
}

#[test]
fn display_parses_back_to_same_tree() {
    for formula in [
        "routers / antennas",
        "a - (b - c)",
        "-a ^ 2",
        "max(a, b * 2, 3) || isNaN(c)",
        "a % 3 + 0.25",
        "a * 1e300 + 1e-300",
    ] {
        let expr = parse(formula).unwrap();
        let reparsed = parse(&expr.to_string()).unwrap();
        assert_eq!(expr, reparsed, "formula {}", formula);
    }
}

// ========================================
// EVALUATION TESTS
// ========================================

#[test]
fn evaluates_ratio() {
    assert_eq!(eval_with("routers / antennas", &[("routers", 3.0), ("antennas", 4.0)]), 0.75);
}

#[test]
fn coalesce_prefers_present_side() {
    let nan = f64::NAN;
    assert_eq!(eval_with("a || b", &[("a", 1.0), ("b", nan)]), 1.0);
    assert_eq!(eval_with("a || b", &[("a", nan), ("b", 2.0)]), 2.0);
    assert_eq!(eval_with("a || b", &[("a", 1.0), ("b", 2.0)]), 3.0);
    assert!(eval_with("a || b", &[("a", nan), ("b", nan)]).is_nan());
}

#[test]
fn plain_addition_propagates_nan() {
    assert!(eval_with("a + b", &[("a", 1.0), ("b", f64::NAN)]).is_nan());
}

#[test]
fn unbound_slot_reads_as_nan() {
    assert!(eval_with("a * 2", &[]).is_nan());
}

#[test]
fn round_goes_half_up() {
    assert_eq!(eval_with("round(a)", &[("a", 2.5)]), 3.0);
    assert_eq!(eval_with("round(a)", &[("a", -2.5)]), -2.0);
}

#[test]
fn min_max_are_poisoned_by_nan() {
    assert_eq!(eval_with("min(a, b)", &[("a", 3.0), ("b", 1.0)]), 1.0);
    assert!(eval_with("max(a, b)", &[("a", 3.0), ("b", f64::NAN)]).is_nan());
}

#[test]
fn is_nan_returns_flag() {
    assert_eq!(eval_with("isNaN(a)", &[("a", f64::NAN)]), 1.0);
    assert_eq!(eval_with("isNaN(a)", &[("a", 0.0)]), 0.0);
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_eq!(eval_with("a / 0", &[("a", 1.0)]), f64::INFINITY);
    assert!(eval_with("a / 0", &[("a", 0.0)]).is_nan());
}
