//! FILENAME: core/measure-parser/src/compile.rs
//! PURPOSE: Turns an Expression into a slot-addressed program evaluated once per cell.
//! CONTEXT: Variable names are resolved to slot indices a single time. The caller
//! binds each slot to a value source and passes the slot values to `evaluate`.

use crate::ast::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Constant(f64),
    Slot(usize),
    Binary {
        left: Box<Node>,
        op: BinaryOperator,
        right: Box<Node>,
    },
    Coalesce {
        left: Box<Node>,
        right: Box<Node>,
    },
    Negate(Box<Node>),
    Call {
        function: BuiltinFunction,
        args: Vec<Node>,
    },
}

/// A formula with every variable replaced by a slot index.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    slots: Vec<String>,
    root: Node,
}

impl CompiledExpression {
    pub fn compile(expression: &Expression) -> Self {
        let slots = expression.variables();
        let root = lower(expression, &slots);
        CompiledExpression { slots, root }
    }

    /// Variable names in slot order.
    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    /// Evaluates the program. `params[i]` is the value of `slots()[i]`;
    /// missing params read as NaN.
    pub fn evaluate(&self, params: &[f64]) -> f64 {
        eval(&self.root, params)
    }
}

fn lower(expression: &Expression, slots: &[String]) -> Node {
    match expression {
        Expression::Number(n) => Node::Constant(*n),
        Expression::Variable(name) => match slots.iter().position(|s| s == name) {
            Some(index) => Node::Slot(index),
            None => Node::Constant(f64::NAN),
        },
        Expression::BinaryOp { left, op, right } => Node::Binary {
            left: Box::new(lower(left, slots)),
            op: *op,
            right: Box::new(lower(right, slots)),
        },
        Expression::Coalesce { left, right } => Node::Coalesce {
            left: Box::new(lower(left, slots)),
            right: Box::new(lower(right, slots)),
        },
        Expression::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => Node::Negate(Box::new(lower(operand, slots))),
        Expression::FunctionCall { function, args } => Node::Call {
            function: *function,
            args: args.iter().map(|a| lower(a, slots)).collect(),
        },
    }
}

fn eval(node: &Node, params: &[f64]) -> f64 {
    match node {
        Node::Constant(n) => *n,
        Node::Slot(index) => params.get(*index).copied().unwrap_or(f64::NAN),
        Node::Binary { left, op, right } => {
            let l = eval(left, params);
            let r = eval(right, params);
            match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Subtract => l - r,
                BinaryOperator::Multiply => l * r,
                BinaryOperator::Divide => l / r,
                BinaryOperator::Modulo => l % r,
                BinaryOperator::Power => l.powf(r),
            }
        }
        Node::Coalesce { left, right } => {
            let l = eval(left, params);
            let r = eval(right, params);
            if r.is_nan() {
                l
            } else if l.is_nan() {
                r
            } else {
                l + r
            }
        }
        Node::Negate(operand) => -eval(operand, params),
        Node::Call { function, args } => {
            let values: Vec<f64> = args.iter().map(|a| eval(a, params)).collect();
            call(*function, &values)
        }
    }
}

fn call(function: BuiltinFunction, values: &[f64]) -> f64 {
    let first = values.first().copied().unwrap_or(f64::NAN);
    match function {
        BuiltinFunction::Abs => first.abs(),
        BuiltinFunction::Ceil => first.ceil(),
        BuiltinFunction::Floor => first.floor(),
        BuiltinFunction::Round => round_half_up(first),
        BuiltinFunction::Sqrt => first.sqrt(),
        BuiltinFunction::Exp => first.exp(),
        BuiltinFunction::Log => first.ln(),
        // NaN poisons min/max rather than being skipped
        BuiltinFunction::Min => fold_poisoned(values, f64::min),
        BuiltinFunction::Max => fold_poisoned(values, f64::max),
        BuiltinFunction::IsNaN => {
            if first.is_nan() {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Rounds .5 toward positive infinity (-2.5 -> -2).
fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn fold_poisoned(values: &[f64], f: fn(f64, f64) -> f64) -> f64 {
    let mut iter = values.iter().copied();
    let Some(mut acc) = iter.next() else {
        return f64::NAN;
    };
    for v in iter {
        if v.is_nan() || acc.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, v);
    }
    acc
}
