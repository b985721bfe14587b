//! FILENAME: core/measure-parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for measure formulas.
//! CONTEXT: After the Lexer tokenizes a formula string, the Parser converts
//! those tokens into this tree structure. Computed measures keep the tree
//! (for renaming and substitution) and compile it into slots for evaluation.
//!
//! SUPPORTED EXPRESSIONS:
//! - Numeric literals: 1, 2.5, 1e3
//! - Measure references: antennas, antennas__total
//! - Binary operations: +, -, *, /, %, ^
//! - Coalescing sum: a || b
//! - Unary operations: - (negation)
//! - Function calls: abs(x), min(a, b, c), isnan(x)

/// Represents a parsed measure formula.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A numeric literal.
    Number(f64),

    /// A reference to a measure, resolved by name at compile time.
    Variable(String),

    /// A binary operation: left op right (e.g., routers / antennas).
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// `left || right`: whichever side is a number when the other is NaN,
    /// the sum when both are numbers.
    Coalesce {
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// A unary operation: op operand (e.g., -antennas).
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// A call to one of the built-in numeric functions.
    FunctionCall {
        function: BuiltinFunction,
        args: Vec<Expression>,
    },
}

/// Binary arithmetic operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    Modulo,   // %
    Power,    // ^
}

/// Unary operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
}

/// Functions available inside measure formulas.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BuiltinFunction {
    Abs,
    Ceil,
    Floor,
    Round,
    Sqrt,
    Exp,
    Log,
    Min,
    Max,
    IsNaN,
}

impl BuiltinFunction {
    /// Resolves a function name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "abs" => Some(BuiltinFunction::Abs),
            "ceil" => Some(BuiltinFunction::Ceil),
            "floor" => Some(BuiltinFunction::Floor),
            "round" => Some(BuiltinFunction::Round),
            "sqrt" => Some(BuiltinFunction::Sqrt),
            "exp" => Some(BuiltinFunction::Exp),
            "log" => Some(BuiltinFunction::Log),
            "min" => Some(BuiltinFunction::Min),
            "max" => Some(BuiltinFunction::Max),
            "isnan" => Some(BuiltinFunction::IsNaN),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "abs",
            BuiltinFunction::Ceil => "ceil",
            BuiltinFunction::Floor => "floor",
            BuiltinFunction::Round => "round",
            BuiltinFunction::Sqrt => "sqrt",
            BuiltinFunction::Exp => "exp",
            BuiltinFunction::Log => "log",
            BuiltinFunction::Min => "min",
            BuiltinFunction::Max => "max",
            BuiltinFunction::IsNaN => "isNaN",
        }
    }

    /// True when the function takes any positive number of arguments.
    pub fn is_variadic(&self) -> bool {
        matches!(self, BuiltinFunction::Min | BuiltinFunction::Max)
    }
}

impl Expression {
    /// Distinct variable names, in order of first appearance.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Expression::Number(_) => {}
            Expression::Variable(name) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
            Expression::BinaryOp { left, right, .. } | Expression::Coalesce { left, right } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expression::UnaryOp { operand, .. } => operand.collect_variables(names),
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
        }
    }

    /// True if the variable `name` occurs anywhere in the tree.
    pub fn references(&self, name: &str) -> bool {
        match self {
            Expression::Number(_) => false,
            Expression::Variable(v) => v == name,
            Expression::BinaryOp { left, right, .. } | Expression::Coalesce { left, right } => {
                left.references(name) || right.references(name)
            }
            Expression::UnaryOp { operand, .. } => operand.references(name),
            Expression::FunctionCall { args, .. } => args.iter().any(|a| a.references(name)),
        }
    }

    /// Returns a copy where every occurrence of the variable `name` is
    /// replaced by `replacement`.
    pub fn substitute(&self, name: &str, replacement: &Expression) -> Expression {
        self.map_variables(&|v| {
            if v == name {
                Some(replacement.clone())
            } else {
                None
            }
        })
    }

    /// Returns a copy with the variable `from` renamed to `to`.
    pub fn rename_variable(&self, from: &str, to: &str) -> Expression {
        self.substitute(from, &Expression::Variable(to.to_string()))
    }

    /// Rebuilds the tree, replacing variables for which `f` returns a new expression.
    pub fn map_variables(&self, f: &dyn Fn(&str) -> Option<Expression>) -> Expression {
        match self {
            Expression::Number(n) => Expression::Number(*n),
            Expression::Variable(v) => f(v).unwrap_or_else(|| Expression::Variable(v.clone())),
            Expression::BinaryOp { left, op, right } => Expression::BinaryOp {
                left: Box::new(left.map_variables(f)),
                op: *op,
                right: Box::new(right.map_variables(f)),
            },
            Expression::Coalesce { left, right } => Expression::Coalesce {
                left: Box::new(left.map_variables(f)),
                right: Box::new(right.map_variables(f)),
            },
            Expression::UnaryOp { op, operand } => Expression::UnaryOp {
                op: *op,
                operand: Box::new(operand.map_variables(f)),
            },
            Expression::FunctionCall { function, args } => Expression::FunctionCall {
                function: *function,
                args: args.iter().map(|a| a.map_variables(f)).collect(),
            },
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::Modulo => write!(f, "%"),
            BinaryOperator::Power => write!(f, "^"),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}

/// Renders the formula back to text. Every binary node is parenthesized so
/// the output parses back to the same tree.
impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Number(n) => write!(f, "{}", n),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::BinaryOp { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expression::Coalesce { left, right } => write!(f, "({} || {})", left, right),
            Expression::UnaryOp { op, operand } => write!(f, "{}{}", op, operand),
            Expression::FunctionCall { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
