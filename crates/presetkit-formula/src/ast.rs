//! Formula Abstract Syntax Tree types

use std::sync::Arc;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// List literal `[a, b]`
    List(Vec<Expr>),
    /// Object literal `{key: value}`, in source order
    Object(Vec<(String, Expr)>),

    // === References ===
    /// Setting key or lambda parameter
    Variable(String),
    /// Field access `object.field`
    Member { object: Box<Expr>, field: String },
    /// Index access `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },
    /// Built-in function used as a value, e.g. `map(math.radians, angles)`
    FunctionRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// Ternary `condition ? then : otherwise`
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    // === Functions ===
    /// Call of an allow-listed built-in
    Call { function: String, args: Vec<Expr> },
    /// Single-parameter lambda `x => body`
    Lambda { param: String, body: Arc<Expr> },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Logical (short-circuit)
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

/// Built-ins whose first string-literal argument names a setting key
const KEY_READING_FUNCTIONS: [&str; 2] = ["resolveOrValue", "extruderValues"];

impl Expr {
    /// Setting keys this expression reads, in first-seen order without duplicates.
    ///
    /// Lambda parameters are not references. Keys passed as string literals to
    /// `resolveOrValue`, `extruderValues` and `extruderValue` are.
    pub fn references(&self) -> Vec<String> {
        let mut refs = Vec::new();
        let mut scope = Vec::new();
        self.collect_references(&mut scope, &mut refs);
        refs
    }

    fn collect_references(&self, scope: &mut Vec<String>, refs: &mut Vec<String>) {
        fn push(name: &str, scope: &[String], refs: &mut Vec<String>) {
            if !scope.iter().any(|s| s == name) && !refs.iter().any(|r| r == name) {
                refs.push(name.to_string());
            }
        }

        match self {
            Expr::Variable(name) => push(name, scope, refs),
            Expr::Member { object, .. } => object.collect_references(scope, refs),
            Expr::Index { object, index } => {
                object.collect_references(scope, refs);
                index.collect_references(scope, refs);
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect_references(scope, refs);
                right.collect_references(scope, refs);
            }
            Expr::UnaryOp { operand, .. } => operand.collect_references(scope, refs),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_references(scope, refs);
                then_branch.collect_references(scope, refs);
                else_branch.collect_references(scope, refs);
            }
            Expr::Call { function, args } => {
                let key_arg = if KEY_READING_FUNCTIONS.contains(&function.as_str()) {
                    args.first()
                } else if function == "extruderValue" {
                    args.get(1)
                } else {
                    None
                };
                if let Some(Expr::String(key)) = key_arg {
                    push(key, scope, refs);
                }
                for arg in args {
                    arg.collect_references(scope, refs);
                }
            }
            Expr::Lambda { param, body } => {
                scope.push(param.clone());
                body.collect_references(scope, refs);
                scope.pop();
            }
            Expr::List(items) => {
                for item in items {
                    item.collect_references(scope, refs);
                }
            }
            Expr::Object(fields) => {
                for (_, value) in fields {
                    value.collect_references(scope, refs);
                }
            }
            // Literals have no references
            Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) | Expr::FunctionRef(_) => {}
        }
    }

    /// Height of the tree; leaves count as 1
    pub fn depth(&self) -> usize {
        let children = match self {
            Expr::Number(_)
            | Expr::String(_)
            | Expr::Boolean(_)
            | Expr::Variable(_)
            | Expr::FunctionRef(_) => return 1,
            Expr::Member { object, .. } => object.depth(),
            Expr::Index { object, index } => object.depth().max(index.depth()),
            Expr::BinaryOp { left, right, .. } => left.depth().max(right.depth()),
            Expr::UnaryOp { operand, .. } => operand.depth(),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => condition
                .depth()
                .max(then_branch.depth())
                .max(else_branch.depth()),
            Expr::Call { args, .. } => args.iter().map(Expr::depth).max().unwrap_or(0),
            Expr::Lambda { body, .. } => body.depth(),
            Expr::List(items) => items.iter().map(Expr::depth).max().unwrap_or(0),
            Expr::Object(fields) => fields.iter().map(|(_, v)| v.depth()).max().unwrap_or(0),
        };
        children + 1
    }

    /// Visit every call node (used for allow-list validation)
    pub fn for_each_call<'a>(&'a self, f: &mut dyn FnMut(&'a str, &'a [Expr])) {
        match self {
            Expr::Call { function, args } => {
                f(function.as_str(), args.as_slice());
                for arg in args {
                    arg.for_each_call(f);
                }
            }
            Expr::Member { object, .. } => object.for_each_call(f),
            Expr::Index { object, index } => {
                object.for_each_call(f);
                index.for_each_call(f);
            }
            Expr::BinaryOp { left, right, .. } => {
                left.for_each_call(f);
                right.for_each_call(f);
            }
            Expr::UnaryOp { operand, .. } => operand.for_each_call(f),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.for_each_call(f);
                then_branch.for_each_call(f);
                else_branch.for_each_call(f);
            }
            Expr::Lambda { body, .. } => body.for_each_call(f),
            Expr::List(items) => {
                for item in items {
                    item.for_each_call(f);
                }
            }
            Expr::Object(fields) => {
                for (_, value) in fields {
                    value.for_each_call(f);
                }
            }
            Expr::Number(_)
            | Expr::String(_)
            | Expr::Boolean(_)
            | Expr::Variable(_)
            | Expr::FunctionRef(_) => {}
        }
    }
}
