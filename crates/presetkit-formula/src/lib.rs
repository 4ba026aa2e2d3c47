//! # presetkit-formula
//!
//! Formula compiler and evaluator for presetkit setting tables.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - A memoizing compiler that enforces the built-in allow-list
//! - Formula evaluation against a key → value context
//! - Built-in functions (`sum`, `map`, `math.radians`, `resolveOrValue`, ...)
//! - Dependency ordering between settings
//!
//! ## Example
//!
//! ```rust
//! use presetkit_formula::{compile, EvaluationContext, Value};
//!
//! let compiled = compile("nozzle_diameter * 0.5").unwrap();
//! let ctx = EvaluationContext::from_bindings([("nozzle_diameter", 0.4)]);
//! assert_eq!(compiled.evaluate(&ctx).unwrap(), Value::Number(0.2));
//! ```

pub mod ast;
pub mod compiler;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod value;

pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use compiler::{
    compile, CompiledExpression, ExpressionCompiler, DEFAULT_CACHE_CAPACITY, MAX_SOURCE_LEN,
};
pub use dependency::{DependencyGraph, TopologicalOrder};
pub use error::{CompileError, FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext, Interpreter};
pub use parser::{parse_formula, MAX_NESTING_DEPTH};
pub use value::{Callable, Value};
