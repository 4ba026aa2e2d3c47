//! Formula compilation with a process-wide cache
//!
//! Compiling parses the source, enforces the size limits and checks every
//! call against the built-in allow-list. Successful results are shared by
//! exact source text, so tables loaded from similar presets reuse the same
//! compiled expressions.

use crate::ast::Expr;
use crate::error::{CompileError, FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext};
use crate::functions;
use crate::parser::parse_formula;
use crate::value::Value;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};

pub use crate::parser::MAX_NESTING_DEPTH;

/// Longest formula source accepted, in bytes
pub const MAX_SOURCE_LEN: usize = 4096;

/// Cached expressions kept before the cache is emptied
pub const DEFAULT_CACHE_CAPACITY: usize = 65_536;

/// A parsed and validated formula
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    expr: Expr,
    references: Vec<String>,
}

impl CompiledExpression {
    /// Source text the expression was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Setting keys the expression reads, in first-seen order
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Whether the expression reads no setting at all
    pub fn is_constant(&self) -> bool {
        self.references.is_empty()
    }

    /// Evaluate against a context
    pub fn evaluate(&self, ctx: &EvaluationContext) -> FormulaResult<Value> {
        evaluate(&self.expr, ctx)
    }
}

/// Memoizing formula compiler
///
/// The cache holds at most `capacity` expressions. Inserting into a full
/// cache empties it first.
#[derive(Debug)]
pub struct ExpressionCompiler {
    cache: RwLock<AHashMap<String, Arc<CompiledExpression>>>,
    capacity: usize,
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

static GLOBAL: Lazy<ExpressionCompiler> = Lazy::new(ExpressionCompiler::new);

impl ExpressionCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: RwLock::new(AHashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// The process-wide compiler
    pub fn global() -> &'static ExpressionCompiler {
        &GLOBAL
    }

    /// Compile `source`, reusing a cached result for identical text
    pub fn compile(&self, source: &str) -> Result<Arc<CompiledExpression>, CompileError> {
        if let Some(compiled) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
        {
            return Ok(Arc::clone(compiled));
        }

        let compiled = Arc::new(compile_uncached(source).map_err(|e| {
            tracing::trace!(source, error = %e, "formula failed to compile");
            CompileError::new(source, e)
        })?);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.len() >= self.capacity && !cache.contains_key(source) {
            tracing::debug!(capacity = self.capacity, "formula cache full, clearing");
            cache.clear();
        }
        let entry = cache
            .entry(source.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry))
    }

    /// Number of cached expressions
    pub fn cached_count(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every cached expression (outstanding `Arc`s stay valid)
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Compile with the process-wide compiler
pub fn compile(source: &str) -> Result<Arc<CompiledExpression>, CompileError> {
    ExpressionCompiler::global().compile(source)
}

fn compile_uncached(source: &str) -> FormulaResult<CompiledExpression> {
    if source.len() > MAX_SOURCE_LEN {
        return Err(FormulaError::TooLarge(format!(
            "source is {} bytes, limit is {}",
            source.len(),
            MAX_SOURCE_LEN
        )));
    }

    let expr = parse_formula(source)?;
    validate_calls(&expr)?;
    let references = expr.references();

    Ok(CompiledExpression {
        source: source.to_string(),
        expr,
        references,
    })
}

/// Every call must name an allow-listed built-in with a valid argument count
fn validate_calls(expr: &Expr) -> FormulaResult<()> {
    let mut result = Ok(());
    expr.for_each_call(&mut |name, args| {
        if result.is_err() {
            return;
        }
        result = match functions::registry().get(name) {
            Some(def) => def.check_arity(args.len()),
            None => Err(FormulaError::UnknownFunction(name.to_string())),
        };
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_and_evaluate() {
        let compiled = compile("nozzle_diameter * 0.5").unwrap();
        assert_eq!(compiled.source(), "nozzle_diameter * 0.5");
        assert_eq!(compiled.references(), ["nozzle_diameter".to_string()]);

        let ctx = EvaluationContext::from_bindings([("nozzle_diameter", 0.4)]);
        assert_eq!(compiled.evaluate(&ctx).unwrap(), Value::Number(0.2));
    }

    #[test]
    fn test_cache_shares_by_source() {
        let compiler = ExpressionCompiler::new();
        let a = compiler.compile("1 + 2").unwrap();
        let b = compiler.compile("1 + 2").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(compiler.cached_count(), 1);

        // Whitespace differences are different sources
        compiler.compile("1+2").unwrap();
        assert_eq!(compiler.cached_count(), 2);

        compiler.clear();
        assert_eq!(compiler.cached_count(), 0);
        assert_eq!(a.expr(), b.expr());
    }

    #[test]
    fn test_cache_capacity() {
        let compiler = ExpressionCompiler::with_capacity(2);
        let first = compiler.compile("a + 1").unwrap();
        compiler.compile("a + 2").unwrap();
        assert_eq!(compiler.cached_count(), 2);

        // Hits on a full cache keep it intact
        assert!(Arc::ptr_eq(&first, &compiler.compile("a + 1").unwrap()));
        assert_eq!(compiler.cached_count(), 2);

        compiler.compile("a + 3").unwrap();
        assert_eq!(compiler.cached_count(), 1);

        // Evicted expressions stay usable and compile afresh
        let ctx = EvaluationContext::from_bindings([("a", 1.0)]);
        assert_eq!(first.evaluate(&ctx).unwrap(), Value::Number(2.0));
        let again = compiler.compile("a + 1").unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(compiler.cached_count(), 2);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let compiler = ExpressionCompiler::new();
        let err = compiler.compile("1 +").unwrap_err();
        assert_eq!(err.source_text, "1 +");
        assert!(matches!(err.error, FormulaError::Parse(_)));
        assert_eq!(compiler.cached_count(), 0);
    }

    #[test]
    fn test_allow_list() {
        let err = compile("eval('1')").unwrap_err();
        assert_eq!(err.error, FormulaError::UnknownFunction("eval".into()));

        let err = compile("map([1], x => x, 3)").unwrap_err();
        assert!(matches!(err.error, FormulaError::ArgumentCount { actual: 3, .. }));

        // Nested calls are checked too
        let err = compile("sum(map(x => os.system(x), [1]))").unwrap_err();
        assert_eq!(err.error, FormulaError::UnknownFunction("os.system".into()));
    }

    #[test]
    fn test_size_limits() {
        let long = format!("1{}", " + 1".repeat(MAX_SOURCE_LEN));
        assert!(matches!(
            compile(&long).unwrap_err().error,
            FormulaError::TooLarge(_)
        ));

        let deep = format!("{}1{}", "[".repeat(MAX_NESTING_DEPTH + 1), "]".repeat(MAX_NESTING_DEPTH + 1));
        assert!(matches!(
            compile(&deep).unwrap_err().error,
            FormulaError::TooLarge(_)
        ));

        // Short enough to pass the length check, too deep to evaluate
        let chain = format!("1{}", " + 1".repeat(1000));
        assert!(chain.len() <= MAX_SOURCE_LEN);
        assert!(matches!(
            compile(&chain).unwrap_err().error,
            FormulaError::TooLarge(_)
        ));
        let powers = format!("2{}", " ** 1".repeat(500));
        assert!(matches!(
            compile(&powers).unwrap_err().error,
            FormulaError::TooLarge(_)
        ));
    }

    #[test]
    fn test_references_exclude_lambda_params() {
        let compiled =
            compile("sum(map(x => x * scale, extruderValues('flow'))) + resolveOrValue('speed')")
                .unwrap();
        assert_eq!(
            compiled.references(),
            ["scale".to_string(), "flow".to_string(), "speed".to_string()]
        );
        assert!(compile("math.pi() * 2").unwrap().is_constant());
    }
}
