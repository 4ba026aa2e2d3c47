//! Built-in functions formulas may call
//!
//! The registry is the allow-list: a call to any name not registered here is
//! rejected when the formula is compiled.

pub mod binding;
pub mod convert;
pub mod list;
pub mod math;

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::Interpreter;
use crate::value::Value;
use ahash::AHashMap;
use once_cell::sync::Lazy;

/// Function implementation signature
///
/// Functions receive the interpreter so that higher-order built-ins can call
/// back into lambdas and binding built-ins can read the context.
pub type FunctionImpl = fn(&[Value], &mut Interpreter<'_>) -> FormulaResult<Value>;

/// Function definition
pub struct FunctionDef {
    /// Function name as written in formulas (case-sensitive)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Check a call's argument count against the declared arity
    pub fn check_arity(&self, actual: usize) -> FormulaResult<()> {
        if actual < self.min_args {
            return Err(FormulaError::ArgumentCount {
                function: self.name.to_string(),
                expected: format!("at least {}", self.min_args),
                actual,
            });
        }

        if let Some(max) = self.max_args {
            if actual > max {
                return Err(FormulaError::ArgumentCount {
                    function: self.name.to_string(),
                    expected: format!("at most {}", max),
                    actual,
                });
            }
        }

        Ok(())
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// The process-wide registry of built-ins
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_list_functions();
        registry.register_binding_functions();
        registry.register_conversion_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn add(&mut self, name: &'static str, min_args: usize, max_args: Option<usize>, f: FunctionImpl) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation: f,
        });
    }

    fn register_math_functions(&mut self) {
        self.add("math.radians", 1, Some(1), math::fn_radians);
        self.add("math.degrees", 1, Some(1), math::fn_degrees);
        self.add("math.ceil", 1, Some(1), math::fn_ceil);
        self.add("math.floor", 1, Some(1), math::fn_floor);
        self.add("math.sqrt", 1, Some(1), math::fn_sqrt);
        self.add("math.pi", 0, Some(0), math::fn_pi);
        self.add("abs", 1, Some(1), math::fn_abs);
        self.add("round", 1, Some(2), math::fn_round);
        self.add("min", 1, None, math::fn_min);
        self.add("max", 1, None, math::fn_max);
    }

    fn register_list_functions(&mut self) {
        self.add("sum", 1, Some(1), list::fn_sum);
        self.add("map", 2, Some(2), list::fn_map);
        self.add("len", 1, Some(1), list::fn_len);
        self.add("any", 1, Some(1), list::fn_any);
        self.add("all", 1, Some(1), list::fn_all);
    }

    fn register_binding_functions(&mut self) {
        self.add("resolveOrValue", 1, Some(1), binding::fn_resolve_or_value);
        self.add("extruderValue", 2, Some(2), binding::fn_extruder_value);
        self.add("extruderValues", 1, Some(1), binding::fn_extruder_values);
        self.add(
            "defaultExtruderPosition",
            0,
            Some(0),
            binding::fn_default_extruder_position,
        );
    }

    fn register_conversion_functions(&mut self) {
        self.add("int", 1, Some(1), convert::fn_int);
        self.add("float", 1, Some(1), convert::fn_float);
        self.add("str", 1, Some(1), convert::fn_str);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten arguments into numbers: a single list argument is spread
pub(crate) fn numeric_args(name: &str, args: &[Value]) -> FormulaResult<Vec<f64>> {
    let items: &[Value] = match args {
        [Value::List(items)] => items,
        _ => args,
    };
    items
        .iter()
        .map(|v| {
            v.as_number().ok_or_else(|| {
                FormulaError::Argument(format!("{} expects numbers, got {}", name, v.type_name()))
            })
        })
        .collect()
}

/// The single list argument of a list built-in
pub(crate) fn list_arg<'v>(name: &str, value: &'v Value) -> FormulaResult<&'v [Value]> {
    value.as_list().ok_or_else(|| {
        FormulaError::Argument(format!("{} expects a list, got {}", name, value.type_name()))
    })
}

/// The single numeric argument of a unary math built-in
pub(crate) fn number_arg(name: &str, args: &[Value]) -> FormulaResult<f64> {
    let value = args
        .first()
        .ok_or_else(|| FormulaError::Argument(format!("{} expects an argument", name)))?;
    value.as_number().ok_or_else(|| {
        FormulaError::Argument(format!("{} expects a number, got {}", name, value.type_name()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_is_case_sensitive() {
        assert!(registry().get("sum").is_some());
        assert!(registry().get("math.radians").is_some());
        assert!(registry().get("SUM").is_none());
        assert!(registry().get("eval").is_none());
    }

    #[test]
    fn test_check_arity() {
        let map = registry().get("map").unwrap();
        assert!(map.check_arity(2).is_ok());
        assert!(matches!(
            map.check_arity(1),
            Err(FormulaError::ArgumentCount { actual: 1, .. })
        ));
        let min = registry().get("min").unwrap();
        assert!(min.check_arity(12).is_ok());
        assert!(min.check_arity(0).is_err());
    }

    #[test]
    fn test_names_sorted() {
        let names = registry().names();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(names.contains(&"defaultExtruderPosition"));
    }
}
