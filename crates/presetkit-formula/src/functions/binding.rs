//! Functions that read setting bindings by name
//!
//! Per-extruder scoping is not modeled: every extruder reads the same global
//! binding and there is exactly one extruder, at position 0.

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::Interpreter;
use crate::value::Value;

fn key_arg<'v>(name: &str, value: Option<&'v Value>) -> FormulaResult<&'v str> {
    match value {
        Some(Value::String(key)) => Ok(key),
        Some(other) => Err(FormulaError::Argument(format!(
            "{} expects a setting key string, got {}",
            name,
            other.type_name()
        ))),
        None => Err(FormulaError::Argument(format!("{} expects a setting key", name))),
    }
}

/// resolveOrValue function: the current binding of `key`
pub fn fn_resolve_or_value(args: &[Value], interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let key = key_arg("resolveOrValue", args.first())?;
    interp.context().lookup(key).cloned()
}

/// extruderValue function: `extruderValue(index, key)`
pub fn fn_extruder_value(args: &[Value], interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    if let Some(index) = args.first() {
        index.as_number().ok_or_else(|| {
            FormulaError::Argument(format!(
                "extruderValue expects an extruder index, got {}",
                index.type_name()
            ))
        })?;
    }
    let key = key_arg("extruderValue", args.get(1))?;
    interp.context().lookup(key).cloned()
}

/// extruderValues function: one-element list of the binding
pub fn fn_extruder_values(args: &[Value], interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let key = key_arg("extruderValues", args.first())?;
    let value = interp.context().lookup(key)?.clone();
    Ok(Value::List(vec![value]))
}

/// defaultExtruderPosition function
pub fn fn_default_extruder_position(
    _args: &[Value],
    _interp: &mut Interpreter<'_>,
) -> FormulaResult<Value> {
    Ok(Value::Number(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluationContext;

    #[test]
    fn test_binding_reads() {
        let mut ctx = EvaluationContext::new();
        ctx.set("material_print_temperature", 210.0);
        let mut interp = Interpreter::new(&ctx);

        let key = Value::from("material_print_temperature");
        assert_eq!(
            fn_resolve_or_value(&[key.clone()], &mut interp).unwrap(),
            Value::Number(210.0)
        );
        assert_eq!(
            fn_extruder_value(&[Value::Number(1.0), key.clone()], &mut interp).unwrap(),
            Value::Number(210.0)
        );
        assert_eq!(
            fn_extruder_values(&[key], &mut interp).unwrap(),
            Value::List(vec![Value::Number(210.0)])
        );
        assert_eq!(
            fn_default_extruder_position(&[], &mut interp).unwrap(),
            Value::Number(0.0)
        );
    }

    #[test]
    fn test_unknown_key() {
        let ctx = EvaluationContext::new();
        let mut interp = Interpreter::new(&ctx);
        assert_eq!(
            fn_resolve_or_value(&[Value::from("missing")], &mut interp),
            Err(FormulaError::UnknownReference("missing".into()))
        );
        assert!(matches!(
            fn_resolve_or_value(&[Value::Number(1.0)], &mut interp),
            Err(FormulaError::Argument(_))
        ));
    }
}
