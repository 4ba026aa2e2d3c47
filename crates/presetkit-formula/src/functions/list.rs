//! List functions

use super::{list_arg, numeric_args};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::Interpreter;
use crate::value::Value;

/// sum function
pub fn fn_sum(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let first = args.first().cloned().unwrap_or(Value::List(Vec::new()));
    let items = list_arg("sum", &first)?;
    let total: f64 = numeric_args("sum", items)?.into_iter().sum();
    Ok(Value::Number(total))
}

/// map function: `map(fn, list)` where fn is a lambda or a built-in reference
pub fn fn_map(args: &[Value], interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let [callee, list] = args else {
        return Err(FormulaError::Argument("map expects (fn, list)".into()));
    };
    if !matches!(callee, Value::Function(_)) {
        return Err(FormulaError::Argument(format!(
            "map expects a function, got {}",
            callee.type_name()
        )));
    }

    let items = list_arg("map", list)?;
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(interp.call(callee, vec![item.clone()])?);
    }
    Ok(Value::List(mapped))
}

/// len function: list length or string length in characters
pub fn fn_len(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    match args.first() {
        Some(Value::List(items)) => Ok(Value::Number(items.len() as f64)),
        Some(Value::String(s)) => Ok(Value::Number(s.chars().count() as f64)),
        Some(other) => Err(FormulaError::Argument(format!(
            "len expects a list or string, got {}",
            other.type_name()
        ))),
        None => Err(FormulaError::Argument("len expects an argument".into())),
    }
}

/// any function
pub fn fn_any(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let first = args.first().cloned().unwrap_or(Value::List(Vec::new()));
    let items = list_arg("any", &first)?;
    Ok(Value::Bool(items.iter().any(Value::is_truthy)))
}

/// all function
pub fn fn_all(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let first = args.first().cloned().unwrap_or(Value::List(Vec::new()));
    let items = list_arg("all", &first)?;
    Ok(Value::Bool(items.iter().all(Value::is_truthy)))
}
