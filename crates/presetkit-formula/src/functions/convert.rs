//! Conversion functions

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::Interpreter;
use crate::value::Value;

fn parse_number(name: &str, value: &Value) -> FormulaResult<f64> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            FormulaError::Argument(format!("{} cannot parse {:?} as a number", name, s))
        }),
        other => other.as_number().ok_or_else(|| {
            FormulaError::Argument(format!(
                "{} cannot convert {} to a number",
                name,
                other.type_name()
            ))
        }),
    }
}

/// int function: truncates toward zero
pub fn fn_int(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let value = args
        .first()
        .ok_or_else(|| FormulaError::Argument("int expects an argument".into()))?;
    Ok(Value::Number(parse_number("int", value)?.trunc()))
}

/// float function
pub fn fn_float(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let value = args
        .first()
        .ok_or_else(|| FormulaError::Argument("float expects an argument".into()))?;
    Ok(Value::Number(parse_number("float", value)?))
}

/// str function
pub fn fn_str(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let value = args
        .first()
        .ok_or_else(|| FormulaError::Argument("str expects an argument".into()))?;
    Ok(Value::String(value.to_string()))
}
