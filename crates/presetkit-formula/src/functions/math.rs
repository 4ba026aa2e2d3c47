//! Math functions

use super::{number_arg, numeric_args};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::Interpreter;
use crate::value::Value;

/// math.radians function
pub fn fn_radians(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg("math.radians", args)?.to_radians()))
}

/// math.degrees function
pub fn fn_degrees(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg("math.degrees", args)?.to_degrees()))
}

/// math.ceil function
pub fn fn_ceil(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg("math.ceil", args)?.ceil()))
}

/// math.floor function
pub fn fn_floor(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg("math.floor", args)?.floor()))
}

/// math.sqrt function
pub fn fn_sqrt(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let n = number_arg("math.sqrt", args)?;
    if n < 0.0 {
        return Err(FormulaError::Argument(format!(
            "math.sqrt of negative number {}",
            n
        )));
    }
    Ok(Value::Number(n.sqrt()))
}

/// math.pi function
pub fn fn_pi(_args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    Ok(Value::Number(std::f64::consts::PI))
}

/// abs function
pub fn fn_abs(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg("abs", args)?.abs()))
}

/// round function: `round(x)` or `round(x, digits)`, halves away from zero
pub fn fn_round(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    let n = number_arg("round", args)?;
    let digits = match args.get(1) {
        Some(d) => d
            .as_number()
            .ok_or_else(|| FormulaError::Argument("round digits must be a number".into()))?
            .trunc() as i32,
        None => 0,
    };

    // f64 carries no digits beyond 10^±308
    let factor = 10f64.powi(digits.clamp(-308, 308));
    let scaled = n * factor;
    if !scaled.is_finite() {
        return Ok(Value::Number(n));
    }
    Ok(Value::Number(scaled.round() / factor))
}

/// min function: numbers or a single list
pub fn fn_min(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    numeric_args("min", args)?
        .into_iter()
        .reduce(f64::min)
        .map(Value::Number)
        .ok_or_else(|| FormulaError::Argument("min of empty list".into()))
}

/// max function: numbers or a single list
pub fn fn_max(args: &[Value], _interp: &mut Interpreter<'_>) -> FormulaResult<Value> {
    numeric_args("max", args)?
        .into_iter()
        .reduce(f64::max)
        .map(Value::Number)
        .ok_or_else(|| FormulaError::Argument("max of empty list".into()))
}
