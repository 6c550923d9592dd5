//! Built-in compare and assign operators.
//!
//! Two-sided compares coerce by the left operand's type: a string left makes
//! the comparison lexicographic, a numeric left coerces the right side to
//! the same numeric shape. List membership operators split both sides on
//! commas. Assign operators mutate the evaluation context.

use std::cmp::Ordering;

use super::context::{Context, EvalContext};
use super::value::{Kind, Value};
use super::ExprError;

/// Compare operator: `(left, right) -> bool`.
pub type CompareFn = Box<dyn Fn(&Value, &Value) -> Result<bool, ExprError> + Send + Sync>;

/// Assign operator: `(var name, current value, right, ctx)`.
pub type AssignFn =
    Box<dyn Fn(&str, Option<&Value>, Value, &EvalContext) -> Result<(), ExprError> + Send + Sync>;

fn str_left(l: &Value) -> Result<String, ExprError> {
    l.as_str()
        .ok_or_else(|| ExprError::TypeMismatch("left operand is not a string".into()))
}

fn str_right(r: &Value) -> Result<String, ExprError> {
    r.as_str()
        .ok_or_else(|| ExprError::TypeMismatch("right operand is not a string".into()))
}

/// Ordered comparison driven by the left operand's kind. A list left is not
/// ordered and yields `None` (every ordered operator then reports false).
fn ordering(l: &Value, r: &Value) -> Result<Option<Ordering>, ExprError> {
    match l.kind() {
        Kind::Str => {
            let ls = str_left(l)?;
            let rs = str_right(r)?;
            Ok(Some(ls.cmp(&rs)))
        }
        Kind::Int => {
            let li = l.as_int().unwrap_or(0);
            let ri = r
                .as_int()
                .ok_or_else(|| ExprError::TypeMismatch("right operand is not an integer".into()))?;
            Ok(Some(li.cmp(&ri)))
        }
        Kind::Float => {
            let lf = l.as_float().unwrap_or(0.0);
            let rf = r
                .as_float()
                .ok_or_else(|| ExprError::TypeMismatch("right operand is not a number".into()))?;
            Ok(lf.partial_cmp(&rf))
        }
        Kind::Bool => Err(ExprError::TypeMismatch("left operand is a bool".into())),
        Kind::List => Ok(None),
    }
}

pub(crate) fn more(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(ordering(l, r)? == Some(Ordering::Greater))
}

pub(crate) fn more_equal(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(matches!(
        ordering(l, r)?,
        Some(Ordering::Greater) | Some(Ordering::Equal)
    ))
}

pub(crate) fn less(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(ordering(l, r)? == Some(Ordering::Less))
}

pub(crate) fn less_equal(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(matches!(
        ordering(l, r)?,
        Some(Ordering::Less) | Some(Ordering::Equal)
    ))
}

pub(crate) fn equal(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(ordering(l, r)? == Some(Ordering::Equal))
}

pub(crate) fn not_equal(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(matches!(
        ordering(l, r)?,
        Some(Ordering::Less) | Some(Ordering::Greater)
    ))
}

/// Inclusive range test. The right side is "lo,hi".
pub(crate) fn between(l: &Value, r: &Value) -> Result<bool, ExprError> {
    let rs = str_right(r)?;
    let bounds: Vec<&str> = rs.split(',').collect();
    if bounds.len() != 2 {
        return Err(ExprError::TypeMismatch("right operand is not a range".into()));
    }
    match l.kind() {
        Kind::Str => {
            let ls = str_left(l)?;
            Ok(ls.as_str() >= bounds[0] && ls.as_str() <= bounds[1])
        }
        Kind::Int => {
            let li = l.as_int().unwrap_or(0);
            let lo = bounds[0].parse::<i64>();
            let hi = bounds[1].parse::<i64>();
            match (lo, hi) {
                (Ok(lo), Ok(hi)) => Ok(li >= lo && li <= hi),
                _ => Err(ExprError::TypeMismatch("range bounds are not integers".into())),
            }
        }
        Kind::Float => {
            let lf = l.as_float().unwrap_or(0.0);
            let lo = bounds[0].parse::<f64>();
            let hi = bounds[1].parse::<f64>();
            match (lo, hi) {
                (Ok(lo), Ok(hi)) => Ok(lf >= lo && lf <= hi),
                _ => Err(ExprError::TypeMismatch("range bounds are not numbers".into())),
            }
        }
        _ => Err(ExprError::TypeMismatch("left operand is not ordered".into())),
    }
}

pub(crate) fn not_between(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(!between(l, r)?)
}

/// Exact membership of the left value in the comma-separated right list.
pub(crate) fn is_in(l: &Value, r: &Value) -> Result<bool, ExprError> {
    let ls = str_left(l)?;
    let rs = str_right(r)?;
    Ok(rs.split(',').any(|item| item == ls))
}

pub(crate) fn not_in(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(!is_in(l, r)?)
}

fn split_sides(l: &Value, r: &Value) -> Result<Option<(Vec<String>, Vec<String>)>, ExprError> {
    let ls = str_left(l)?;
    let rs = str_right(r)?;
    if ls.is_empty() || rs.is_empty() {
        return Ok(None);
    }
    let left: Vec<String> = ls.split(',').map(str::to_string).collect();
    let right: Vec<String> = rs.split(',').map(str::to_string).collect();
    Ok(Some((left, right)))
}

/// Every right element is also a left element.
pub(crate) fn has(l: &Value, r: &Value) -> Result<bool, ExprError> {
    match split_sides(l, r)? {
        Some((left, right)) => Ok(right.iter().all(|item| left.contains(item))),
        None => Ok(false),
    }
}

/// Some right element is also a left element.
pub(crate) fn any(l: &Value, r: &Value) -> Result<bool, ExprError> {
    match split_sides(l, r)? {
        Some((left, right)) => Ok(right.iter().any(|item| left.contains(item))),
        None => Ok(false),
    }
}

pub(crate) fn none(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(!any(l, r)?)
}

fn substring_sides(l: &Value, r: &Value) -> Result<Option<(String, String)>, ExprError> {
    let ls = str_left(l)?;
    let rs = str_right(r)?;
    if ls.is_empty() || rs.is_empty() {
        return Ok(None);
    }
    Ok(Some((ls, rs)))
}

pub(crate) fn contain(l: &Value, r: &Value) -> Result<bool, ExprError> {
    match substring_sides(l, r)? {
        Some((ls, rs)) => Ok(ls.contains(&rs)),
        None => Ok(false),
    }
}

pub(crate) fn not_contain(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(!contain(l, r)?)
}

pub(crate) fn head_match(l: &Value, r: &Value) -> Result<bool, ExprError> {
    match substring_sides(l, r)? {
        Some((ls, rs)) => Ok(ls.starts_with(&rs)),
        None => Ok(false),
    }
}

pub(crate) fn not_head_match(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(!head_match(l, r)?)
}

pub(crate) fn tail_match(l: &Value, r: &Value) -> Result<bool, ExprError> {
    match substring_sides(l, r)? {
        Some((ls, rs)) => Ok(ls.ends_with(&rs)),
        None => Ok(false),
    }
}

pub(crate) fn not_tail_match(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(!tail_match(l, r)?)
}

/// The left string contains at least one element of the right list.
pub(crate) fn cover(l: &Value, r: &Value) -> Result<bool, ExprError> {
    match substring_sides(l, r)? {
        Some((ls, rs)) => Ok(rs.split(',').any(|item| ls.contains(item))),
        None => Ok(false),
    }
}

pub(crate) fn not_cover(l: &Value, r: &Value) -> Result<bool, ExprError> {
    Ok(!cover(l, r)?)
}

// Assign operators.

pub(crate) fn assign(name: &str, _old: Option<&Value>, right: Value, ctx: &EvalContext) -> Result<(), ExprError> {
    ctx.set_ctx_data(name, right);
    Ok(())
}

/// Typed add: strings concatenate, numbers add. An unset left takes the
/// right operand's type.
pub(crate) fn add_assign(
    name: &str,
    old: Option<&Value>,
    right: Value,
    ctx: &EvalContext,
) -> Result<(), ExprError> {
    let kind = old.map(Value::kind).unwrap_or_else(|| right.kind());
    match kind {
        Kind::Str => {
            let base = old.and_then(Value::as_str).unwrap_or_default();
            let add = right.as_str().unwrap_or_default();
            ctx.set_ctx_data(name, Value::Str(base + &add));
        }
        Kind::Float => {
            let base = old.and_then(Value::as_float).unwrap_or(0.0);
            let add = right.as_float().unwrap_or(0.0);
            ctx.set_ctx_data(name, Value::Float(base + add));
        }
        Kind::Int => {
            let base = old.and_then(Value::as_int).unwrap_or(0);
            let add = right.as_int().unwrap_or(0);
            ctx.set_ctx_data(name, Value::Int(base + add));
        }
        _ => return Err(ExprError::TypeMismatch("invalid operand for +=".into())),
    }
    Ok(())
}

/// Subtraction is driven by the right operand's numeric type.
pub(crate) fn sub_assign(
    name: &str,
    old: Option<&Value>,
    right: Value,
    ctx: &EvalContext,
) -> Result<(), ExprError> {
    match right.kind() {
        Kind::Float => {
            let base = old.and_then(Value::as_float).unwrap_or(0.0);
            let sub = right.as_float().unwrap_or(0.0);
            ctx.set_ctx_data(name, Value::Float(base - sub));
        }
        Kind::Int => {
            let base = old.and_then(Value::as_int).unwrap_or(0);
            let sub = right.as_int().unwrap_or(0);
            ctx.set_ctx_data(name, Value::Int(base - sub));
        }
        _ => return Err(ExprError::TypeMismatch("invalid operand for -=".into())),
    }
    Ok(())
}

/// Multiply; a string left with an integer right repeats the string.
pub(crate) fn mul_assign(
    name: &str,
    old: Option<&Value>,
    right: Value,
    ctx: &EvalContext,
) -> Result<(), ExprError> {
    let kind = old.map(Value::kind).unwrap_or_else(|| right.kind());
    match kind {
        Kind::Str => {
            if right.kind() != Kind::Int {
                return Err(ExprError::TypeMismatch("invalid operand for *=".into()));
            }
            let base = old.and_then(Value::as_str).unwrap_or_default();
            let count = right.as_int().unwrap_or(0).max(0) as usize;
            ctx.set_ctx_data(name, Value::Str(base.repeat(count)));
        }
        Kind::Float => {
            let base = old.and_then(Value::as_float).unwrap_or(0.0);
            let mul = right
                .as_float()
                .ok_or_else(|| ExprError::TypeMismatch("invalid operand for *=".into()))?;
            ctx.set_ctx_data(name, Value::Float(base * mul));
        }
        Kind::Int => {
            let base = old.and_then(Value::as_int).unwrap_or(0);
            let mul = right
                .as_int()
                .ok_or_else(|| ExprError::TypeMismatch("invalid operand for *=".into()))?;
            ctx.set_ctx_data(name, Value::Int(base * mul));
        }
        _ => return Err(ExprError::TypeMismatch("invalid operand for *=".into())),
    }
    Ok(())
}

pub(crate) fn div_assign(
    name: &str,
    old: Option<&Value>,
    right: Value,
    ctx: &EvalContext,
) -> Result<(), ExprError> {
    let base = old.and_then(Value::as_float).unwrap_or(0.0);
    let div = right.as_float().unwrap_or(0.0);
    if div.abs() <= 1e-5 {
        return Err(ExprError::TypeMismatch("divisor too close to zero".into()));
    }
    ctx.set_ctx_data(name, Value::Float(base / div));
    Ok(())
}

pub(crate) fn mod_assign(
    name: &str,
    old: Option<&Value>,
    right: Value,
    ctx: &EvalContext,
) -> Result<(), ExprError> {
    let base = old.and_then(Value::as_float).unwrap_or(0.0) as i64;
    let modulus = right.as_float().unwrap_or(0.0) as i64;
    if modulus == 0 {
        return Err(ExprError::TypeMismatch("modulus is zero".into()));
    }
    ctx.set_ctx_data(name, Value::Int(base % modulus));
    Ok(())
}
