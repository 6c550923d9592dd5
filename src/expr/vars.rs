//! Built-in variables resolved at evaluation time.

use chrono::{Datelike, Local, Timelike};
use rand::Rng;

use super::context::EvalContext;
use super::value::Value;
use super::ExprError;

/// A registered variable: fetches a value from the environment when the
/// context has no entry for its name.
pub type VarFn = Box<dyn Fn(&EvalContext) -> Result<Value, ExprError> + Send + Sync>;

fn fmt_now(pattern: &str) -> Result<Value, ExprError> {
    Ok(Value::Str(Local::now().format(pattern).to_string()))
}

pub(crate) fn datetime(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%Y-%m-%d %H:%M:%S")
}

pub(crate) fn date(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%Y-%m-%d")
}

pub(crate) fn time(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%H:%M:%S")
}

pub(crate) fn short_time(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%H:%M")
}

pub(crate) fn year(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%Y")
}

pub(crate) fn month(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%m")
}

pub(crate) fn day(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%d")
}

pub(crate) fn hour(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%H")
}

pub(crate) fn minute(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%M")
}

pub(crate) fn second(_ctx: &EvalContext) -> Result<Value, ExprError> {
    fmt_now("%S")
}

pub(crate) fn iyear(_ctx: &EvalContext) -> Result<Value, ExprError> {
    Ok(Value::Int(i64::from(Local::now().year())))
}

pub(crate) fn imonth(_ctx: &EvalContext) -> Result<Value, ExprError> {
    Ok(Value::Int(i64::from(Local::now().month())))
}

pub(crate) fn iday(_ctx: &EvalContext) -> Result<Value, ExprError> {
    Ok(Value::Int(i64::from(Local::now().day())))
}

pub(crate) fn ihour(_ctx: &EvalContext) -> Result<Value, ExprError> {
    Ok(Value::Int(i64::from(Local::now().hour())))
}

pub(crate) fn iminute(_ctx: &EvalContext) -> Result<Value, ExprError> {
    Ok(Value::Int(i64::from(Local::now().minute())))
}

pub(crate) fn isecond(_ctx: &EvalContext) -> Result<Value, ExprError> {
    Ok(Value::Int(i64::from(Local::now().second())))
}

/// `$rand`: a fresh 1..=100 draw. Group execution seeds the context before
/// the first block, so repeated reads within one evaluation are stable.
pub(crate) fn rand_var(_ctx: &EvalContext) -> Result<Value, ExprError> {
    Ok(Value::Int(rand::thread_rng().gen_range(1..=100)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_variants_are_in_range() {
        let ctx = EvalContext::new();
        let month = imonth(&ctx).unwrap().as_int().unwrap();
        assert!((1..=12).contains(&month));
        let hour = ihour(&ctx).unwrap().as_int().unwrap();
        assert!((0..=23).contains(&hour));
    }

    #[test]
    fn test_rand_range() {
        let ctx = EvalContext::new();
        for _ in 0..100 {
            let v = rand_var(&ctx).unwrap().as_int().unwrap();
            assert!((1..=100).contains(&v));
        }
    }
}
