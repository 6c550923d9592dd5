//! Operator and variable registry.
//!
//! # Responsibilities
//! - Hold the compare/assign/pipeline operator tables and built-in variables
//! - Resolve `$var`, `$var|fn` and `$obj.prop` references against a context
//! - Expand `{{$var}}` macros in string operands
//!
//! # Design Decisions
//! - Built mutably (all `register_*` take `&mut self`), then shared frozen
//!   behind `Arc`; nothing process-wide ever mutates at evaluation time
//! - Request-scoped objects are resolved through the context, never through
//!   this registry

use std::collections::HashMap;

use regex::Regex;

use super::context::{Context, EvalContext};
use super::ops::{self, AssignFn, CompareFn};
use super::pipeline::{self, PipeFn};
use super::value::Value;
use super::vars::{self, VarFn};
use super::ExprError;

pub struct Dictionary {
    vars: HashMap<String, VarFn>,
    compares: HashMap<String, CompareFn>,
    assigns: HashMap<String, AssignFn>,
    pipes: HashMap<String, PipeFn>,
    macro_re: Regex,
}

impl Dictionary {
    /// A dictionary with the built-in operator, variable and pipeline
    /// tables registered.
    pub fn new() -> Self {
        let mut dict = Dictionary {
            vars: HashMap::new(),
            compares: HashMap::new(),
            assigns: HashMap::new(),
            pipes: HashMap::new(),
            macro_re: Regex::new(r"\{\{(\$.+?)\}\}").expect("macro pattern is valid"),
        };
        dict.register_builtin_vars();
        dict.register_builtin_compares();
        dict.register_builtin_assigns();
        dict.register_builtin_pipes();
        dict
    }

    pub fn register_var(&mut self, name: impl Into<String>, f: VarFn) {
        self.vars.insert(name.into(), f);
    }

    pub fn register_compare(&mut self, name: impl Into<String>, f: CompareFn) {
        self.compares.insert(name.into(), f);
    }

    pub fn register_assign(&mut self, name: impl Into<String>, f: AssignFn) {
        self.assigns.insert(name.into(), f);
    }

    pub fn register_pipe_fn(&mut self, name: impl Into<String>, f: PipeFn) {
        self.pipes.insert(name.into(), f);
    }

    fn register_builtin_vars(&mut self) {
        self.register_var("$datetime", Box::new(vars::datetime));
        self.register_var("$date", Box::new(vars::date));
        self.register_var("$time", Box::new(vars::time));
        self.register_var("$stime", Box::new(vars::short_time));
        self.register_var("$year", Box::new(vars::year));
        self.register_var("$month", Box::new(vars::month));
        self.register_var("$day", Box::new(vars::day));
        self.register_var("$hour", Box::new(vars::hour));
        self.register_var("$minute", Box::new(vars::minute));
        self.register_var("$second", Box::new(vars::second));
        self.register_var("$iyear", Box::new(vars::iyear));
        self.register_var("$imonth", Box::new(vars::imonth));
        self.register_var("$iday", Box::new(vars::iday));
        self.register_var("$ihour", Box::new(vars::ihour));
        self.register_var("$iminute", Box::new(vars::iminute));
        self.register_var("$isecond", Box::new(vars::isecond));
        self.register_var("$rand", Box::new(vars::rand_var));
    }

    fn register_builtin_compares(&mut self) {
        self.register_compare(">", Box::new(ops::more));
        self.register_compare(">=", Box::new(ops::more_equal));
        self.register_compare("<", Box::new(ops::less));
        self.register_compare("<=", Box::new(ops::less_equal));
        self.register_compare("=", Box::new(ops::equal));
        self.register_compare("<>", Box::new(ops::not_equal));
        self.register_compare("!=", Box::new(ops::not_equal));
        self.register_compare("between", Box::new(ops::between));
        self.register_compare("^between", Box::new(ops::not_between));
        self.register_compare("in", Box::new(ops::is_in));
        self.register_compare("not in", Box::new(ops::not_in));
        self.register_compare("has", Box::new(ops::has));
        self.register_compare("any", Box::new(ops::any));
        self.register_compare("none", Box::new(ops::none));
        self.register_compare("~", Box::new(ops::contain));
        self.register_compare("^~", Box::new(ops::not_contain));
        self.register_compare("~*", Box::new(ops::head_match));
        self.register_compare("^~*", Box::new(ops::not_head_match));
        self.register_compare("*~", Box::new(ops::tail_match));
        self.register_compare("^*~", Box::new(ops::not_tail_match));
        self.register_compare("cv", Box::new(ops::cover));
        self.register_compare("^cv", Box::new(ops::not_cover));
    }

    fn register_builtin_assigns(&mut self) {
        self.register_assign("=", Box::new(ops::assign));
        self.register_assign("+=", Box::new(ops::add_assign));
        self.register_assign("-=", Box::new(ops::sub_assign));
        self.register_assign("*=", Box::new(ops::mul_assign));
        self.register_assign("/=", Box::new(ops::div_assign));
        self.register_assign("%=", Box::new(ops::mod_assign));
    }

    fn register_builtin_pipes(&mut self) {
        self.register_pipe_fn(pipeline::FN_LEN, Box::new(pipeline::pipe_len));
        self.register_pipe_fn(pipeline::FN_UPPER, Box::new(pipeline::pipe_upper));
        self.register_pipe_fn(pipeline::FN_LOWER, Box::new(pipeline::pipe_lower));
        self.register_pipe_fn(pipeline::FN_FNV32, Box::new(pipeline::pipe_fnv32));
        self.register_pipe_fn(pipeline::FN_FNV64, Box::new(pipeline::pipe_fnv64));
        self.register_pipe_fn(pipeline::FN_MD5_LOWER, Box::new(pipeline::pipe_md5_lower));
        self.register_pipe_fn(pipeline::FN_MD5_UPPER, Box::new(pipeline::pipe_md5_upper));
    }

    /// Resolve a `$name[|fn…]` reference: split off the pipeline chain,
    /// resolve the origin, then apply each pipeline function left to right.
    pub fn resolve(&self, reference: &str, ctx: &EvalContext) -> Result<Value, ExprError> {
        if reference.len() < 2 || !reference.starts_with('$') {
            return Err(ExprError::VariableNotFound(reference.to_string()));
        }
        match pipeline::split(reference) {
            Some((origin, fn_names)) => {
                let mut value = self.resolve_origin(origin, ctx)?;
                for name in fn_names {
                    let f = self
                        .pipes
                        .get(name)
                        .ok_or_else(|| ExprError::OperatorNotFound(name.to_string()))?;
                    value = f(value)?;
                }
                Ok(value)
            }
            None => self.resolve_origin(reference, ctx),
        }
    }

    /// Resolution order: object property when the name is dotted, otherwise
    /// the context entry, otherwise the registered variable function.
    fn resolve_origin(&self, name: &str, ctx: &EvalContext) -> Result<Value, ExprError> {
        if name.contains('.') {
            let parts: Vec<&str> = name.split('.').collect();
            if parts.len() != 2 {
                return Err(ExprError::VariableNotFound(name.to_string()));
            }
            let object = ctx
                .get_object(parts[0])
                .ok_or_else(|| ExprError::VariableNotFound(name.to_string()))?;
            return Ok(object
                .get_property(parts[1], ctx)
                .unwrap_or_else(|| Value::Str(String::new())));
        }
        if let Some(value) = ctx.get_ctx_data(name) {
            return Ok(value);
        }
        match self.vars.get(name) {
            Some(f) => f(ctx),
            None => Err(ExprError::VariableNotFound(name.to_string())),
        }
    }

    /// Expand `{{$var}}` macros against the context. Unresolvable macros
    /// stay in place; pipelines are not applied inside macros.
    pub fn expand_macros(&self, input: &str, ctx: &EvalContext) -> String {
        self.macro_re
            .replace_all(input, |caps: &regex::Captures<'_>| {
                match self.resolve_origin(&caps[1], ctx) {
                    Ok(value) => value.as_str().unwrap_or_else(|| caps[0].to_string()),
                    Err(_) => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Resolve a right-hand operand: `$`-prefixed strings resolve as
    /// variables, then any string result gets its macros expanded.
    fn resolve_operand(&self, right: &Value, ctx: &EvalContext) -> Result<Value, ExprError> {
        let mut value = match right {
            Value::Str(s) if s.len() > 1 && s.starts_with('$') => self.resolve(s, ctx)?,
            other => other.clone(),
        };
        if let Value::Str(s) = &value {
            value = Value::Str(self.expand_macros(s, ctx));
        }
        Ok(value)
    }

    /// Evaluate one compare clause.
    pub fn compare(
        &self,
        op: &str,
        left: &str,
        right: &Value,
        ctx: &EvalContext,
    ) -> Result<bool, ExprError> {
        let f = self
            .compares
            .get(op)
            .ok_or_else(|| ExprError::OperatorNotFound(op.to_string()))?;
        let left_value = if left.len() > 1 && left.starts_with('$') {
            self.resolve(left, ctx)?
        } else {
            Value::Str(left.to_string())
        };
        let right_value = self.resolve_operand(right, ctx)?;
        f(&left_value, &right_value)
    }

    /// Evaluate one assign clause. A dotted left with `=` targets a
    /// context-registered object's property; everything else lands in the
    /// context.
    pub fn assign(
        &self,
        op: &str,
        left: &str,
        right: &Value,
        ctx: &EvalContext,
    ) -> Result<(), ExprError> {
        if op == "=" && left.contains('.') && self.object_property_assign(left, right, ctx)? {
            return Ok(());
        }
        let f = self
            .assigns
            .get(op)
            .ok_or_else(|| ExprError::OperatorNotFound(op.to_string()))?;
        let left_value = self.resolve(left, ctx).ok();
        let right_value = self.resolve_operand(right, ctx)?;
        f(left, left_value.as_ref(), right_value, ctx)
    }

    fn object_property_assign(
        &self,
        left: &str,
        right: &Value,
        ctx: &EvalContext,
    ) -> Result<bool, ExprError> {
        let parts: Vec<&str> = left.split('.').collect();
        if parts.len() != 2 {
            return Ok(false);
        }
        let Some(object) = ctx.get_object(parts[0]) else {
            return Ok(false);
        };
        let value = self.resolve_operand(right, ctx)?;
        object.set_property(parts[1], value, ctx);
        Ok(true)
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::context::Object;
    use super::*;

    struct Greeting;

    impl Object for Greeting {
        fn get_property(&self, property: &str, _ctx: &EvalContext) -> Option<Value> {
            (property == "word").then(|| Value::Str("hi".into()))
        }
        fn set_property(&self, property: &str, value: Value, ctx: &EvalContext) {
            ctx.set_ctx_data(&format!("$stored_{property}"), value);
        }
    }

    #[test]
    fn test_resolution_prefers_context() {
        let dict = Dictionary::new();
        let ctx = EvalContext::new();
        ctx.set_ctx_data("$rand", Value::Int(42));
        assert_eq!(dict.resolve("$rand", &ctx).unwrap(), Value::Int(42));
        assert!(matches!(
            dict.resolve("$missing", &ctx),
            Err(ExprError::VariableNotFound(_))
        ));
    }

    #[test]
    fn test_pipeline_chain() {
        let dict = Dictionary::new();
        let ctx = EvalContext::new();
        ctx.set_ctx_data("$x", Value::Str("HELLO".into()));
        assert_eq!(dict.resolve("$x|lower|len", &ctx).unwrap(), Value::Int(5));
        assert!(matches!(
            dict.resolve("$x|nope", &ctx),
            Err(ExprError::OperatorNotFound(_))
        ));
    }

    #[test]
    fn test_object_property_access() {
        let dict = Dictionary::new();
        let ctx = EvalContext::new();
        ctx.register_object("$greet", Arc::new(Greeting));
        assert_eq!(
            dict.resolve("$greet.word", &ctx).unwrap(),
            Value::Str("hi".into())
        );
        // Unknown property reads as the empty string.
        assert_eq!(
            dict.resolve("$greet.other", &ctx).unwrap(),
            Value::Str(String::new())
        );
    }

    #[test]
    fn test_macro_expansion() {
        let dict = Dictionary::new();
        let ctx = EvalContext::new();
        ctx.set_ctx_data("$who", Value::Str("world".into()));
        assert_eq!(dict.expand_macros("hello {{$who}}", &ctx), "hello world");
        // Unresolvable macros stay put.
        assert_eq!(dict.expand_macros("x {{$gone}} y", &ctx), "x {{$gone}} y");
        // Expanding first then comparing matches comparing the expanded form.
        assert!(dict
            .compare(
                "=",
                "$who",
                &Value::Str("{{$who}}".into()),
                &ctx
            )
            .unwrap());
    }

    #[test]
    fn test_assign_to_object_property() {
        let dict = Dictionary::new();
        let ctx = EvalContext::new();
        ctx.register_object("$greet", Arc::new(Greeting));
        dict.assign("=", "$greet.word", &Value::Str("yo".into()), &ctx)
            .unwrap();
        assert_eq!(
            ctx.get_ctx_data("$stored_word"),
            Some(Value::Str("yo".into()))
        );
        // A dotted left without a matching object stores under the dotted key.
        dict.assign("=", "$no.obj", &Value::Int(1), &ctx).unwrap();
        assert_eq!(ctx.get_ctx_data("$no.obj"), Some(Value::Int(1)));
    }

    #[test]
    fn test_unknown_operator() {
        let dict = Dictionary::new();
        let ctx = EvalContext::new();
        assert!(matches!(
            dict.compare("???", "$x", &Value::Int(1), &ctx),
            Err(ExprError::OperatorNotFound(_))
        ));
    }
}
