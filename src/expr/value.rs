//! Dynamically typed values for the expression engine.
//!
//! # Responsibilities
//! - Represent the closed set of value shapes a rule program can produce
//! - Coerce between shapes at comparison and assignment sites
//! - Convert raw JSON operands into engine values

use rand::Rng;
use serde_json::Value as JsonValue;

/// A value flowing through rule evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

/// Discriminant used to pick the coercion branch of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Str,
    Int,
    Float,
    Bool,
    List,
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Str(_) => Kind::Str,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Bool(_) => Kind::Bool,
            Value::List(_) => Kind::List,
        }
    }

    /// Convert a JSON operand into an engine value. JSON `null` has no
    /// counterpart in the closed set and lands as the empty string.
    pub fn from_json(v: &JsonValue) -> Value {
        match v {
            JsonValue::Null => Value::Str(String::new()),
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => Value::Str(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(_) => Value::Str(v.to_string()),
        }
    }

    /// String form. Floats render with six decimal places; lists yield the
    /// string form of a randomly chosen element; bools do not coerce.
    pub fn as_str(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format!("{f:.6}")),
            Value::Bool(_) => None,
            Value::List(items) => random_element(items)?.as_str(),
        }
    }

    /// Integer form. Strings try an integer parse first, then truncate a
    /// float parse.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Str(s) => s
                .parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64)),
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(_) => None,
            Value::List(items) => random_element(items)?.as_int(),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Str(s) => s.parse::<f64>().ok(),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(_) => None,
            Value::List(items) => random_element(items)?.as_float(),
        }
    }
}

fn random_element(items: &[Value]) -> Option<&Value> {
    if items.is_empty() {
        return None;
    }
    Some(&items[rand::thread_rng().gen_range(0..items.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_coercion() {
        assert_eq!(Value::Int(42).as_str().unwrap(), "42");
        assert_eq!(Value::Float(1.5).as_str().unwrap(), "1.500000");
        assert_eq!(Value::Str("x".into()).as_str().unwrap(), "x");
        assert!(Value::Bool(true).as_str().is_none());
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(Value::Str("17".into()).as_int(), Some(17));
        assert_eq!(Value::Str("2.9".into()).as_int(), Some(2));
        assert_eq!(Value::Str("nope".into()).as_int(), None);
        assert_eq!(Value::Float(3.7).as_int(), Some(3));
    }

    #[test]
    fn test_from_json() {
        let v: JsonValue = serde_json::from_str(r#"[1, "a", 2.5, true]"#).unwrap();
        let list = Value::from_json(&v);
        assert_eq!(
            list,
            Value::List(vec![
                Value::Int(1),
                Value::Str("a".into()),
                Value::Float(2.5),
                Value::Bool(true),
            ])
        );
    }

    #[test]
    fn test_list_picks_an_element() {
        let list = Value::List(vec![Value::Int(7)]);
        assert_eq!(list.as_int(), Some(7));
        assert_eq!(Value::List(vec![]).as_str(), None);
    }
}
