//! Parsed rule programs: groups of compare-then-assign blocks.

use std::collections::HashMap;

use rand::Rng;
use serde_json::Value as JsonValue;

use super::context::{Context, EvalContext};
use super::dict::Dictionary;
use super::value::Value;
use super::ExprError;

/// Assigning 1 to this variable stops the enclosing group.
pub const BREAK_VAR: &str = "$break";

/// One `[left, op, right]` triple.
#[derive(Debug, Clone)]
struct Clause {
    left: String,
    op: String,
    right: Value,
}

/// An ordered compare-then-assign unit. All compare clauses must pass for
/// the assign clauses to fire.
#[derive(Debug, Clone, Default)]
struct Block {
    compares: Vec<Clause>,
    assigns: Vec<Clause>,
}

/// An ordered sequence of blocks keyed by a top-level program name.
#[derive(Debug, Clone)]
pub struct Group {
    blocks: Vec<Block>,
}

/// A parsed rule program: executable groups plus the plain named values
/// that did not match the group grammar.
#[derive(Debug, Clone)]
pub struct RuleSet {
    groups: HashMap<String, Group>,
    values: HashMap<String, Value>,
}

impl RuleSet {
    /// Parse a JSON rule program. The root must be an object; each key is
    /// tried as a group and kept as a plain value when the shape does not
    /// match.
    pub fn parse(json: &[u8]) -> Result<RuleSet, ExprError> {
        let root: JsonValue =
            serde_json::from_slice(json).map_err(|e| ExprError::Parse(e.to_string()))?;
        let JsonValue::Object(entries) = root else {
            return Err(ExprError::Parse("rule program root must be an object".into()));
        };
        let mut groups = HashMap::new();
        let mut values = HashMap::new();
        for (key, entry) in entries {
            match Group::parse(&entry) {
                Ok(group) => {
                    groups.insert(key, group);
                }
                Err(_) => {
                    values.insert(key, Value::from_json(&entry));
                }
            }
        }
        Ok(RuleSet { groups, values })
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Read a plain named value. A stored `$var` string resolves through
    /// the dictionary first.
    pub fn get_value(&self, key: &str, dict: &Dictionary, ctx: &EvalContext) -> Option<Value> {
        let value = self.values.get(key)?;
        if let Value::Str(s) = value {
            if s.len() > 1 && s.starts_with('$') {
                if let Ok(resolved) = dict.resolve(s, ctx) {
                    return Some(resolved);
                }
            }
        }
        Some(value.clone())
    }
}

impl Group {
    fn parse(source: &JsonValue) -> Result<Group, ExprError> {
        let JsonValue::Array(blocks_json) = source else {
            return Err(ExprError::Parse("group is not an array".into()));
        };
        let mut blocks = Vec::with_capacity(blocks_json.len());
        for block_json in blocks_json {
            let JsonValue::Array(clauses) = block_json else {
                return Err(ExprError::Parse("block is not an array".into()));
            };
            let mut block = Block::default();
            for (i, clause_json) in clauses.iter().enumerate() {
                let JsonValue::Array(items) = clause_json else {
                    return Err(ExprError::Parse("clause is not an array".into()));
                };
                if i == clauses.len() - 1 {
                    // The terminal clause assigns: either a single triple or
                    // a sequence of triples.
                    if is_multi_assign(items) {
                        for assign_json in items {
                            let JsonValue::Array(triple) = assign_json else {
                                return Err(ExprError::Parse("assign clause is not an array".into()));
                            };
                            block.assigns.push(parse_triple(triple)?);
                        }
                    } else {
                        block.assigns.push(parse_triple(items)?);
                    }
                } else {
                    block.compares.push(parse_triple(items)?);
                }
            }
            blocks.push(block);
        }
        Ok(Group { blocks })
    }

    /// Run the group against a context. `$rand` is seeded once if absent so
    /// repeated reads within the evaluation are stable.
    pub fn execute(&self, dict: &Dictionary, ctx: &EvalContext) -> Result<(), ExprError> {
        if ctx.get_ctx_data("$rand").is_none() {
            ctx.set_ctx_data("$rand", Value::Int(rand::thread_rng().gen_range(1..=100)));
        }
        for block in &self.blocks {
            block.execute(dict, ctx)?;
            if break_requested(ctx) {
                break;
            }
        }
        Ok(())
    }
}

impl Block {
    fn execute(&self, dict: &Dictionary, ctx: &EvalContext) -> Result<(), ExprError> {
        for clause in &self.compares {
            match dict.compare(&clause.op, &clause.left, &clause.right, ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(err) => {
                    tracing::debug!(
                        left = %clause.left,
                        op = %clause.op,
                        error = %err,
                        "compare clause failed, skipping block"
                    );
                    return Ok(());
                }
            }
        }
        for clause in &self.assigns {
            dict.assign(&clause.op, &clause.left, &clause.right, ctx)?;
            if break_requested(ctx) {
                break;
            }
        }
        Ok(())
    }
}

fn is_multi_assign(items: &[JsonValue]) -> bool {
    items
        .iter()
        .all(|item| matches!(item, JsonValue::Array(triple) if triple.len() == 3))
}

fn parse_triple(items: &[JsonValue]) -> Result<Clause, ExprError> {
    if items.len() != 3 {
        return Err(ExprError::Parse("clause is not a triple".into()));
    }
    let JsonValue::String(left) = &items[0] else {
        return Err(ExprError::Parse("clause left operand is not a string".into()));
    };
    if left.len() < 2 || !left.starts_with('$') {
        return Err(ExprError::Parse(
            "clause left operand is not a $variable".into(),
        ));
    }
    let JsonValue::String(op) = &items[1] else {
        return Err(ExprError::Parse("clause operator is not a string".into()));
    };
    Ok(Clause {
        left: left.clone(),
        op: op.clone(),
        right: Value::from_json(&items[2]),
    })
}

fn break_requested(ctx: &EvalContext) -> bool {
    ctx.get_ctx_data(BREAK_VAR).and_then(|v| v.as_int()) == Some(1)
}
